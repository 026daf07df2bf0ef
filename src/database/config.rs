//! Database configuration for the event and metric store

use std::path::PathBuf;
use std::time::Duration;

/// Smallest non-zero retention accepted through configuration
pub const MIN_RETENTION: Duration = Duration::from_secs(60);

/// Configuration for database-backed storage
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	/// Path where the SQLite database file will be stored
	pub database_path: PathBuf,

	/// How long to keep events before the purge loop removes them (zero = keep forever)
	pub retention: Duration,

	/// How often to VACUUM the database (None = never)
	pub compact_interval: Option<Duration>,

	/// How long a connection waits on a locked database before giving up
	pub busy_timeout: Duration,

	/// Connections in the read-only pool
	pub max_read_connections: u32,

	/// Upper bound for creating a bucket's table and indexes
	pub table_creation_timeout: Duration,
}

impl DatabaseConfig {
	/// Configuration for short-lived databases, e.g. tests.
	/// No retention loop and no compaction.
	pub fn ephemeral() -> Self {
		Self {
			database_path: std::env::temp_dir().join("health_store_ephemeral.db"),
			retention: Duration::ZERO,
			compact_interval: None,
			busy_timeout: Duration::from_secs(5),
			max_read_connections: 4,
			table_creation_timeout: Duration::from_secs(10),
		}
	}

	/// Custom configuration with specified database path
	pub fn with_path(path: PathBuf) -> Self {
		Self {
			database_path: path,
			..Self::default()
		}
	}

	/// Validate configuration parameters
	pub fn validate(&self) -> Result<(), String> {
		if !self.retention.is_zero() && self.retention < MIN_RETENTION {
			return Err(format!(
				"Retention must be zero or at least {:?}, got {:?}",
				MIN_RETENTION, self.retention
			));
		}

		if let Some(interval) = self.compact_interval {
			if interval.is_zero() {
				return Err("Compact interval must be greater than 0".to_string());
			}
		}

		if self.max_read_connections == 0 {
			return Err("Read connection count must be greater than 0".to_string());
		}

		if self.table_creation_timeout.is_zero() {
			return Err("Table creation timeout must be greater than 0".to_string());
		}

		Ok(())
	}
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			database_path: std::env::temp_dir().join("health_store.db"),
			retention: Duration::from_secs(3 * 24 * 60 * 60), // 3 days
			compact_interval: Some(Duration::from_secs(24 * 60 * 60)),
			busy_timeout: Duration::from_secs(5),
			max_read_connections: 8,
			table_creation_timeout: Duration::from_secs(10),
		}
	}
}
