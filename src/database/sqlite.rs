//! SQLite connection pools
//!
//! Writes go through a single-connection pool; reads go through a separate
//! read-only pool on the same file so readers do not queue behind the writer.

use crate::database::config::DatabaseConfig;
use crate::database::error::{DatabaseError, DatabaseResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use tracing::info;

/// Open the writable and read-only pools for `config.database_path`.
///
/// The writable pool is opened first so the file and its WAL exist before
/// the read-only pool connects.
pub async fn open_pools(config: &DatabaseConfig) -> DatabaseResult<(SqlitePool, SqlitePool)> {
	if let Some(parent) = config.database_path.parent() {
		if !parent.as_os_str().is_empty() {
			std::fs::create_dir_all(parent).map_err(|e| {
				DatabaseError::ConnectionFailed(format!("create {}: {e}", parent.display()))
			})?;
		}
	}

	let rw_options = SqliteConnectOptions::new()
		.filename(&config.database_path)
		.create_if_missing(true)
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.busy_timeout(config.busy_timeout);
	let db_rw = SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(rw_options)
		.await
		.map_err(|e| DatabaseError::ConnectionFailed(format!("open read-write: {e}")))?;

	let ro_options = SqliteConnectOptions::new()
		.filename(&config.database_path)
		.read_only(true)
		.busy_timeout(config.busy_timeout);
	let db_ro = SqlitePoolOptions::new()
		.max_connections(config.max_read_connections)
		.connect_with(ro_options)
		.await
		.map_err(|e| DatabaseError::ConnectionFailed(format!("open read-only: {e}")))?;

	info!(
		"Opened database at {} ({} read connections)",
		config.database_path.display(),
		config.max_read_connections
	);
	Ok((db_rw, db_ro))
}
