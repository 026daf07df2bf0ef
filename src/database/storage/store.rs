//! Store: factory and registry for buckets
//!
//! The store owns the pools and an immutable configuration snapshot. Each
//! bucket resolves its own retention policy from that snapshot and its
//! options at creation time.

use super::bucket::{Bucket, SqliteBucket};
use super::event_retention::RetentionPolicy;
use super::maintenance;
use crate::context::RequestContext;
use crate::database::background_tasks::{BackgroundTaskManager, CompactionTask, TaskMetrics};
use crate::database::config::DatabaseConfig;
use crate::database::error::{DatabaseError, DatabaseResult};
use crate::database::sqlite;
use crate::database::stats::{DatabaseStats, OperationRecorder, OperationStats};
use crate::metrics::SqliteMetricsStore;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Per-bucket creation options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketOptions {
	/// Do not run a background purge loop for this bucket
	pub disable_purge: bool,
}

impl BucketOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn disable_purge(mut self) -> Self {
		self.disable_purge = true;
		self
	}
}

#[async_trait::async_trait]
pub trait Store: Send + Sync {
	/// Create or reopen the bucket for a logical name
	async fn bucket(&self, name: &str, options: BucketOptions) -> DatabaseResult<Arc<dyn Bucket>>;

	/// Open a bucket that never purges, for read-mostly callers
	async fn load_bucket_with_no_purge(&self, name: &str) -> DatabaseResult<Arc<dyn Bucket>> {
		self.bucket(name, BucketOptions::new().disable_purge()).await
	}
}

pub struct SqliteStore {
	db_rw: SqlitePool,
	db_ro: SqlitePool,
	config: DatabaseConfig,
	recorder: Arc<dyn OperationRecorder>,
	stats: Option<Arc<OperationStats>>,
	maintenance: Mutex<BackgroundTaskManager>,
}

impl SqliteStore {
	/// Build a store over already-open pools
	pub fn new(db_rw: SqlitePool, db_ro: SqlitePool, config: DatabaseConfig) -> DatabaseResult<Self> {
		config.validate().map_err(DatabaseError::InvalidConfiguration)?;
		let stats = Arc::new(OperationStats::new());
		Ok(Self {
			db_rw,
			db_ro,
			config,
			recorder: stats.clone(),
			stats: Some(stats),
			maintenance: Mutex::new(BackgroundTaskManager::new()),
		})
	}

	/// Open the database file named by `config` and start compaction if configured
	pub async fn open(config: DatabaseConfig) -> DatabaseResult<Self> {
		config.validate().map_err(DatabaseError::InvalidConfiguration)?;
		let (db_rw, db_ro) = sqlite::open_pools(&config).await?;
		let store = Self::new(db_rw, db_ro, config)?;
		store.start_compaction().await;
		Ok(store)
	}

	/// Send operation latencies to `recorder` instead of the built-in counters
	pub fn with_recorder(mut self, recorder: Arc<dyn OperationRecorder>) -> Self {
		self.recorder = recorder;
		self.stats = None;
		self
	}

	pub fn config(&self) -> &DatabaseConfig {
		&self.config
	}

	pub fn db_rw(&self) -> &SqlitePool {
		&self.db_rw
	}

	pub fn db_ro(&self) -> &SqlitePool {
		&self.db_ro
	}

	pub fn recorder(&self) -> Arc<dyn OperationRecorder> {
		self.recorder.clone()
	}

	/// Counters of the built-in recorder; `None` when a custom recorder is installed
	pub fn stats(&self) -> Option<DatabaseStats> {
		self.stats.as_ref().map(|s| s.snapshot())
	}

	/// Resolve the retention policy a new bucket receives
	pub fn retention_policy(&self, options: BucketOptions) -> RetentionPolicy {
		if options.disable_purge {
			RetentionPolicy::disabled()
		} else {
			RetentionPolicy::from_retention(self.config.retention)
		}
	}

	/// Concrete-typed variant of [`Store::bucket`]
	pub async fn open_bucket(&self, name: &str, options: BucketOptions) -> DatabaseResult<SqliteBucket> {
		let policy = self.retention_policy(options);
		debug!("Opening bucket {:?} with {:?}", name, policy);
		SqliteBucket::open(
			self.db_rw.clone(),
			self.db_ro.clone(),
			name,
			policy,
			self.recorder.clone(),
			self.config.table_creation_timeout,
		)
		.await
	}

	/// Metrics store on the same database, sharing this store's recorder
	pub async fn metrics_store(&self) -> DatabaseResult<SqliteMetricsStore> {
		SqliteMetricsStore::new(self.db_rw.clone(), self.db_ro.clone(), self.recorder.clone()).await
	}

	/// VACUUM the database now
	pub async fn compact(&self, ctx: &RequestContext) -> DatabaseResult<()> {
		maintenance::compact_database(ctx, &self.db_rw).await
	}

	/// Start the periodic compaction task. Returns false when compaction is
	/// disabled or already running.
	pub async fn start_compaction(&self) -> bool {
		let Some(interval) = self.config.compact_interval else {
			return false;
		};
		let mut manager = self.maintenance.lock().await;
		if !manager.is_empty() {
			return false;
		}
		info!("Compacting database every {:?}", interval);
		manager.register_task(Arc::new(CompactionTask {
			db: self.db_rw.clone(),
			interval,
		}));
		true
	}

	pub async fn maintenance_metrics(&self) -> HashMap<String, TaskMetrics> {
		self.maintenance.lock().await.get_metrics().await
	}

	/// Stop store-level background tasks. Buckets are closed by their owners.
	pub async fn close(&self) {
		let manager = self.maintenance.lock().await;
		manager.stop_all();
		manager.wait_all().await;
	}
}

#[async_trait::async_trait]
impl Store for SqliteStore {
	async fn bucket(&self, name: &str, options: BucketOptions) -> DatabaseResult<Arc<dyn Bucket>> {
		let bucket = self.open_bucket(name, options).await?;
		Ok(Arc::new(bucket))
	}
}
