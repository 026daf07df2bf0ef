//! Buckets: retention-scoped collections of events
//!
//! A bucket is one table plus, when its retention policy is enabled, a
//! background task that purges expired rows until the bucket is closed.

use super::event_retention::RetentionPolicy;
use super::event_storage::{EventTable, Events};
use super::tables;
use crate::context::RequestContext;
use crate::database::background_tasks::{spawn_periodic, PurgeTask, TaskHandle};
use crate::database::error::DatabaseResult;
use crate::database::stats::OperationRecorder;
use crate::database::types::Event;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[async_trait::async_trait]
pub trait Bucket: Send + Sync {
	/// Physical table name
	fn name(&self) -> &str;

	/// Append an event. Callers wanting at-most-once semantics `find` first.
	async fn insert(&self, ctx: &RequestContext, event: &Event) -> DatabaseResult<()>;

	/// First stored event matching the probe's dedup key, or `None`
	async fn find(&self, ctx: &RequestContext, event: &Event) -> DatabaseResult<Option<Event>>;

	/// Events with time strictly after `since` (unix seconds), newest first.
	/// `None` when no event qualifies.
	async fn get(&self, ctx: &RequestContext, since: i64) -> DatabaseResult<Option<Events>>;

	/// Most recent event, or `None` for an empty bucket
	async fn latest(&self, ctx: &RequestContext) -> DatabaseResult<Option<Event>>;

	/// Delete events with time strictly before `before` (unix seconds)
	async fn purge(&self, ctx: &RequestContext, before: i64) -> DatabaseResult<u64>;

	/// Stop the background purge task. Data is kept. Idempotent.
	fn close(&self);

	async fn get_since(&self, ctx: &RequestContext, since: DateTime<Utc>) -> DatabaseResult<Option<Events>> {
		self.get(ctx, since.timestamp()).await
	}
}

pub struct SqliteBucket {
	events: Arc<EventTable>,
	policy: RetentionPolicy,
	purger: Option<TaskHandle>,
}

impl SqliteBucket {
	/// Create (if needed) the table for `name` and start purging per `policy`
	pub async fn open(
		db_rw: SqlitePool, db_ro: SqlitePool, name: &str, policy: RetentionPolicy,
		recorder: Arc<dyn OperationRecorder>, creation_timeout: Duration,
	) -> DatabaseResult<Self> {
		let table = tables::bucket_table_name(name)?;

		let ctx = RequestContext::with_timeout(creation_timeout);
		tables::create_event_table(&ctx, &db_rw, &table).await?;

		let events = Arc::new(EventTable::new(table, db_rw, db_ro, recorder));
		let purger = if policy.is_enabled() {
			info!(
				"Start purging {} (retention {:?}, interval {:?})",
				events.table(),
				policy.retention,
				policy.purge_interval
			);
			let task = Arc::new(PurgeTask::new(events.clone(), policy));
			Some(spawn_periodic(task, CancellationToken::new()))
		} else {
			None
		};

		Ok(Self {
			events,
			policy,
			purger,
		})
	}

	pub fn policy(&self) -> RetentionPolicy {
		self.policy
	}

	/// Handle of the purge task, if retention is enabled
	pub fn purger(&self) -> Option<&TaskHandle> {
		self.purger.as_ref()
	}

	/// Close and wait until the purge task has exited
	pub async fn shutdown(&self) {
		self.close();
		if let Some(purger) = &self.purger {
			purger.wait().await;
		}
	}
}

#[async_trait::async_trait]
impl Bucket for SqliteBucket {
	fn name(&self) -> &str {
		self.events.table()
	}

	async fn insert(&self, ctx: &RequestContext, event: &Event) -> DatabaseResult<()> {
		self.events.insert(ctx, event).await
	}

	async fn find(&self, ctx: &RequestContext, event: &Event) -> DatabaseResult<Option<Event>> {
		self.events.find(ctx, event).await
	}

	async fn get(&self, ctx: &RequestContext, since: i64) -> DatabaseResult<Option<Events>> {
		self.events.get(ctx, since).await
	}

	async fn latest(&self, ctx: &RequestContext) -> DatabaseResult<Option<Event>> {
		self.events.latest(ctx).await
	}

	async fn purge(&self, ctx: &RequestContext, before: i64) -> DatabaseResult<u64> {
		self.events.purge(ctx, before).await
	}

	fn close(&self) {
		if let Some(purger) = &self.purger {
			if !purger.is_stopped() {
				info!("Closing bucket {}", self.events.table());
				purger.stop();
			}
		}
	}
}
