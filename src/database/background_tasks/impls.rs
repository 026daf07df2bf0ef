//! Concrete background task implementations for retention and maintenance.

use crate::context::RequestContext;
use crate::database::background_tasks::{BackgroundTask, TaskFuture};
use crate::database::storage::event_storage::EventTable;
use crate::database::storage::maintenance;
use crate::database::storage::RetentionPolicy;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Deletes a bucket's events older than its retention horizon
pub struct PurgeTask {
	name: String,
	events: Arc<EventTable>,
	policy: RetentionPolicy,
}

impl PurgeTask {
	pub fn new(events: Arc<EventTable>, policy: RetentionPolicy) -> Self {
		Self {
			name: format!("purge:{}", events.table()),
			events,
			policy,
		}
	}

	/// Unix seconds before which events are expired
	pub fn cutoff(&self) -> i64 {
		let retention_secs = i64::try_from(self.policy.retention.as_secs()).unwrap_or(i64::MAX);
		Utc::now().timestamp().saturating_sub(retention_secs)
	}
}

impl BackgroundTask for PurgeTask {
	fn name(&self) -> &str {
		&self.name
	}
	fn interval(&self) -> Duration {
		self.policy.purge_interval
	}
	fn run(&self, ctx: RequestContext) -> TaskFuture<'_> {
		Box::pin(async move {
			let purged = self.events.purge(&ctx, self.cutoff()).await?;
			info!(
				"Purged {} events from {} (retention {:?})",
				purged,
				self.events.table(),
				self.policy.retention
			);
			Ok(())
		})
	}
}

/// Periodically VACUUMs the database to reclaim space left by purges
pub struct CompactionTask {
	pub db: SqlitePool,
	pub interval: Duration,
}

impl BackgroundTask for CompactionTask {
	fn name(&self) -> &str {
		"compaction"
	}
	fn interval(&self) -> Duration {
		self.interval
	}
	fn run(&self, ctx: RequestContext) -> TaskFuture<'_> {
		Box::pin(async move {
			maintenance::compact_database(&ctx, &self.db).await?;
			Ok(())
		})
	}
}
