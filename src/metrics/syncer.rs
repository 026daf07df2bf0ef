//! Periodic scrape-and-record plus retention purge for metrics
//!
//! Two independent loops: one scrapes and records every scrape interval, the
//! other purges samples older than the retain duration every purge interval.
//! A failing iteration is logged and the loop carries on.

use super::{MetricsStore, Scraper};
use crate::context::RequestContext;
use crate::database::background_tasks::{BackgroundTask, BackgroundTaskManager, TaskFuture, TaskMetrics};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

pub const SYNC_TASK_NAME: &str = "metrics_sync";
pub const PURGE_TASK_NAME: &str = "metrics_purge";

/// Scrape once and record the batch. Errors from either side come back unchanged.
pub async fn sync_once(
	ctx: &RequestContext, scraper: &dyn Scraper, store: &dyn MetricsStore,
) -> anyhow::Result<()> {
	let metrics = scraper.scrape(ctx).await?;
	store.record(ctx, &metrics).await?;
	debug!("Recorded {} metrics", metrics.len());
	Ok(())
}

struct SyncTask {
	scraper: Arc<dyn Scraper>,
	store: Arc<dyn MetricsStore>,
	interval: Duration,
}

impl BackgroundTask for SyncTask {
	fn name(&self) -> &str {
		SYNC_TASK_NAME
	}
	fn interval(&self) -> Duration {
		self.interval
	}
	fn run(&self, ctx: RequestContext) -> TaskFuture<'_> {
		Box::pin(async move { sync_once(&ctx, self.scraper.as_ref(), self.store.as_ref()).await })
	}
}

struct MetricsPurgeTask {
	store: Arc<dyn MetricsStore>,
	interval: Duration,
	retain: Duration,
}

impl BackgroundTask for MetricsPurgeTask {
	fn name(&self) -> &str {
		PURGE_TASK_NAME
	}
	fn interval(&self) -> Duration {
		self.interval
	}
	fn run(&self, ctx: RequestContext) -> TaskFuture<'_> {
		Box::pin(async move {
			let before = Utc::now() - chrono::Duration::from_std(self.retain)?;
			let purged = self.store.purge(&ctx, before).await?;
			info!("Purged {} metrics older than {}", purged, before);
			Ok(())
		})
	}
}

pub struct Syncer {
	ctx: RequestContext,
	scraper: Arc<dyn Scraper>,
	store: Arc<dyn MetricsStore>,
	scrape_interval: Duration,
	purge_interval: Duration,
	retain_duration: Duration,
	tasks: Mutex<Option<Arc<BackgroundTaskManager>>>,
}

impl Syncer {
	/// The syncer's loops stop when `ctx` is cancelled or on [`Syncer::stop`]
	pub fn new(
		ctx: &RequestContext, scraper: Arc<dyn Scraper>, store: Arc<dyn MetricsStore>,
		scrape_interval: Duration, purge_interval: Duration, retain_duration: Duration,
	) -> Self {
		Self {
			ctx: ctx.child(),
			scraper,
			store,
			scrape_interval,
			purge_interval,
			retain_duration,
			tasks: Mutex::new(None),
		}
	}

	pub fn scrape_interval(&self) -> Duration {
		self.scrape_interval
	}

	pub fn purge_interval(&self) -> Duration {
		self.purge_interval
	}

	pub fn retain_duration(&self) -> Duration {
		self.retain_duration
	}

	/// Scrape once and record the result
	pub async fn sync(&self) -> anyhow::Result<()> {
		sync_once(&self.ctx, self.scraper.as_ref(), self.store.as_ref()).await
	}

	/// Start both loops on the current tokio runtime. Later calls are ignored.
	pub fn start(&self) {
		let mut tasks = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
		if tasks.is_some() {
			return;
		}

		info!(
			"Starting metrics syncer (scrape every {:?}, purge every {:?}, retain {:?})",
			self.scrape_interval, self.purge_interval, self.retain_duration
		);
		let mut manager = BackgroundTaskManager::with_parent(&self.ctx.cancellation_token());
		manager.register_task(Arc::new(SyncTask {
			scraper: self.scraper.clone(),
			store: self.store.clone(),
			interval: self.scrape_interval,
		}));
		manager.register_task(Arc::new(MetricsPurgeTask {
			store: self.store.clone(),
			interval: self.purge_interval,
			retain: self.retain_duration,
		}));
		*tasks = Some(Arc::new(manager));
	}

	/// Signal both loops to exit
	pub fn stop(&self) {
		info!("Stopping metrics syncer");
		self.ctx.cancel();
	}

	/// Wait for both loops to exit after [`Syncer::stop`]
	pub async fn wait(&self) {
		let manager = self.manager();
		if let Some(manager) = manager {
			manager.wait_all().await;
		}
	}

	/// Per-loop run counts and last errors
	pub async fn task_metrics(&self) -> HashMap<String, TaskMetrics> {
		match self.manager() {
			Some(manager) => manager.get_metrics().await,
			None => HashMap::new(),
		}
	}

	fn manager(&self) -> Option<Arc<BackgroundTaskManager>> {
		self.tasks
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.clone()
	}
}

impl Drop for Syncer {
	fn drop(&mut self) {
		self.ctx.cancel();
	}
}
