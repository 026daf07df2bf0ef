//! Periodic background tasks with explicit, owned lifecycles.
//!
//! Each task runs in its own tokio task: wait one interval (or exit on
//! cancellation), run, record the outcome, repeat. A failed run is logged and
//! counted but never ends the loop; the next tick simply tries again.

use crate::context::RequestContext;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub type TaskFuture<'a> = Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send + 'a>>;

#[derive(Debug, Clone, Default)]
pub struct TaskMetrics {
	pub last_run: Option<Instant>,
	pub last_error: Option<String>,
	pub last_duration: Option<Duration>,
	pub success_count: u64,
	pub failure_count: u64,
}

impl TaskMetrics {
	pub fn run_count(&self) -> u64 {
		self.success_count + self.failure_count
	}
}

pub trait BackgroundTask: Send + Sync {
	fn name(&self) -> &str;

	/// Delay before each run
	fn interval(&self) -> Duration;

	/// One iteration. `ctx` is cancelled when the task is stopped.
	fn run(&self, ctx: RequestContext) -> TaskFuture<'_>;
}

/// Owned handle to a running periodic task. Dropping the handle stops the task.
pub struct TaskHandle {
	name: String,
	token: CancellationToken,
	join: Mutex<Option<JoinHandle<()>>>,
	metrics: Arc<RwLock<TaskMetrics>>,
}

impl TaskHandle {
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Signal the task to exit. Safe to call any number of times.
	pub fn stop(&self) {
		if !self.token.is_cancelled() {
			debug!("Stopping background task {}", self.name);
			self.token.cancel();
		}
	}

	pub fn is_stopped(&self) -> bool {
		self.token.is_cancelled()
	}

	/// Wait for the task to exit. Returns immediately on later calls.
	pub async fn wait(&self) {
		let join = self
			.join
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.take();
		if let Some(join) = join {
			if let Err(e) = join.await {
				error!("Background task {} panicked: {}", self.name, e);
			}
		}
	}

	pub async fn metrics(&self) -> TaskMetrics {
		self.metrics.read().await.clone()
	}
}

impl Drop for TaskHandle {
	fn drop(&mut self) {
		self.token.cancel();
	}
}

/// Spawn `task` on the current tokio runtime; it runs until `token` is cancelled.
pub fn spawn_periodic(task: Arc<dyn BackgroundTask>, token: CancellationToken) -> TaskHandle {
	let name = task.name().to_string();
	let metrics = Arc::new(RwLock::new(TaskMetrics::default()));

	let loop_name = name.clone();
	let loop_token = token.clone();
	let loop_metrics = metrics.clone();
	let join = tokio::spawn(async move {
		info!("Starting background task {} (interval {:?})", loop_name, task.interval());
		loop {
			tokio::select! {
				_ = loop_token.cancelled() => break,
				_ = tokio::time::sleep(task.interval()) => {},
			}

			let start = Instant::now();
			let ctx = RequestContext::from_token(loop_token.child_token());
			let result = task.run(ctx).await;

			let mut metrics_guard = loop_metrics.write().await;
			metrics_guard.last_run = Some(Instant::now());
			metrics_guard.last_duration = Some(start.elapsed());
			match result {
				Ok(()) => metrics_guard.success_count += 1,
				Err(e) => {
					metrics_guard.failure_count += 1;
					metrics_guard.last_error = Some(format!("{e:#}"));
					error!("Background task {} failed: {:#}", loop_name, e);
				}
			}
		}
		debug!("Background task {} exited", loop_name);
	});

	TaskHandle {
		name,
		token,
		join: Mutex::new(Some(join)),
		metrics,
	}
}

/// Groups tasks that share a lifetime, e.g. the two loops of a syncer
pub struct BackgroundTaskManager {
	root: CancellationToken,
	handles: Vec<TaskHandle>,
}

impl BackgroundTaskManager {
	pub fn new() -> Self {
		Self {
			root: CancellationToken::new(),
			handles: Vec::new(),
		}
	}

	/// A manager whose tasks also stop when `parent` is cancelled
	pub fn with_parent(parent: &CancellationToken) -> Self {
		Self {
			root: parent.child_token(),
			handles: Vec::new(),
		}
	}

	pub fn register_task(&mut self, task: Arc<dyn BackgroundTask>) {
		let handle = spawn_periodic(task, self.root.child_token());
		self.handles.push(handle);
	}

	pub fn is_empty(&self) -> bool {
		self.handles.is_empty()
	}

	pub fn handle(&self, name: &str) -> Option<&TaskHandle> {
		self.handles.iter().find(|h| h.name() == name)
	}

	pub fn stop_all(&self) {
		self.root.cancel();
	}

	pub async fn wait_all(&self) {
		for handle in &self.handles {
			handle.wait().await;
		}
	}

	pub async fn get_metrics(&self) -> HashMap<String, TaskMetrics> {
		let mut out = HashMap::with_capacity(self.handles.len());
		for handle in &self.handles {
			out.insert(handle.name().to_string(), handle.metrics().await);
		}
		out
	}
}

impl Default for BackgroundTaskManager {
	fn default() -> Self {
		Self::new()
	}
}
