//! Background task framework and the store's periodic tasks

mod impls;
mod manager;

pub use impls::{CompactionTask, PurgeTask};
pub use manager::{
	spawn_periodic, BackgroundTask, BackgroundTaskManager, TaskFuture, TaskHandle, TaskMetrics,
};
