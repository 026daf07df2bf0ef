//! Latency observations for database operations
//!
//! Buckets and the metrics store report how long each insert, select and
//! delete took. Stores count them with [`OperationStats`] unless another
//! recorder is installed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
	InsertUpdate,
	Select,
	Delete,
}

/// Sink for operation latencies
pub trait OperationRecorder: Send + Sync {
	fn observe(&self, operation: Operation, elapsed: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl OperationRecorder for NoopRecorder {
	fn observe(&self, _operation: Operation, _elapsed: Duration) {}
}

/// Snapshot of recorded operation counts and mean latencies
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseStats {
	pub insert_operations: u64,
	pub select_operations: u64,
	pub delete_operations: u64,
	pub avg_insert_ms: f64,
	pub avg_select_ms: f64,
	pub avg_delete_ms: f64,
}

#[derive(Debug, Default)]
struct Counter {
	count: AtomicU64,
	total_micros: AtomicU64,
}

impl Counter {
	fn add(&self, elapsed: Duration) {
		self.count.fetch_add(1, Ordering::Relaxed);
		let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
		self.total_micros.fetch_add(micros, Ordering::Relaxed);
	}

	fn snapshot(&self) -> (u64, f64) {
		let count = self.count.load(Ordering::Relaxed);
		let total = self.total_micros.load(Ordering::Relaxed);
		let avg_ms = if count == 0 {
			0.0
		} else {
			total as f64 / count as f64 / 1000.0
		};
		(count, avg_ms)
	}
}

/// In-process recorder keeping counts and cumulative latency per operation
#[derive(Debug, Default)]
pub struct OperationStats {
	inserts: Counter,
	selects: Counter,
	deletes: Counter,
}

impl OperationStats {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn snapshot(&self) -> DatabaseStats {
		let (insert_operations, avg_insert_ms) = self.inserts.snapshot();
		let (select_operations, avg_select_ms) = self.selects.snapshot();
		let (delete_operations, avg_delete_ms) = self.deletes.snapshot();
		DatabaseStats {
			insert_operations,
			select_operations,
			delete_operations,
			avg_insert_ms,
			avg_select_ms,
			avg_delete_ms,
		}
	}
}

impl OperationRecorder for OperationStats {
	fn observe(&self, operation: Operation, elapsed: Duration) {
		match operation {
			Operation::InsertUpdate => self.inserts.add(elapsed),
			Operation::Select => self.selects.add(elapsed),
			Operation::Delete => self.deletes.add(elapsed),
		}
	}
}
