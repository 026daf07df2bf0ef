//! Common test utilities for the health-store library

#![allow(dead_code)]

use chrono::Utc;
use health_store::database::{Bucket, BucketOptions, DatabaseConfig, SqliteStore, Store};
use health_store::{Event, EventType};
use std::sync::Arc;
use tempfile::TempDir;

/// Create a temporary directory for testing
pub fn setup_temp_dir() -> TempDir {
	TempDir::new().expect("Failed to create temp directory")
}

/// Route library logs through the test harness; later calls are no-ops
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Ephemeral configuration rooted in `dir`
pub fn test_config(dir: &TempDir) -> DatabaseConfig {
	DatabaseConfig {
		database_path: dir.path().join("health_store_test.db"),
		..DatabaseConfig::ephemeral()
	}
}

/// Open a store on a fresh database with no retention and no compaction
pub async fn open_test_store() -> (TempDir, SqliteStore) {
	init_tracing();
	let temp_dir = setup_temp_dir();
	let store = SqliteStore::open(test_config(&temp_dir))
		.await
		.expect("Failed to open store");
	(temp_dir, store)
}

/// Open a store and one bucket without a purge loop
pub async fn open_test_bucket(name: &str) -> (TempDir, SqliteStore, Arc<dyn Bucket>) {
	let (temp_dir, store) = open_test_store().await;
	let bucket = store
		.bucket(name, BucketOptions::new().disable_purge())
		.await
		.expect("Failed to create bucket");
	(temp_dir, store, bucket)
}

pub fn now_secs() -> i64 {
	Utc::now().timestamp()
}

/// Create `count` events one second apart, oldest first
pub fn create_test_events(count: usize, start: i64) -> Vec<Event> {
	(0..count)
		.map(|i| {
			Event::new(start + i as i64, "test_event", EventType::Warning)
				.with_message(format!("Test message {i}"))
				.with_extra_info([("key", format!("value_{i}"))])
		})
		.collect()
}
