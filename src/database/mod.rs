//! Database module for retention-bounded event storage
//!
//! Events are persisted in SQLite, one table per bucket, with a background
//! purge loop per bucket enforcing its retention window.

pub mod background_tasks;
pub mod codec;
pub mod config;
pub mod error;
pub mod sqlite;
pub mod stats;
pub mod storage;
pub mod types;

pub use config::DatabaseConfig;
pub use error::{CodecError, DatabaseError, DatabaseResult};
pub use stats::{DatabaseStats, NoopRecorder, Operation, OperationRecorder, OperationStats};
pub use storage::{Bucket, BucketOptions, Events, RetentionPolicy, SqliteBucket, SqliteStore, Store};
pub use types::{Event, EventType, ExtraInfo, RepairActionType, SuggestedActions};
