//! Storage module for database operations

pub mod bucket;
pub mod event_retention;
pub mod event_storage;
pub mod maintenance;
pub mod store;
pub mod tables;

// Re-export the main traits and implementation
pub use bucket::{Bucket, SqliteBucket};
pub use event_retention::RetentionPolicy;
pub use event_storage::{EventTable, Events};
pub use store::{BucketOptions, SqliteStore, Store};
pub use tables::{bucket_table_name, derive_table_name, SCHEMA_VERSION};
