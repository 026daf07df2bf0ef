pub mod context;
pub mod database;
pub mod metrics;

pub use context::{ContextError, RequestContext};
pub use database::{
	Bucket, BucketOptions, DatabaseConfig, DatabaseError, DatabaseResult, Event, EventType, Events,
	ExtraInfo, RetentionPolicy, SqliteBucket, SqliteStore, Store, SuggestedActions,
};
pub use metrics::{Metric, Metrics, MetricsStore, ReadOptions, Scraper, SqliteMetricsStore, Syncer};
