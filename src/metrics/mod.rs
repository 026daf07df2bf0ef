//! Numeric metric samples, their store and the scrape/record/purge syncer

pub mod store;
pub mod syncer;

use crate::context::RequestContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use store::SqliteMetricsStore;
pub use syncer::Syncer;

/// One sample collected by a scrape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
	/// Collection time
	pub unix_milliseconds: i64,
	pub component: String,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
	pub value: f64,
}

impl Metric {
	pub fn new(
		unix_milliseconds: i64, component: impl Into<String>, name: impl Into<String>, value: f64,
	) -> Self {
		Self {
			unix_milliseconds,
			component: component.into(),
			name: name.into(),
			label: None,
			value,
		}
	}

	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}
}

pub type Metrics = Vec<Metric>;

/// Filters for [`MetricsStore::read`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
	/// Only samples collected at or after this time (unix milliseconds)
	pub since: Option<i64>,
	/// Only samples from these components; empty selects all
	pub components: BTreeSet<String>,
}

impl ReadOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn since(mut self, since: DateTime<Utc>) -> Self {
		self.since = Some(since.timestamp_millis());
		self
	}

	pub fn since_unix_millis(mut self, since: i64) -> Self {
		self.since = Some(since);
		self
	}

	pub fn with_component(mut self, component: impl Into<String>) -> Self {
		self.components.insert(component.into());
		self
	}

	/// Whether `metric` passes these filters
	pub fn matches(&self, metric: &Metric) -> bool {
		if let Some(since) = self.since {
			if metric.unix_milliseconds < since {
				return false;
			}
		}
		self.components.is_empty() || self.components.contains(&metric.component)
	}
}

/// Produces a fresh batch of samples on demand
#[async_trait::async_trait]
pub trait Scraper: Send + Sync {
	async fn scrape(&self, ctx: &RequestContext) -> anyhow::Result<Metrics>;
}

/// Persists samples; must tolerate concurrent record, read and purge
#[async_trait::async_trait]
pub trait MetricsStore: Send + Sync {
	async fn record(&self, ctx: &RequestContext, metrics: &[Metric]) -> anyhow::Result<()>;

	async fn read(&self, ctx: &RequestContext, options: &ReadOptions) -> anyhow::Result<Metrics>;

	/// Delete samples collected before `before`; returns how many were removed
	async fn purge(&self, ctx: &RequestContext, before: DateTime<Utc>) -> anyhow::Result<u64>;
}
