//! SQLite-backed metrics store
//!
//! All samples share one table. Writes go through the read-write pool inside
//! a transaction per batch; reads use the read-only pool.

use super::{Metric, Metrics, MetricsStore, ReadOptions};
use crate::context::RequestContext;
use crate::database::error::{DatabaseError, DatabaseResult};
use crate::database::stats::{Operation, OperationRecorder};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const METRICS_SCHEMA_VERSION: &str = "v0_5_0";

const COLUMN_UNIX_MILLISECONDS: &str = "unix_milliseconds";
const COLUMN_COMPONENT: &str = "component";
const COLUMN_NAME: &str = "name";
const COLUMN_LABEL: &str = "label";
const COLUMN_VALUE: &str = "value";

pub fn metrics_table_name() -> String {
	format!("metrics_{METRICS_SCHEMA_VERSION}")
}

pub struct SqliteMetricsStore {
	table: String,
	db_rw: SqlitePool,
	db_ro: SqlitePool,
	recorder: Arc<dyn OperationRecorder>,
}

impl SqliteMetricsStore {
	/// Create the metrics table and indexes if missing
	pub async fn new(
		db_rw: SqlitePool, db_ro: SqlitePool, recorder: Arc<dyn OperationRecorder>,
	) -> DatabaseResult<Self> {
		let table = metrics_table_name();
		let statements = [
			format!(
				"CREATE TABLE IF NOT EXISTS {table} (
	{COLUMN_UNIX_MILLISECONDS} INTEGER NOT NULL,
	{COLUMN_COMPONENT} TEXT NOT NULL,
	{COLUMN_NAME} TEXT NOT NULL,
	{COLUMN_LABEL} TEXT,
	{COLUMN_VALUE} REAL NOT NULL
);"
			),
			format!(
				"CREATE INDEX IF NOT EXISTS idx_{table}_{COLUMN_UNIX_MILLISECONDS} ON {table}({COLUMN_UNIX_MILLISECONDS});"
			),
			format!(
				"CREATE INDEX IF NOT EXISTS idx_{table}_{COLUMN_COMPONENT}_{COLUMN_NAME} ON {table}({COLUMN_COMPONENT}, {COLUMN_NAME});"
			),
		];

		let ctx = RequestContext::with_timeout(Duration::from_secs(10));
		ctx.run(async {
			let mut tx = db_rw
				.begin()
				.await
				.map_err(|e| DatabaseError::engine("create table", &table, e))?;
			for statement in &statements {
				sqlx::query(statement)
					.execute(&mut *tx)
					.await
					.map_err(|e| DatabaseError::engine("create table", &table, e))?;
			}
			tx.commit()
				.await
				.map_err(|e| DatabaseError::engine("create table", &table, e))
		})
		.await?;

		Ok(Self {
			table,
			db_rw,
			db_ro,
			recorder,
		})
	}

	pub fn table(&self) -> &str {
		&self.table
	}

	/// Insert all samples in one transaction
	pub async fn record_metrics(&self, ctx: &RequestContext, metrics: &[Metric]) -> DatabaseResult<()> {
		ctx.check()?;
		if metrics.is_empty() {
			return Ok(());
		}

		let statement = format!(
			"INSERT INTO {} ({COLUMN_UNIX_MILLISECONDS}, {COLUMN_COMPONENT}, {COLUMN_NAME}, {COLUMN_LABEL}, {COLUMN_VALUE}) \
			 VALUES (?, ?, ?, NULLIF(?, ''), ?)",
			self.table
		);
		let table = self.table.as_str();

		let start = Instant::now();
		let result = ctx
			.run(async {
				let mut tx = self
					.db_rw
					.begin()
					.await
					.map_err(|e| DatabaseError::engine("record", table, e))?;
				for metric in metrics {
					sqlx::query(&statement)
						.bind(metric.unix_milliseconds)
						.bind(&metric.component)
						.bind(&metric.name)
						.bind(metric.label.as_deref())
						.bind(metric.value)
						.execute(&mut *tx)
						.await
						.map_err(|e| DatabaseError::engine("record", table, e))?;
				}
				tx.commit()
					.await
					.map_err(|e| DatabaseError::engine("record", table, e))
			})
			.await;
		self.recorder.observe(Operation::InsertUpdate, start.elapsed());
		result
	}

	/// Samples passing `options`, oldest first
	pub async fn read_metrics(&self, ctx: &RequestContext, options: &ReadOptions) -> DatabaseResult<Metrics> {
		let mut statement = format!(
			"SELECT {COLUMN_UNIX_MILLISECONDS}, {COLUMN_COMPONENT}, {COLUMN_NAME}, {COLUMN_LABEL}, {COLUMN_VALUE} FROM {}",
			self.table
		);
		let mut clauses = Vec::new();
		if options.since.is_some() {
			clauses.push(format!("{COLUMN_UNIX_MILLISECONDS} >= ?"));
		}
		if !options.components.is_empty() {
			let placeholders = vec!["?"; options.components.len()].join(", ");
			clauses.push(format!("{COLUMN_COMPONENT} IN ({placeholders})"));
		}
		if !clauses.is_empty() {
			statement.push_str(" WHERE ");
			statement.push_str(&clauses.join(" AND "));
		}
		statement.push_str(&format!(" ORDER BY {COLUMN_UNIX_MILLISECONDS} ASC"));

		let mut query = sqlx::query(&statement);
		if let Some(since) = options.since {
			query = query.bind(since);
		}
		for component in &options.components {
			query = query.bind(component);
		}

		let start = Instant::now();
		let rows = ctx
			.run(async {
				query
					.fetch_all(&self.db_ro)
					.await
					.map_err(|e| DatabaseError::engine("read", &self.table, e))
			})
			.await;
		self.recorder.observe(Operation::Select, start.elapsed());

		rows?.iter().map(|row| self.decode_row(row)).collect()
	}

	/// Delete samples older than `before`
	pub async fn purge_metrics(&self, ctx: &RequestContext, before: DateTime<Utc>) -> DatabaseResult<u64> {
		let statement = format!("DELETE FROM {} WHERE {COLUMN_UNIX_MILLISECONDS} < ?", self.table);

		let start = Instant::now();
		let result = ctx
			.run(async {
				sqlx::query(&statement)
					.bind(before.timestamp_millis())
					.execute(&self.db_rw)
					.await
					.map_err(|e| DatabaseError::engine("purge", &self.table, e))
			})
			.await;
		self.recorder.observe(Operation::Delete, start.elapsed());

		Ok(result?.rows_affected())
	}

	fn decode_row(&self, row: &SqliteRow) -> DatabaseResult<Metric> {
		let scan = |e| DatabaseError::engine("scan", &self.table, e);
		Ok(Metric {
			unix_milliseconds: row.try_get(0).map_err(scan)?,
			component: row.try_get(1).map_err(scan)?,
			name: row.try_get(2).map_err(scan)?,
			label: row.try_get(3).map_err(scan)?,
			value: row.try_get(4).map_err(scan)?,
		})
	}
}

#[async_trait::async_trait]
impl MetricsStore for SqliteMetricsStore {
	async fn record(&self, ctx: &RequestContext, metrics: &[Metric]) -> anyhow::Result<()> {
		Ok(self.record_metrics(ctx, metrics).await?)
	}

	async fn read(&self, ctx: &RequestContext, options: &ReadOptions) -> anyhow::Result<Metrics> {
		Ok(self.read_metrics(ctx, options).await?)
	}

	async fn purge(&self, ctx: &RequestContext, before: DateTime<Utc>) -> anyhow::Result<u64> {
		Ok(self.purge_metrics(ctx, before).await?)
	}
}
