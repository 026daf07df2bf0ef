//! Event storage operations
//!
//! SQL for a single bucket table: insert, dedup-find, range get, latest and
//! purge. Writes use the read-write pool, everything else the read-only pool.

use super::tables::{
	COLUMN_EXTRA_INFO, COLUMN_MESSAGE, COLUMN_NAME, COLUMN_SUGGESTED_ACTIONS, COLUMN_TIMESTAMP,
	COLUMN_TYPE,
};
use crate::context::RequestContext;
use crate::database::codec::{self, EXTRA_INFO, SUGGESTED_ACTIONS};
use crate::database::error::{DatabaseError, DatabaseResult};
use crate::database::stats::{Operation, OperationRecorder};
use crate::database::types::{Event, EventType, ExtraInfo, SuggestedActions};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use std::time::Instant;

pub type Events = Vec<Event>;

/// Handle to one bucket table and the pools that reach it
pub struct EventTable {
	table: String,
	db_rw: SqlitePool,
	db_ro: SqlitePool,
	recorder: Arc<dyn OperationRecorder>,
	select_columns: String,
}

impl EventTable {
	pub fn new(
		table: String, db_rw: SqlitePool, db_ro: SqlitePool, recorder: Arc<dyn OperationRecorder>,
	) -> Self {
		let select_columns = [
			COLUMN_TIMESTAMP,
			COLUMN_NAME,
			COLUMN_TYPE,
			COLUMN_MESSAGE,
			COLUMN_EXTRA_INFO,
			COLUMN_SUGGESTED_ACTIONS,
		]
		.join(", ");
		Self {
			table,
			db_rw,
			db_ro,
			recorder,
			select_columns,
		}
	}

	pub fn table(&self) -> &str {
		&self.table
	}

	/// Append one event. Never deduplicates.
	pub async fn insert(&self, ctx: &RequestContext, event: &Event) -> DatabaseResult<()> {
		let extra_info = codec::encode(EXTRA_INFO, event.extra_info.as_ref())?;
		let suggested_actions = codec::encode(SUGGESTED_ACTIONS, event.suggested_actions.as_ref())?;

		let statement = format!(
			"INSERT INTO {} ({COLUMN_TIMESTAMP}, {COLUMN_NAME}, {COLUMN_TYPE}, {COLUMN_MESSAGE}, {COLUMN_EXTRA_INFO}, {COLUMN_SUGGESTED_ACTIONS}) \
			 VALUES (?, ?, ?, NULLIF(?, ''), NULLIF(?, ''), NULLIF(?, ''))",
			self.table
		);

		let start = Instant::now();
		let result = ctx
			.run(async {
				sqlx::query(&statement)
					.bind(event.time)
					.bind(&event.name)
					.bind(event.event_type.as_str())
					.bind(&event.message)
					.bind(extra_info.as_deref())
					.bind(suggested_actions.as_deref())
					.execute(&self.db_rw)
					.await
					.map_err(|e| DatabaseError::engine("insert", &self.table, e))
			})
			.await;
		self.recorder.observe(Operation::InsertUpdate, start.elapsed());

		result.map(|_| ())
	}

	/// Find the first stored event matching `probe`.
	///
	/// Time, name and type always match exactly; message and suggested
	/// actions only when the probe sets them. Extra info is compared after
	/// the query on each candidate, in insertion order.
	pub async fn find(&self, ctx: &RequestContext, probe: &Event) -> DatabaseResult<Option<Event>> {
		let suggested_actions = codec::encode(SUGGESTED_ACTIONS, probe.suggested_actions.as_ref())?;

		let mut statement = format!(
			"SELECT {} FROM {} WHERE {COLUMN_TIMESTAMP} = ? AND {COLUMN_NAME} = ? AND {COLUMN_TYPE} = ?",
			self.select_columns, self.table
		);
		if !probe.message.is_empty() {
			statement.push_str(&format!(" AND {COLUMN_MESSAGE} = ?"));
		}
		if suggested_actions.is_some() {
			statement.push_str(&format!(" AND {COLUMN_SUGGESTED_ACTIONS} = ?"));
		}
		statement.push_str(" ORDER BY rowid ASC");

		let mut query = sqlx::query(&statement)
			.bind(probe.time)
			.bind(&probe.name)
			.bind(probe.event_type.as_str());
		if !probe.message.is_empty() {
			query = query.bind(&probe.message);
		}
		if let Some(actions) = suggested_actions.as_deref() {
			query = query.bind(actions);
		}

		let rows = self.select(ctx, "find", query.fetch_all(&self.db_ro)).await?;
		for row in &rows {
			let candidate = self.decode_row(row)?;
			if candidate.extra_info_matches(probe) {
				return Ok(Some(candidate));
			}
		}
		Ok(None)
	}

	/// Events with time strictly after `since`, newest first; `None` when there are none
	pub async fn get(&self, ctx: &RequestContext, since: i64) -> DatabaseResult<Option<Events>> {
		let statement = format!(
			"SELECT {} FROM {} WHERE {COLUMN_TIMESTAMP} > ? ORDER BY {COLUMN_TIMESTAMP} DESC, rowid DESC",
			self.select_columns, self.table
		);
		let query = sqlx::query(&statement).bind(since);
		let rows = self.select(ctx, "get", query.fetch_all(&self.db_ro)).await?;

		if rows.is_empty() {
			return Ok(None);
		}
		let events = rows
			.iter()
			.map(|row| self.decode_row(row))
			.collect::<DatabaseResult<Events>>()?;
		Ok(Some(events))
	}

	/// The most recent event by time
	pub async fn latest(&self, ctx: &RequestContext) -> DatabaseResult<Option<Event>> {
		let statement = format!(
			"SELECT {} FROM {} ORDER BY {COLUMN_TIMESTAMP} DESC, rowid DESC LIMIT 1",
			self.select_columns, self.table
		);
		let query = sqlx::query(&statement);
		let row = self
			.select(ctx, "latest", query.fetch_optional(&self.db_ro))
			.await?;
		row.map(|row| self.decode_row(&row)).transpose()
	}

	/// Delete events with time strictly before `before`; returns how many were removed
	pub async fn purge(&self, ctx: &RequestContext, before: i64) -> DatabaseResult<u64> {
		let statement = format!("DELETE FROM {} WHERE {COLUMN_TIMESTAMP} < ?", self.table);

		let start = Instant::now();
		let result = ctx
			.run(async {
				sqlx::query(&statement)
					.bind(before)
					.execute(&self.db_rw)
					.await
					.map_err(|e| DatabaseError::engine("purge", &self.table, e))
			})
			.await;
		self.recorder.observe(Operation::Delete, start.elapsed());

		Ok(result?.rows_affected())
	}

	async fn select<T, F>(&self, ctx: &RequestContext, operation: &'static str, fetch: F) -> DatabaseResult<T>
	where
		F: std::future::Future<Output = Result<T, sqlx::Error>>,
	{
		let start = Instant::now();
		let result = ctx
			.run(async {
				fetch
					.await
					.map_err(|e| DatabaseError::engine(operation, &self.table, e))
			})
			.await;
		self.recorder.observe(Operation::Select, start.elapsed());
		result
	}

	fn decode_row(&self, row: &SqliteRow) -> DatabaseResult<Event> {
		let scan = |e| DatabaseError::engine("scan", &self.table, e);

		let time: i64 = row.try_get(0).map_err(scan)?;
		let name: String = row.try_get(1).map_err(scan)?;
		let event_type: String = row.try_get(2).map_err(scan)?;
		let message: Option<String> = row.try_get(3).map_err(scan)?;
		let extra_info: Option<String> = row.try_get(4).map_err(scan)?;
		let suggested_actions: Option<String> = row.try_get(5).map_err(scan)?;

		let event_type = event_type.parse::<EventType>().unwrap_or_default();
		Ok(Event {
			time,
			name,
			event_type,
			message: message.unwrap_or_default(),
			extra_info: codec::decode_field::<ExtraInfo>(EXTRA_INFO, extra_info.as_deref())?,
			suggested_actions: codec::decode_field::<SuggestedActions>(
				SUGGESTED_ACTIONS,
				suggested_actions.as_deref(),
			)?,
		})
	}
}
