//! Table naming and schema for event buckets
//!
//! Every bucket is one table named `components_<name>_events_<schema>`. The
//! schema version is part of the name, so a layout change starts a fresh
//! table and old tables are orphaned instead of migrated.

use crate::context::RequestContext;
use crate::database::error::{DatabaseError, DatabaseResult};
use sqlx::SqlitePool;

pub const SCHEMA_VERSION: &str = "v0_4_0";

const TABLE_PREFIX: &str = "components";
const TABLE_KIND: &str = "events";

/// Event time in unix seconds
pub const COLUMN_TIMESTAMP: &str = "timestamp";
/// Event source, e.g. "memory_oom" or "kmsg"
pub const COLUMN_NAME: &str = "name";
/// Event classification, e.g. "Warning"
pub const COLUMN_TYPE: &str = "type";
pub const COLUMN_MESSAGE: &str = "message";
/// JSON object or NULL
pub const COLUMN_EXTRA_INFO: &str = "extra_info";
/// JSON object or NULL
pub const COLUMN_SUGGESTED_ACTIONS: &str = "suggested_actions";

/// Derive the physical table name for a logical bucket name.
///
/// Spaces and hyphens become underscores, runs of underscores collapse to
/// one and the result is lowercased. No validation happens here; see
/// [`bucket_table_name`].
pub fn derive_table_name(name: &str) -> String {
	let replaced = name.replace([' ', '-'], "_");
	let mut collapsed = String::with_capacity(replaced.len());
	for c in replaced.chars() {
		if c == '_' && collapsed.ends_with('_') {
			continue;
		}
		collapsed.push(c);
	}
	format!(
		"{TABLE_PREFIX}_{}_{TABLE_KIND}_{SCHEMA_VERSION}",
		collapsed.to_lowercase()
	)
}

/// Derive and validate the physical table name for a logical bucket name.
///
/// The derived name is interpolated into SQL, so anything outside
/// `[a-z0-9_]` is rejected before the database sees it.
pub fn bucket_table_name(name: &str) -> DatabaseResult<String> {
	let table = derive_table_name(name);
	if let Some(bad) = table
		.chars()
		.find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_'))
	{
		return Err(DatabaseError::InvalidBucketName {
			name: name.to_string(),
			reason: format!("character {bad:?} is not allowed in a table name"),
		});
	}
	Ok(table)
}

fn index_statement(table: &str, column: &str) -> String {
	format!("CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table}({column});")
}

/// Create the bucket table and its three indexes in one transaction.
///
/// Uses IF NOT EXISTS throughout, so concurrent creators of the same bucket
/// all succeed once the single writer connection serializes them.
pub async fn create_event_table(ctx: &RequestContext, db: &SqlitePool, table: &str) -> DatabaseResult<()> {
	let statements = [
		format!(
			"CREATE TABLE IF NOT EXISTS {table} (
	{COLUMN_TIMESTAMP} INTEGER NOT NULL,
	{COLUMN_NAME} TEXT NOT NULL,
	{COLUMN_TYPE} TEXT NOT NULL,
	{COLUMN_MESSAGE} TEXT,
	{COLUMN_EXTRA_INFO} TEXT,
	{COLUMN_SUGGESTED_ACTIONS} TEXT
);"
		),
		index_statement(table, COLUMN_TIMESTAMP),
		index_statement(table, COLUMN_NAME),
		index_statement(table, COLUMN_TYPE),
	];

	ctx.run(async {
		let mut tx = db
			.begin()
			.await
			.map_err(|e| DatabaseError::engine("create table", table, e))?;
		for statement in &statements {
			sqlx::query(statement)
				.execute(&mut *tx)
				.await
				.map_err(|e| DatabaseError::engine("create table", table, e))?;
		}
		tx.commit()
			.await
			.map_err(|e| DatabaseError::engine("create table", table, e))
	})
	.await
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_derive_table_name() {
		let cases = [
			("test", "components_test_events_v0_4_0"),
			("test component", "components_test_component_events_v0_4_0"),
			("test-component", "components_test_component_events_v0_4_0"),
			("TestComponent", "components_testcomponent_events_v0_4_0"),
			("Test Component-Name", "components_test_component_name_events_v0_4_0"),
			("", "components__events_v0_4_0"),
			("test  component--name", "components_test_component_name_events_v0_4_0"),
			("accelerator-nvidia-xid", "components_accelerator_nvidia_xid_events_v0_4_0"),
		];
		for (input, expected) in cases {
			assert_eq!(derive_table_name(input), expected, "input {input:?}");
		}
	}

	#[test]
	fn test_derivation_is_idempotent_for_equivalent_names() {
		assert_eq!(derive_table_name("GPU Temp"), derive_table_name("gpu-temp"));
		assert_eq!(derive_table_name("gpu   temp"), derive_table_name("gpu_temp"));
	}

	#[test]
	fn test_bucket_table_name_rejects_unsafe_names() {
		assert!(bucket_table_name("invalid;table;name").is_err());
		assert!(bucket_table_name("drop table x)").is_err());
		assert!(bucket_table_name("quote\"name").is_err());
		assert!(bucket_table_name("gpü").is_err());

		let err = bucket_table_name("a.b").unwrap_err();
		assert!(matches!(err, DatabaseError::InvalidBucketName { .. }));

		assert_eq!(
			bucket_table_name("cpu").unwrap(),
			"components_cpu_events_v0_4_0"
		);
		assert!(bucket_table_name("").is_ok());
	}
}
