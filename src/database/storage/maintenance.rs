//! Maintenance operations
//!
//! Space reclamation after purges. SQLite does not shrink the file on
//! DELETE; VACUUM rewrites it and the WAL checkpoint truncates the log.

use crate::context::RequestContext;
use crate::database::error::{DatabaseError, DatabaseResult};
use sqlx::SqlitePool;
use std::time::Instant;
use tracing::info;

/// Checkpoint the WAL and VACUUM the database through the writable pool
pub async fn compact_database(ctx: &RequestContext, db: &SqlitePool) -> DatabaseResult<()> {
	let start = Instant::now();
	ctx.run(async {
		sqlx::query("PRAGMA wal_checkpoint(TRUNCATE);")
			.execute(db)
			.await
			.map_err(|e| DatabaseError::engine("checkpoint", "database", e))?;
		sqlx::query("VACUUM;")
			.execute(db)
			.await
			.map_err(|e| DatabaseError::engine("vacuum", "database", e))?;
		Ok::<(), DatabaseError>(())
	})
	.await?;
	info!("Compacted database in {:?}", start.elapsed());
	Ok(())
}
