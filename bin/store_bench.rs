//! Benchmark utility for bucket throughput on a real database file
//!
//! Usage: cargo run --bin store_bench -- <event_count> [database_path]
//!
//! Inserts synthetic events into one bucket, then reports insert, dedup-find,
//! range get and purge timings plus the store's operation statistics.

use health_store::database::{BucketOptions, DatabaseConfig, SqliteStore, Store};
use health_store::{Event, EventType, RequestContext};
use std::env;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt().init();

	let args: Vec<String> = env::args().collect();
	if args.len() < 2 || args.len() > 3 {
		eprintln!("Usage: {} <event_count> [database_path]", args[0]);
		std::process::exit(1);
	}
	let count: i64 = args[1].parse()?;
	let database_path = match args.get(2) {
		Some(path) => PathBuf::from(path),
		None => env::temp_dir().join(format!("store_bench-{}.db", std::process::id())),
	};

	let config = DatabaseConfig {
		database_path: database_path.clone(),
		..DatabaseConfig::ephemeral()
	};
	let store = SqliteStore::open(config).await?;
	let bucket = store
		.bucket("store bench", BucketOptions::new().disable_purge())
		.await?;
	let ctx = RequestContext::background();
	info!("Benchmarking {} events in {}", count, database_path.display());

	let base = chrono::Utc::now().timestamp() - count;
	let events: Vec<Event> = (0..count)
		.map(|i| {
			Event::new(base + i, "store_bench", EventType::Warning)
				.with_message(format!("synthetic event {i}"))
				.with_extra_info([("sequence", i.to_string())])
		})
		.collect();

	let start = Instant::now();
	for event in &events {
		bucket.insert(&ctx, event).await?;
	}
	let elapsed = start.elapsed();
	println!(
		"Inserted {count} events in {elapsed:?} ({:.2} events/sec)",
		count as f64 / elapsed.as_secs_f64()
	);

	let start = Instant::now();
	let mut found = 0u64;
	for event in events.iter().step_by(10) {
		if bucket.find(&ctx, event).await?.is_some() {
			found += 1;
		}
	}
	println!("Found {found} sampled events in {:?}", start.elapsed());

	let start = Instant::now();
	let fetched = bucket.get(&ctx, base - 1).await?.map_or(0, |events| events.len());
	println!("Fetched {fetched} events in {:?}", start.elapsed());

	let start = Instant::now();
	let purged = bucket.purge(&ctx, base + count / 2).await?;
	println!("Purged {purged} events in {:?}", start.elapsed());

	if let Some(stats) = store.stats() {
		println!(
			"Operation stats: inserts={} (avg {:.3} ms), selects={} (avg {:.3} ms), deletes={} (avg {:.3} ms)",
			stats.insert_operations,
			stats.avg_insert_ms,
			stats.select_operations,
			stats.avg_select_ms,
			stats.delete_operations,
			stats.avg_delete_ms
		);
	}

	bucket.close();
	store.close().await;
	if args.get(2).is_none() {
		let _ = std::fs::remove_file(&database_path);
	}
	Ok(())
}
