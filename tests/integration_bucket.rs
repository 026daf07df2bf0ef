//! Integration tests for bucket operations against a real SQLite file
//!
//! Covers insert/get ordering, range exclusivity, dedup lookups, purge,
//! timestamp boundaries and malformed stored payloads.

mod common;

use common::{create_test_events, now_secs, open_test_bucket, open_test_store};
use health_store::database::types::RepairActionType;
use health_store::database::{BucketOptions, DatabaseError, Store};
use health_store::{Event, EventType, RequestContext, SuggestedActions};

#[tokio::test]
async fn test_bucket_name_is_physical_table() {
	let (_temp_dir, _store, bucket) = open_test_bucket("test-component").await;
	assert_eq!(bucket.name(), "components_test_component_events_v0_4_0");
}

#[tokio::test]
async fn test_insert_and_get_newest_first() {
	let (_temp_dir, _store, bucket) = open_test_bucket("test_events").await;
	let ctx = RequestContext::background();
	let base = now_secs() - 100;

	let events = create_test_events(10, base);
	for event in &events {
		bucket.insert(&ctx, event).await.expect("Failed to insert event");
	}

	let stored = bucket
		.get(&ctx, base - 1)
		.await
		.expect("Failed to get events")
		.expect("Expected events");
	assert_eq!(stored.len(), 10);
	for pair in stored.windows(2) {
		assert!(pair[0].time > pair[1].time, "events must be newest first");
	}
	assert_eq!(stored[0], events[9]);
	assert_eq!(stored[9], events[0]);
}

#[tokio::test]
async fn test_get_range_is_exclusive() {
	let (_temp_dir, _store, bucket) = open_test_bucket("range").await;
	let ctx = RequestContext::background();
	let base = now_secs() - 100;

	for event in create_test_events(5, base) {
		bucket.insert(&ctx, &event).await.unwrap();
	}

	// since == base + 2 excludes base, base + 1 and base + 2
	let events = bucket.get(&ctx, base + 2).await.unwrap().unwrap();
	let times: Vec<i64> = events.iter().map(|e| e.time).collect();
	assert_eq!(times, vec![base + 4, base + 3]);

	assert!(bucket.get(&ctx, base + 4).await.unwrap().is_none());
	assert!(bucket.get(&ctx, now_secs() + 3600).await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_since_datetime() {
	let (_temp_dir, _store, bucket) = open_test_bucket("since").await;
	let ctx = RequestContext::background();
	let now = chrono::Utc::now();

	bucket
		.insert(&ctx, &Event::at(now - chrono::Duration::seconds(30), "since", EventType::Info))
		.await
		.unwrap();
	bucket
		.insert(&ctx, &Event::at(now, "since", EventType::Info))
		.await
		.unwrap();

	let events = bucket
		.get_since(&ctx, now - chrono::Duration::seconds(10))
		.await
		.unwrap()
		.unwrap();
	assert_eq!(events.len(), 1);
	assert_eq!(events[0].datetime().map(|t| t.timestamp()), Some(now.timestamp()));
}

#[tokio::test]
async fn test_empty_bucket() {
	let (_temp_dir, _store, bucket) = open_test_bucket("empty").await;
	let ctx = RequestContext::background();

	assert!(bucket.get(&ctx, 0).await.unwrap().is_none());
	assert!(bucket.latest(&ctx).await.unwrap().is_none());
	assert!(bucket
		.find(&ctx, &Event::new(now_secs(), "missing", EventType::Info))
		.await
		.unwrap()
		.is_none());
	assert_eq!(bucket.purge(&ctx, now_secs()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_multiple_event_types() {
	let (_temp_dir, _store, bucket) = open_test_bucket("types").await;
	let ctx = RequestContext::background();
	let base = now_secs() - 10;

	let types = [
		EventType::Unknown,
		EventType::Info,
		EventType::Warning,
		EventType::Critical,
		EventType::Fatal,
	];
	for (i, event_type) in types.iter().enumerate() {
		let event = Event::new(base + i as i64, "typed", *event_type).with_message(event_type.as_str());
		bucket.insert(&ctx, &event).await.unwrap();
	}

	let events = bucket.get(&ctx, base - 1).await.unwrap().unwrap();
	assert_eq!(events.len(), types.len());
	for (event, expected) in events.iter().rev().zip(types.iter()) {
		assert_eq!(event.event_type, *expected);
		assert_eq!(event.message, expected.as_str());
	}
}

#[tokio::test]
async fn test_purge_partial_and_idempotent() {
	let (_temp_dir, _store, bucket) = open_test_bucket("purge").await;
	let ctx = RequestContext::background();
	let base = now_secs() - 100;

	for event in create_test_events(10, base) {
		bucket.insert(&ctx, &event).await.unwrap();
	}

	let purged = bucket.purge(&ctx, base + 5).await.unwrap();
	assert_eq!(purged, 5);
	assert_eq!(bucket.purge(&ctx, base + 5).await.unwrap(), 0);

	let remaining = bucket.get(&ctx, base - 1).await.unwrap().unwrap();
	assert_eq!(remaining.len(), 5);
	assert!(remaining.iter().all(|e| e.time >= base + 5));
}

#[tokio::test]
async fn test_latest() {
	let (_temp_dir, _store, bucket) = open_test_bucket("latest").await;
	let ctx = RequestContext::background();
	let base = now_secs() - 100;

	// insertion order differs from time order
	for offset in [3, 9, 1, 5] {
		let event = Event::new(base + offset, "latest", EventType::Info).with_message(format!("at {offset}"));
		bucket.insert(&ctx, &event).await.unwrap();
	}

	let latest = bucket.latest(&ctx).await.unwrap().expect("Expected an event");
	assert_eq!(latest.time, base + 9);
	assert_eq!(latest.message, "at 9");
}

#[tokio::test]
async fn test_find_round_trips_every_field() {
	let (_temp_dir, _store, bucket) = open_test_bucket("find").await;
	let ctx = RequestContext::background();

	let event = Event::new(now_secs(), "find_test", EventType::Critical)
		.with_message("gpu fell off the bus")
		.with_extra_info([("gpu", "0"), ("xid", "79")])
		.with_suggested_actions(
			SuggestedActions::describe("reboot the host").with_repair_action(RepairActionType::RebootSystem),
		);
	bucket.insert(&ctx, &event).await.unwrap();

	let found = bucket.find(&ctx, &event).await.unwrap().expect("Expected a match");
	assert_eq!(found, event);
}

#[tokio::test]
async fn test_find_with_partial_probe() {
	let (_temp_dir, _store, bucket) = open_test_bucket("partial").await;
	let ctx = RequestContext::background();
	let now = now_secs();

	let stored = Event::new(now, "partial", EventType::Warning)
		.with_message("full message")
		.with_suggested_actions(SuggestedActions::describe("inspect"));
	bucket.insert(&ctx, &stored).await.unwrap();

	// message and suggested actions are only compared when the probe sets them
	let probe = Event::new(now, "partial", EventType::Warning);
	assert_eq!(bucket.find(&ctx, &probe).await.unwrap(), Some(stored.clone()));

	let wrong_message = probe.clone().with_message("other message");
	assert!(bucket.find(&ctx, &wrong_message).await.unwrap().is_none());

	let wrong_actions = probe.clone().with_suggested_actions(SuggestedActions::describe("reboot"));
	assert!(bucket.find(&ctx, &wrong_actions).await.unwrap().is_none());

	let wrong_type = Event::new(now, "partial", EventType::Info);
	assert!(bucket.find(&ctx, &wrong_type).await.unwrap().is_none());
}

#[tokio::test]
async fn test_find_multiple_matches_returns_earliest_inserted() {
	let (_temp_dir, _store, bucket) = open_test_bucket("multi").await;
	let ctx = RequestContext::background();
	let now = now_secs();

	let first = Event::new(now, "dup", EventType::Info).with_message("first");
	let second = Event::new(now, "dup", EventType::Info).with_message("second");
	bucket.insert(&ctx, &first).await.unwrap();
	bucket.insert(&ctx, &second).await.unwrap();

	let probe = Event::new(now, "dup", EventType::Info);
	assert_eq!(bucket.find(&ctx, &probe).await.unwrap(), Some(first));
}

#[tokio::test]
async fn test_find_extra_info_dedup() {
	let (_temp_dir, _store, bucket) = open_test_bucket("dedup").await;
	let ctx = RequestContext::background();
	let now = now_secs();

	let stored = Event::new(now, "dedup", EventType::Warning).with_extra_info([("a", "b")]);
	bucket.insert(&ctx, &stored).await.unwrap();

	let empty = Event::new(now, "dedup", EventType::Warning).with_extra_info(Vec::<(String, String)>::new());
	assert!(bucket.find(&ctx, &empty).await.unwrap().is_none());

	let absent = Event::new(now, "dedup", EventType::Warning);
	assert!(bucket.find(&ctx, &absent).await.unwrap().is_none());

	let superset = Event::new(now, "dedup", EventType::Warning).with_extra_info([("a", "b"), ("c", "d")]);
	assert!(bucket.find(&ctx, &superset).await.unwrap().is_none());

	let other_value = Event::new(now, "dedup", EventType::Warning).with_extra_info([("a", "c")]);
	assert!(bucket.find(&ctx, &other_value).await.unwrap().is_none());

	assert_eq!(bucket.find(&ctx, &stored).await.unwrap(), Some(stored.clone()));

	// a second event differing only in extra info is kept apart
	let sibling = Event::new(now, "dedup", EventType::Warning).with_extra_info([("a", "z")]);
	bucket.insert(&ctx, &sibling).await.unwrap();
	assert_eq!(bucket.find(&ctx, &sibling).await.unwrap(), Some(sibling));
	assert_eq!(bucket.find(&ctx, &stored).await.unwrap(), Some(stored));
}

#[tokio::test]
async fn test_no_suggested_actions_stored_as_null() {
	let (_temp_dir, store, bucket) = open_test_bucket("no_actions").await;
	let ctx = RequestContext::background();

	let event = Event::new(now_secs(), "plain", EventType::Info).with_message("nothing to do");
	bucket.insert(&ctx, &event).await.unwrap();

	let stored = bucket.latest(&ctx).await.unwrap().unwrap();
	assert!(stored.suggested_actions.is_none());
	assert!(stored.extra_info.is_none());

	let (null_count,): (i64,) = sqlx::query_as(&format!(
		"SELECT COUNT(*) FROM {} WHERE suggested_actions IS NULL AND extra_info IS NULL",
		bucket.name()
	))
	.fetch_one(store.db_ro())
	.await
	.unwrap();
	assert_eq!(null_count, 1);
}

#[tokio::test]
async fn test_special_characters_and_unicode() {
	let (_temp_dir, _store, bucket) = open_test_bucket("unicode").await;
	let ctx = RequestContext::background();
	let now = now_secs();

	let event = Event::new(now, "名前 with 'quotes' and \"doubles\"", EventType::Info)
		.with_message("Ünïcödé 🚀 -- ; DROP TABLE x; \n\t\\")
		.with_extra_info([("ключ", "值 'v'"), ("emoji", "🔥")])
		.with_suggested_actions(SuggestedActions::describe("détails « ici »"));
	bucket.insert(&ctx, &event).await.unwrap();

	assert_eq!(bucket.find(&ctx, &event).await.unwrap(), Some(event.clone()));
	assert_eq!(bucket.get(&ctx, now - 1).await.unwrap(), Some(vec![event]));
}

#[tokio::test]
async fn test_large_message() {
	let (_temp_dir, _store, bucket) = open_test_bucket("large").await;
	let ctx = RequestContext::background();

	let message = "x".repeat(100 * 1024);
	let event = Event::new(now_secs(), "large", EventType::Info)
		.with_message(message.clone())
		.with_extra_info([("payload", "y".repeat(10 * 1024))]);
	bucket.insert(&ctx, &event).await.unwrap();

	let found = bucket.find(&ctx, &event).await.unwrap().expect("Expected a match");
	assert_eq!(found.message.len(), message.len());
	assert_eq!(found, event);
}

#[tokio::test]
async fn test_timestamp_boundaries() {
	let (_temp_dir, _store, bucket) = open_test_bucket("boundaries").await;
	let ctx = RequestContext::background();

	let times = [0, -1, 1 << 32, -(1 << 31), 1 << 62, -((1 << 62) + 100)];
	for time in times {
		let event = Event::new(time, "boundary", EventType::Info);
		bucket.insert(&ctx, &event).await.unwrap();
		assert_eq!(
			bucket.find(&ctx, &event).await.unwrap().map(|e| e.time),
			Some(time),
			"time {time}"
		);
	}

	let all = bucket.get(&ctx, i64::MIN).await.unwrap().unwrap();
	assert_eq!(all.len(), times.len());
	let mut expected = times.to_vec();
	expected.sort_unstable_by(|a, b| b.cmp(a));
	assert_eq!(all.iter().map(|e| e.time).collect::<Vec<_>>(), expected);

	assert!(bucket.get(&ctx, i64::MAX).await.unwrap().is_none());
	assert_eq!(bucket.latest(&ctx).await.unwrap().unwrap().time, 1 << 62);
}

#[tokio::test]
async fn test_malformed_extra_info_fails_get() {
	let (_temp_dir, store, bucket) = open_test_bucket("malformed").await;
	let ctx = RequestContext::background();
	let now = now_secs();

	bucket
		.insert(&ctx, &Event::new(now - 1, "good", EventType::Info))
		.await
		.unwrap();
	sqlx::query(&format!(
		"INSERT INTO {} (timestamp, name, type, extra_info) VALUES (?, ?, ?, ?)",
		bucket.name()
	))
	.bind(now)
	.bind("bad")
	.bind("Info")
	.bind("[1, 2, 3]")
	.execute(store.db_rw())
	.await
	.unwrap();

	let err = bucket.get(&ctx, now - 10).await.unwrap_err();
	assert!(err.is_decode());
	assert!(err.to_string().contains("failed to unmarshal"), "{err}");
	assert!(err.to_string().contains("invalid JSON"), "{err}");
}

#[tokio::test]
async fn test_malformed_suggested_actions_fails_get() {
	let (_temp_dir, store, bucket) = open_test_bucket("malformed_actions").await;
	let ctx = RequestContext::background();
	let now = now_secs();

	sqlx::query(&format!(
		"INSERT INTO {} (timestamp, name, type, suggested_actions) VALUES (?, ?, ?, ?)",
		bucket.name()
	))
	.bind(now)
	.bind("bad")
	.bind("Warning")
	.bind("{not json")
	.execute(store.db_rw())
	.await
	.unwrap();

	let err = bucket.get(&ctx, now - 10).await.unwrap_err();
	assert!(err.to_string().contains("failed to unmarshal suggested actions"), "{err}");
}

#[tokio::test]
async fn test_stored_null_text_reads_as_absent() {
	let (_temp_dir, store, bucket) = open_test_bucket("null_text").await;
	let ctx = RequestContext::background();
	let now = now_secs();

	sqlx::query(&format!(
		"INSERT INTO {} (timestamp, name, type, extra_info, suggested_actions) VALUES (?, ?, ?, ?, ?)",
		bucket.name()
	))
	.bind(now)
	.bind("legacy")
	.bind("Info")
	.bind("null")
	.bind("")
	.execute(store.db_rw())
	.await
	.unwrap();

	let event = bucket.latest(&ctx).await.unwrap().unwrap();
	assert!(event.extra_info.is_none());
	assert!(event.suggested_actions.is_none());
}

#[tokio::test]
async fn test_invalid_bucket_name_rejected() {
	let (_temp_dir, store) = open_test_store().await;

	let err = match store.bucket("invalid;table;name", BucketOptions::new()).await {
		Err(err) => err,
		Ok(_) => panic!("unsafe bucket name was accepted"),
	};
	assert!(matches!(err, DatabaseError::InvalidBucketName { .. }), "{err}");
}

#[tokio::test]
async fn test_equivalent_names_share_a_table() {
	let (_temp_dir, store) = open_test_store().await;
	let ctx = RequestContext::background();

	let first = store.bucket("GPU Temp", BucketOptions::new()).await.unwrap();
	let second = store.bucket("gpu-temp", BucketOptions::new()).await.unwrap();
	assert_eq!(first.name(), second.name());

	let event = Event::new(now_secs(), "shared", EventType::Info);
	first.insert(&ctx, &event).await.unwrap();
	assert_eq!(second.find(&ctx, &event).await.unwrap(), Some(event));
}

#[tokio::test]
async fn test_close_keeps_data() {
	let (_temp_dir, store) = open_test_store().await;
	let ctx = RequestContext::background();

	let bucket = store.bucket("closing", BucketOptions::new()).await.unwrap();
	let event = Event::new(now_secs(), "kept", EventType::Info);
	bucket.insert(&ctx, &event).await.unwrap();
	bucket.close();
	bucket.close();

	let reopened = store.bucket("closing", BucketOptions::new()).await.unwrap();
	assert_eq!(reopened.find(&ctx, &event).await.unwrap(), Some(event));
}
