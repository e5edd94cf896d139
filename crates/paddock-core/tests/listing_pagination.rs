// crates/paddock-core/tests/listing_pagination.rs
// ============================================================================
// Module: Listing Pagination Tests
// Description: Cursor-driven listings across DAOs and the metrics walk.
// Purpose: Verify paged listings are complete, ordered, and duplicate-free.
// ============================================================================

//! Pagination scenarios: small pages must stitch together into exactly the
//! full listing, ordering indexes must hold, and counting must agree.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;

use paddock_core::InMemoryTableStore;
use paddock_core::JobKind;
use paddock_core::JobName;
use paddock_core::JobStatus;
use paddock_core::LeaderboardRecord;
use paddock_core::ModelRecord;
use paddock_core::ModelStatus;
use paddock_core::NoopStoreEvents;
use paddock_core::ProfileRecord;
use paddock_core::ResourceId;
use paddock_core::StoreEventSink;
use paddock_core::SubmissionRecord;
use paddock_core::TableStore;
use paddock_core::Timestamp;
use paddock_core::collect_system_metrics;
use paddock_core::runtime::dao::LeaderboardDao;
use paddock_core::runtime::dao::ModelDao;
use paddock_core::runtime::dao::ProfileDao;
use paddock_core::runtime::dao::SubmissionDao;
use paddock_core::runtime::metrics::count_all;

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

fn harness() -> (Arc<dyn TableStore>, Arc<dyn StoreEventSink>) {
    (Arc::new(InMemoryTableStore::new()), Arc::new(NoopStoreEvents))
}

fn profile(model_count: u32) -> ProfileRecord {
    ProfileRecord {
        id: ResourceId::generate(),
        alias: "racer".to_owned(),
        compute_minutes_used: 0,
        compute_minutes_queued: 0,
        max_total_compute_minutes: None,
        model_count,
        max_model_count: None,
    }
}

#[test]
fn small_pages_stitch_into_the_full_model_listing() {
    let (store, events) = harness();
    let dao = ModelDao::new(Arc::clone(&store), Arc::clone(&events));
    let now = ts(1_000);
    let profile_id = ResourceId::generate();

    let mut expected = Vec::new();
    for index in 0..5 {
        let record = ModelRecord {
            id: ResourceId::generate(),
            profile_id: profile_id.clone(),
            name: format!("model-{index}"),
            status: ModelStatus::Ready,
            artifact_location: None,
        };
        dao.create(&record, now).expect("create model");
        expected.push(record.id);
    }
    expected.sort_by(|a, b| a.as_str().cmp(b.as_str()));

    let full = dao.list_ids(&profile_id, None, Some(100)).expect("full listing");
    assert!(full.next.is_none());
    assert_eq!(full.items, expected);

    let mut paged = Vec::new();
    let mut cursor = None;
    let mut pages = 0;
    loop {
        let page = dao.list_ids(&profile_id, cursor, Some(2)).expect("page");
        pages += 1;
        paged.extend(page.items);
        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    assert_eq!(pages, 3, "five items at page size two need three pages");
    assert_eq!(paged, expected);
}

#[test]
fn leaderboards_list_in_close_time_order() {
    let (store, events) = harness();
    let dao = LeaderboardDao::new(store, events);
    let now = ts(1_000);

    let closes = [ts(30_000), ts(10_000), ts(20_000)];
    for (index, closes_at) in closes.iter().enumerate() {
        let record = LeaderboardRecord {
            id: ResourceId::generate(),
            name: format!("circuit-{index}"),
            opens_at: ts(0),
            closes_at: *closes_at,
        };
        dao.create(&record, now).expect("create leaderboard");
    }

    let page = dao.list_by_close_time(None, None).expect("listing");
    let order: Vec<i64> =
        page.items.iter().map(|stored| stored.record.closes_at.as_unix_millis()).collect();
    assert_eq!(order, vec![10_000, 20_000, 30_000]);
}

#[test]
fn profile_submissions_list_newest_first_across_leaderboards() {
    let (store, events) = harness();
    let dao = SubmissionDao::new(store, events);
    let profile_id = ResourceId::generate();
    let model_id = ResourceId::generate();
    let boards = [ResourceId::generate(), ResourceId::generate()];

    for (index, created) in [ts(1_000), ts(3_000), ts(2_000)].iter().enumerate() {
        let id = ResourceId::generate();
        let record = SubmissionRecord {
            id: id.clone(),
            leaderboard_id: boards[index % 2].clone(),
            profile_id: profile_id.clone(),
            model_id: model_id.clone(),
            job_name: JobName::compose(JobKind::Submission, &id),
            status: JobStatus::Queued,
            max_time_in_minutes: 5,
            backend: paddock_core::BackendRefs::default(),
            created_at: *created,
            started_at: None,
            ended_at: None,
        };
        dao.create(&record, *created).expect("create submission");
    }

    let page = dao.list_by_profile(&profile_id, None, None).expect("listing");
    let order: Vec<i64> =
        page.items.iter().map(|stored| stored.record.created_at.as_unix_millis()).collect();
    assert_eq!(order, vec![3_000, 2_000, 1_000]);
}

#[test]
fn count_all_drains_every_page() {
    let (store, events) = harness();
    let dao = ProfileDao::new(Arc::clone(&store), Arc::clone(&events));
    let now = ts(1_000);
    for _ in 0..7 {
        dao.create(&profile(0), now).expect("create profile");
    }

    let total = count_all(|cursor| dao.list_ids(cursor, Some(3))).expect("count");
    assert_eq!(total, 7);
}

#[test]
fn system_metrics_sum_model_counters_across_profiles() {
    let (store, events) = harness();
    let profiles = ProfileDao::new(Arc::clone(&store), Arc::clone(&events));
    let leaderboards = LeaderboardDao::new(Arc::clone(&store), Arc::clone(&events));
    let now = ts(1_000);

    for model_count in [2, 0, 5] {
        profiles.create(&profile(model_count), now).expect("create profile");
    }
    leaderboards
        .create(
            &LeaderboardRecord {
                id: ResourceId::generate(),
                name: "open circuit".to_owned(),
                opens_at: ts(0),
                closes_at: ts(9_000),
            },
            now,
        )
        .expect("create leaderboard");

    let metrics = collect_system_metrics(&profiles, &leaderboards, Some(2)).expect("metrics");
    assert_eq!(metrics.profiles, 3);
    assert_eq!(metrics.models, 7);
    assert_eq!(metrics.leaderboards, 1);
}
