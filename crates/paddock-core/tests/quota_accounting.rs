// crates/paddock-core/tests/quota_accounting.rs
// ============================================================================
// Module: Quota Accounting Tests
// Description: Admission, release, rollback, and monthly-reset behavior.
// Purpose: Verify both quota tiers under sequential and concurrent load.
// ============================================================================

//! Quota engine scenarios: tier precedence, rollback on account rejection,
//! settlement arithmetic, the monthly reset walk, and concurrent admission.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;

use paddock_core::CapacityExceeded;
use paddock_core::InMemoryTableStore;
use paddock_core::NoopStoreEvents;
use paddock_core::ProfileRecord;
use paddock_core::QuotaEngine;
use paddock_core::QuotaError;
use paddock_core::QuotaLimits;
use paddock_core::ResourceId;
use paddock_core::StoreEventSink;
use paddock_core::TableStore;
use paddock_core::Timestamp;
use paddock_core::UsagePeriod;
use paddock_core::runtime::dao::AccountUsageDao;
use paddock_core::runtime::dao::ProfileDao;

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

fn period() -> UsagePeriod {
    UsagePeriod::new(2024, 6).expect("valid period")
}

/// Builds an engine over fresh in-memory state.
fn engine(ceiling: u64) -> (QuotaEngine, ProfileDao) {
    let store: Arc<dyn TableStore> = Arc::new(InMemoryTableStore::new());
    let events: Arc<dyn StoreEventSink> = Arc::new(NoopStoreEvents);
    let profiles = ProfileDao::new(Arc::clone(&store), Arc::clone(&events));
    let usage = AccountUsageDao::new(store, events);
    let engine = QuotaEngine::new(
        profiles.clone(),
        usage,
        QuotaLimits {
            account_monthly_minutes_ceiling: ceiling,
            default_max_total_compute_minutes: Some(100),
            default_max_model_count: Some(5),
        },
    );
    (engine, profiles)
}

/// Registers a profile with the given compute cap.
fn seed_profile(profiles: &ProfileDao, cap: Option<u64>, now: Timestamp) -> ResourceId {
    let record = ProfileRecord {
        id: ResourceId::generate(),
        alias: "racer".to_owned(),
        compute_minutes_used: 0,
        compute_minutes_queued: 0,
        max_total_compute_minutes: cap,
        model_count: 3,
        max_model_count: Some(5),
    };
    profiles.create(&record, now).expect("create profile");
    record.id
}

#[test]
fn admission_reserves_on_both_tiers() {
    let (engine, profiles) = engine(1_000);
    let now = ts(1_000);
    let profile_id = seed_profile(&profiles, Some(100), now);

    engine.admit(&profile_id, period(), 40, now).expect("admit");

    let profile = profiles.load(&profile_id).expect("profile");
    assert_eq!(profile.record.compute_minutes_queued, 40);
    assert_eq!(profile.record.compute_minutes_used, 0);
}

#[test]
fn profile_cap_rejects_before_the_account_is_touched() {
    let (engine, profiles) = engine(1_000);
    let now = ts(1_000);
    let profile_id = seed_profile(&profiles, Some(100), now);

    engine.admit(&profile_id, period(), 80, now).expect("first admit");
    let err = engine.admit(&profile_id, period(), 30, now).expect_err("over the cap");
    match err {
        QuotaError::Capacity(CapacityExceeded::Profile { requested, available, cap, .. }) => {
            assert_eq!(requested, 30);
            assert_eq!(available, 20);
            assert_eq!(cap, 100);
        }
        other => panic!("expected a profile rejection, got {other:?}"),
    }

    // The failed request reserved nothing.
    let profile = profiles.load(&profile_id).expect("profile");
    assert_eq!(profile.record.compute_minutes_queued, 80);
}

#[test]
fn account_rejection_rolls_back_the_profile_reservation() {
    let (engine, profiles) = engine(50);
    let now = ts(1_000);
    let profile_id = seed_profile(&profiles, None, now);

    let err = engine.admit(&profile_id, period(), 60, now).expect_err("over the ceiling");
    match err {
        QuotaError::Capacity(CapacityExceeded::Account { requested, available, .. }) => {
            assert_eq!(requested, 60);
            assert_eq!(available, 50);
        }
        other => panic!("expected an account rejection, got {other:?}"),
    }

    let profile = profiles.load(&profile_id).expect("profile");
    assert_eq!(profile.record.compute_minutes_queued, 0);
}

#[test]
fn uncapped_profiles_are_bounded_only_by_the_ceiling() {
    let (engine, profiles) = engine(500);
    let now = ts(1_000);
    let profile_id = seed_profile(&profiles, None, now);

    engine.admit(&profile_id, period(), 450, now).expect("within ceiling");
    assert!(matches!(
        engine.admit(&profile_id, period(), 100, now),
        Err(QuotaError::Capacity(CapacityExceeded::Account { .. }))
    ));
}

#[test]
fn release_settles_consumption_capped_at_the_reservation() {
    let (engine, profiles) = engine(1_000);
    let now = ts(1_000);
    let profile_id = seed_profile(&profiles, Some(100), now);

    engine.admit(&profile_id, period(), 40, now).expect("admit");
    // Backend claims 55 minutes against a 40-minute reservation; the cap
    // keeps a misreporting backend from inflating usage.
    engine.release(&profile_id, period(), 40, 55, now).expect("release");

    let profile = profiles.load(&profile_id).expect("profile");
    assert_eq!(profile.record.compute_minutes_queued, 0);
    assert_eq!(profile.record.compute_minutes_used, 40);

    engine.admit(&profile_id, period(), 30, now).expect("admit again");
    engine.release(&profile_id, period(), 30, 12, now).expect("release early stop");
    let profile = profiles.load(&profile_id).expect("profile");
    assert_eq!(profile.record.compute_minutes_queued, 0);
    assert_eq!(profile.record.compute_minutes_used, 52);
}

#[test]
fn monthly_reset_zeroes_usage_but_preserves_reservations() {
    let (engine, profiles) = engine(1_000);
    let now = ts(1_000);
    let first = seed_profile(&profiles, Some(100), now);
    let second = seed_profile(&profiles, Some(100), now);

    engine.admit(&first, period(), 20, now).expect("admit");
    engine.release(&first, period(), 20, 20, now).expect("release");
    engine.admit(&second, period(), 15, now).expect("admit, still running");

    let report = engine.reset_monthly(period(), Some(1), ts(2_000)).expect("reset");
    assert_eq!(report.reset.len(), 2);
    assert!(report.failed.is_empty());
    // Page size 1 over two profiles walks at least two pages.
    assert!(report.batches >= 2);

    let first = profiles.load(&first).expect("profile");
    assert_eq!(first.record.compute_minutes_used, 0);
    assert_eq!(first.record.model_count, 0);
    let second = profiles.load(&second).expect("profile");
    assert_eq!(second.record.compute_minutes_queued, 15);
    assert_eq!(second.record.model_count, 0);
}

#[test]
fn concurrent_admissions_never_overcommit_the_profile_cap() {
    let (engine, profiles) = engine(10_000);
    let now = ts(1_000);
    let profile_id = seed_profile(&profiles, Some(10), now);

    let engine = Arc::new(engine);
    let mut handles = Vec::new();
    for _ in 0..3 {
        let engine = Arc::clone(&engine);
        let profile_id = profile_id.clone();
        handles.push(std::thread::spawn(move || {
            engine.admit(&profile_id, period(), 5, now).is_ok()
        }));
    }
    let admitted = handles
        .into_iter()
        .map(|handle| handle.join())
        .filter(|result| matches!(result, Ok(true)))
        .count() as u64;

    assert!(admitted >= 1, "at least one admission must win");
    let profile = profiles.load(&profile_id).expect("profile");
    assert_eq!(profile.record.compute_minutes_queued, admitted * 5);
    assert!(profile.record.compute_minutes_queued <= 10, "cap must hold under contention");
}

#[test]
fn concurrent_admissions_never_overcommit_the_account_ceiling() {
    let store: Arc<dyn TableStore> = Arc::new(InMemoryTableStore::new());
    let events: Arc<dyn StoreEventSink> = Arc::new(NoopStoreEvents);
    let profiles = ProfileDao::new(Arc::clone(&store), Arc::clone(&events));
    let usage = AccountUsageDao::new(store, events);
    let engine = Arc::new(QuotaEngine::new(
        profiles.clone(),
        usage.clone(),
        QuotaLimits {
            account_monthly_minutes_ceiling: 10,
            default_max_total_compute_minutes: None,
            default_max_model_count: Some(5),
        },
    ));
    let now = ts(1_000);
    let first = seed_profile(&profiles, None, now);
    let second = seed_profile(&profiles, None, now);

    // Two uncapped profiles race 8-minute requests into 10 remaining
    // account minutes; the ceiling can fit at most one of them.
    let mut handles = Vec::new();
    for profile_id in [first.clone(), second.clone()] {
        let engine = Arc::clone(&engine);
        handles.push(std::thread::spawn(move || {
            engine.admit(&profile_id, period(), 8, now).is_ok()
        }));
    }
    let admitted = handles
        .into_iter()
        .map(|handle| handle.join())
        .filter(|result| matches!(result, Ok(true)))
        .count() as u64;

    assert!(admitted <= 1, "ceiling must hold under contention");
    let account = usage.get(period()).expect("read usage").expect("usage record");
    assert_eq!(account.record.minutes_queued, admitted * 8);
    assert_eq!(account.record.minutes_used, 0);

    // The losing request rolled back its profile reservation, so only the
    // winner still holds minutes.
    let first = profiles.load(&first).expect("profile");
    let second = profiles.load(&second).expect("profile");
    assert_eq!(
        first.record.compute_minutes_queued + second.record.compute_minutes_queued,
        admitted * 8
    );
}
