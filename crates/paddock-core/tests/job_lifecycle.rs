// crates/paddock-core/tests/job_lifecycle.rs
// ============================================================================
// Module: Job Lifecycle Tests
// Description: End-to-end control-plane scenarios over the in-memory store.
// Purpose: Exercise admission, dispatch, stop, and status reporting together.
// ============================================================================

//! Control-plane lifecycle scenarios: training, evaluation, and submission
//! jobs walked through their state machines against a fake backend.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use paddock_core::BackendError;
use paddock_core::BackendJobReport;
use paddock_core::BackendRefs;
use paddock_core::ComputeBackend;
use paddock_core::ControlPlane;
use paddock_core::ControlPlaneError;
use paddock_core::CreateJobRequest;
use paddock_core::DispatchOutcome;
use paddock_core::EntityType;
use paddock_core::InMemoryTableStore;
use paddock_core::ItemKey;
use paddock_core::JobIds;
use paddock_core::JobKind;
use paddock_core::JobLaunchSpec;
use paddock_core::JobName;
use paddock_core::JobStatus;
use paddock_core::JobTicket;
use paddock_core::LeaderboardRecord;
use paddock_core::ModelStatus;
use paddock_core::NoopStoreEvents;
use paddock_core::QueryPage;
use paddock_core::QueryRequest;
use paddock_core::QuotaLimits;
use paddock_core::RawItem;
use paddock_core::ResourceId;
use paddock_core::StoreError;
use paddock_core::TableStore;
use paddock_core::Timestamp;

/// Backend double that records calls and serves scripted billing reports.
#[derive(Default)]
struct FakeBackend {
    started: Mutex<Vec<String>>,
    stopped: Mutex<Vec<String>>,
    reports: Mutex<Vec<(String, BackendJobReport)>>,
}

impl FakeBackend {
    fn script_report(&self, name: &JobName, report: BackendJobReport) {
        self.reports.lock().unwrap().push((name.as_str().to_owned(), report));
    }

    fn started_jobs(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    fn stopped_jobs(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }
}

impl ComputeBackend for FakeBackend {
    fn start_job(
        &self,
        name: &JobName,
        _spec: &JobLaunchSpec,
    ) -> Result<BackendRefs, BackendError> {
        self.started.lock().unwrap().push(name.as_str().to_owned());
        Ok(BackendRefs {
            compute_job_ref: Some(format!("job-ref/{}", name.as_str())),
            video_stream: Some(format!("stream/{}", name.as_str())),
            heartbeat_location: None,
        })
    }

    fn stop_job(&self, name: &JobName) -> Result<(), BackendError> {
        self.stopped.lock().unwrap().push(name.as_str().to_owned());
        Ok(())
    }

    fn describe_job(&self, name: &JobName) -> Result<BackendJobReport, BackendError> {
        let reports = self.reports.lock().unwrap();
        reports
            .iter()
            .rev()
            .find(|(job, _)| job == name.as_str())
            .map(|(_, report)| report.clone())
            .ok_or_else(|| BackendError::UnknownJob { job: name.as_str().to_owned() })
    }
}

/// Assembles a control plane over fresh in-memory state.
fn plane() -> (ControlPlane, Arc<FakeBackend>) {
    let backend = Arc::new(FakeBackend::default());
    let backend_dyn: Arc<dyn ComputeBackend> = backend.clone();
    let plane = ControlPlane::new(
        Arc::new(InMemoryTableStore::new()),
        Arc::new(NoopStoreEvents),
        backend_dyn,
        QuotaLimits {
            account_monthly_minutes_ceiling: 10_000,
            default_max_total_compute_minutes: Some(500),
            default_max_model_count: Some(10),
        },
    );
    (plane, backend)
}

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

/// Registers a profile and a ready model, returning their identifiers.
fn seed_model(plane: &ControlPlane, now: Timestamp) -> (ResourceId, ResourceId) {
    let profile = plane.register_profile("speedster", now).expect("register profile");
    let model =
        plane.register_model(&profile.record.id, "zephyr-v1", now).expect("register model");
    (profile.record.id, model.record.id)
}

fn training_request(profile_id: &ResourceId, model_id: &ResourceId) -> CreateJobRequest {
    CreateJobRequest {
        kind: JobKind::Training,
        model_id: model_id.clone(),
        profile_id: profile_id.clone(),
        leaderboard_id: None,
        max_time_in_minutes: 10,
    }
}

fn ids(profile_id: &ResourceId, model_id: &ResourceId) -> JobIds {
    JobIds {
        model_id: model_id.clone(),
        profile_id: profile_id.clone(),
        leaderboard_id: None,
    }
}

/// Walks a training to completion so the model is ready with an artifact.
fn train_to_ready(
    plane: &ControlPlane,
    backend: &FakeBackend,
    profile_id: &ResourceId,
    model_id: &ResourceId,
    now: Timestamp,
) -> JobTicket {
    let ticket =
        plane.create_job(&training_request(profile_id, model_id), now).expect("create training");
    let job_ids = ids(profile_id, model_id);
    plane.dispatch_job(&ticket.job_name, &job_ids, now).expect("dispatch");
    plane
        .report_job_status(&ticket.job_name, &job_ids, JobStatus::InProgress, None, now)
        .expect("in progress");
    backend.script_report(
        &ticket.job_name,
        BackendJobReport {
            billable_seconds: 540,
            artifact_location: Some("artifacts/zephyr-v1/model.tar.gz".to_owned()),
        },
    );
    plane
        .report_job_status(&ticket.job_name, &job_ids, JobStatus::Completed, None, now)
        .expect("completed");
    ticket
}

#[test]
fn training_runs_from_queued_to_completed() {
    let (plane, backend) = plane();
    let now = ts(1_000);
    let (profile_id, model_id) = seed_model(&plane, now);

    let ticket = plane
        .create_job(&training_request(&profile_id, &model_id), now)
        .expect("create training");
    assert_eq!(ticket.job_id, model_id);
    let model = plane.models().load(&profile_id, &model_id).expect("model");
    assert_eq!(model.record.status, ModelStatus::Queued);

    let job_ids = ids(&profile_id, &model_id);
    let outcome = plane.dispatch_job(&ticket.job_name, &job_ids, ts(2_000)).expect("dispatch");
    assert_eq!(outcome, DispatchOutcome::Started);
    assert_eq!(backend.started_jobs(), vec![ticket.job_name.as_str().to_owned()]);
    let model = plane.models().load(&profile_id, &model_id).expect("model");
    assert_eq!(model.record.status, ModelStatus::Training);

    let summary = plane
        .report_job_status(&ticket.job_name, &job_ids, JobStatus::InProgress, None, ts(3_000))
        .expect("in progress");
    assert_eq!(summary.status, JobStatus::InProgress);
    assert_eq!(summary.started_at, Some(ts(3_000)));

    backend.script_report(
        &ticket.job_name,
        BackendJobReport {
            billable_seconds: 301,
            artifact_location: Some("artifacts/final.tar.gz".to_owned()),
        },
    );
    let summary = plane
        .report_job_status(&ticket.job_name, &job_ids, JobStatus::Completed, None, ts(4_000))
        .expect("completed");
    assert_eq!(summary.status, JobStatus::Completed);
    assert_eq!(summary.ended_at, Some(ts(4_000)));

    let model = plane.models().load(&profile_id, &model_id).expect("model");
    assert_eq!(model.record.status, ModelStatus::Ready);
    assert_eq!(model.record.artifact_location.as_deref(), Some("artifacts/final.tar.gz"));

    // 301 billable seconds settle as 6 whole minutes; the reservation is gone.
    let profile = plane.profiles().load(&profile_id).expect("profile");
    assert_eq!(profile.record.compute_minutes_used, 6);
    assert_eq!(profile.record.compute_minutes_queued, 0);
}

#[test]
fn second_job_on_a_claimed_model_is_rejected() {
    let (plane, _backend) = plane();
    let now = ts(1_000);
    let (profile_id, model_id) = seed_model(&plane, now);

    plane.create_job(&training_request(&profile_id, &model_id), now).expect("first job");
    let err = plane
        .create_job(&training_request(&profile_id, &model_id), now)
        .expect_err("second job must lose");
    assert!(matches!(err, ControlPlaneError::JobAlreadyActive { .. }));

    // The loser must not leak its reservation.
    let profile = plane.profiles().load(&profile_id).expect("profile");
    assert_eq!(profile.record.compute_minutes_queued, 10);
}

/// Store wrapper that rewrites the model's stored status on its second read
/// after arming, simulating a transition landing between the eligibility
/// check and the claim write.
struct FlippingStore {
    inner: InMemoryTableStore,
    armed: AtomicBool,
    model_reads: AtomicU32,
}

impl FlippingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryTableStore::new(),
            armed: AtomicBool::new(false),
            model_reads: AtomicU32::new(0),
        }
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl TableStore for FlippingStore {
    fn get(&self, key: &ItemKey) -> Result<Option<RawItem>, StoreError> {
        let mut item = self.inner.get(key)?;
        if self.armed.load(Ordering::SeqCst)
            && let Some(raw) = item.as_mut()
            && raw.entity_type == EntityType::Model
            && self.model_reads.fetch_add(1, Ordering::SeqCst) + 1 == 2
            && let Some(status) = raw.payload.get_mut("status")
        {
            *status = serde_json::Value::from("error");
        }
        Ok(item)
    }

    fn put_new(&self, item: RawItem) -> Result<(), StoreError> {
        self.inner.put_new(item)
    }

    fn update(
        &self,
        key: &ItemKey,
        item: RawItem,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        self.inner.update(key, item, expected_version)
    }

    fn delete(&self, key: &ItemKey) -> Result<(), StoreError> {
        self.inner.delete(key)
    }

    fn query(&self, request: &QueryRequest) -> Result<QueryPage, StoreError> {
        self.inner.query(request)
    }
}

#[test]
fn claim_that_races_into_an_error_model_reports_model_not_ready() {
    let store = Arc::new(FlippingStore::new());
    let store_dyn: Arc<dyn TableStore> = store.clone();
    let backend: Arc<dyn ComputeBackend> = Arc::new(FakeBackend::default());
    let plane = ControlPlane::new(
        store_dyn,
        Arc::new(NoopStoreEvents),
        backend,
        QuotaLimits {
            account_monthly_minutes_ceiling: 10_000,
            default_max_total_compute_minutes: Some(500),
            default_max_model_count: Some(10),
        },
    );
    let now = ts(1_000);
    let (profile_id, model_id) = seed_model(&plane, now);

    // The eligibility check sees Ready; the claim's re-read sees Error.
    store.arm();
    let request = CreateJobRequest {
        kind: JobKind::Evaluation,
        model_id: model_id.clone(),
        profile_id: profile_id.clone(),
        leaderboard_id: None,
        max_time_in_minutes: 5,
    };
    let err = plane.create_job(&request, now).expect_err("claim must lose");
    assert!(matches!(
        err,
        ControlPlaneError::ModelNotReady { status: ModelStatus::Error, .. }
    ));

    // The rejected request holds no reservation.
    let profile = plane.profiles().load(&profile_id).expect("profile");
    assert_eq!(profile.record.compute_minutes_queued, 0);
}

#[test]
fn failed_training_marks_the_model_error_and_allows_retraining() {
    let (plane, backend) = plane();
    let now = ts(1_000);
    let (profile_id, model_id) = seed_model(&plane, now);

    let ticket = plane
        .create_job(&training_request(&profile_id, &model_id), now)
        .expect("create training");
    let job_ids = ids(&profile_id, &model_id);
    plane.dispatch_job(&ticket.job_name, &job_ids, now).expect("dispatch");
    backend.script_report(
        &ticket.job_name,
        BackendJobReport { billable_seconds: 60, artifact_location: None },
    );
    plane
        .report_job_status(&ticket.job_name, &job_ids, JobStatus::Failed, None, ts(2_000))
        .expect("failed");

    let model = plane.models().load(&profile_id, &model_id).expect("model");
    assert_eq!(model.record.status, ModelStatus::Error);

    // Retraining from Error is allowed; evaluating is not.
    let eval = CreateJobRequest {
        kind: JobKind::Evaluation,
        max_time_in_minutes: 5,
        ..training_request(&profile_id, &model_id)
    };
    assert!(matches!(
        plane.create_job(&eval, ts(3_000)),
        Err(ControlPlaneError::ModelNotReady { .. })
    ));
    // The old training record still occupies the fixed sort key, so the
    // structural guard rejects the retry and restores the model untouched.
    let err = plane
        .create_job(&training_request(&profile_id, &model_id), ts(3_000))
        .expect_err("retrain collides with the existing record");
    assert!(matches!(err, ControlPlaneError::JobAlreadyActive { .. }));
    let model = plane.models().load(&profile_id, &model_id).expect("model");
    assert_eq!(model.record.status, ModelStatus::Error);
    let profile = plane.profiles().load(&profile_id).expect("profile");
    assert_eq!(profile.record.compute_minutes_queued, 0);
}

#[test]
fn stopping_a_queued_job_cancels_without_backend_calls() {
    let (plane, backend) = plane();
    let now = ts(1_000);
    let (profile_id, model_id) = seed_model(&plane, now);

    plane.create_job(&training_request(&profile_id, &model_id), now).expect("create training");
    let summary = plane.stop_job(&model_id, &profile_id, ts(2_000)).expect("stop");
    assert_eq!(summary.status, JobStatus::Canceled);
    assert_eq!(summary.ended_at, Some(ts(2_000)));
    assert!(backend.stopped_jobs().is_empty());

    let profile = plane.profiles().load(&profile_id).expect("profile");
    assert_eq!(profile.record.compute_minutes_queued, 0);
    assert_eq!(profile.record.compute_minutes_used, 0);
}

#[test]
fn dispatch_after_cancellation_is_skipped() {
    let (plane, backend) = plane();
    let now = ts(1_000);
    let (profile_id, model_id) = seed_model(&plane, now);

    let ticket = plane
        .create_job(&training_request(&profile_id, &model_id), now)
        .expect("create training");
    plane.stop_job(&model_id, &profile_id, ts(2_000)).expect("stop");

    let outcome = plane
        .dispatch_job(&ticket.job_name, &ids(&profile_id, &model_id), ts(3_000))
        .expect("dispatch");
    assert_eq!(outcome, DispatchOutcome::Skipped);
    assert!(backend.started_jobs().is_empty());
}

#[test]
fn stopping_a_running_job_goes_through_stopping() {
    let (plane, backend) = plane();
    let now = ts(1_000);
    let (profile_id, model_id) = seed_model(&plane, now);

    let ticket = plane
        .create_job(&training_request(&profile_id, &model_id), now)
        .expect("create training");
    let job_ids = ids(&profile_id, &model_id);
    plane.dispatch_job(&ticket.job_name, &job_ids, now).expect("dispatch");

    // Initializing jobs cannot be interrupted yet.
    assert!(matches!(
        plane.stop_job(&model_id, &profile_id, ts(2_000)),
        Err(ControlPlaneError::CannotStopInitializing { .. })
    ));

    plane
        .report_job_status(&ticket.job_name, &job_ids, JobStatus::InProgress, None, ts(3_000))
        .expect("in progress");
    let summary = plane.stop_job(&model_id, &profile_id, ts(4_000)).expect("stop");
    assert_eq!(summary.status, JobStatus::Stopping);
    assert_eq!(backend.stopped_jobs(), vec![ticket.job_name.as_str().to_owned()]);

    // A second stop while one is in flight is a conflict.
    assert!(matches!(
        plane.stop_job(&model_id, &profile_id, ts(5_000)),
        Err(ControlPlaneError::StopInProgress { .. })
    ));

    backend.script_report(
        &ticket.job_name,
        BackendJobReport { billable_seconds: 120, artifact_location: None },
    );
    plane
        .report_job_status(&ticket.job_name, &job_ids, JobStatus::Canceled, None, ts(6_000))
        .expect("canceled");
    let profile = plane.profiles().load(&profile_id).expect("profile");
    assert_eq!(profile.record.compute_minutes_used, 2);
    assert_eq!(profile.record.compute_minutes_queued, 0);
}

#[test]
fn get_stoppable_job_reads_without_mutating() {
    let (plane, _backend) = plane();
    let now = ts(1_000);
    let (profile_id, model_id) = seed_model(&plane, now);

    assert!(plane.get_stoppable_job(&model_id, &profile_id).expect("none yet").is_none());

    let ticket = plane
        .create_job(&training_request(&profile_id, &model_id), now)
        .expect("create training");
    let found = plane
        .get_stoppable_job(&model_id, &profile_id)
        .expect("lookup")
        .expect("queued training is stoppable");
    assert_eq!(found.job_name, ticket.job_name);
    assert_eq!(found.status, JobStatus::Queued);
}

#[test]
fn reported_status_must_be_a_legal_transition() {
    let (plane, _backend) = plane();
    let now = ts(1_000);
    let (profile_id, model_id) = seed_model(&plane, now);

    let ticket = plane
        .create_job(&training_request(&profile_id, &model_id), now)
        .expect("create training");
    let err = plane
        .report_job_status(
            &ticket.job_name,
            &ids(&profile_id, &model_id),
            JobStatus::Completed,
            None,
            ts(2_000),
        )
        .expect_err("queued cannot complete directly");
    assert!(matches!(
        err,
        ControlPlaneError::IllegalTransition { from: JobStatus::Queued, .. }
    ));
}

#[test]
fn evaluation_requires_a_ready_model_and_returns_it_to_ready() {
    let (plane, backend) = plane();
    let now = ts(1_000);
    let (profile_id, model_id) = seed_model(&plane, now);
    train_to_ready(&plane, &backend, &profile_id, &model_id, now);

    let request = CreateJobRequest {
        kind: JobKind::Evaluation,
        model_id: model_id.clone(),
        profile_id: profile_id.clone(),
        leaderboard_id: None,
        max_time_in_minutes: 5,
    };
    let ticket = plane.create_job(&request, ts(10_000)).expect("create evaluation");
    assert_eq!(ticket.job_name.kind(), JobKind::Evaluation);

    let job_ids = ids(&profile_id, &model_id);
    plane.dispatch_job(&ticket.job_name, &job_ids, ts(11_000)).expect("dispatch");
    let model = plane.models().load(&profile_id, &model_id).expect("model");
    assert_eq!(model.record.status, ModelStatus::Evaluating);

    plane
        .report_job_status(&ticket.job_name, &job_ids, JobStatus::InProgress, None, ts(12_000))
        .expect("in progress");
    backend.script_report(
        &ticket.job_name,
        BackendJobReport { billable_seconds: 180, artifact_location: None },
    );
    plane
        .report_job_status(&ticket.job_name, &job_ids, JobStatus::Completed, None, ts(13_000))
        .expect("completed");

    let model = plane.models().load(&profile_id, &model_id).expect("model");
    assert_eq!(model.record.status, ModelStatus::Ready);
    // A failed evaluation never invalidates the trained artifact.
    assert!(model.record.artifact_location.is_some());
}

#[test]
fn submissions_enforce_the_leaderboard_window() {
    let (plane, backend) = plane();
    let now = ts(1_000);
    let (profile_id, model_id) = seed_model(&plane, now);
    train_to_ready(&plane, &backend, &profile_id, &model_id, now);

    let board = LeaderboardRecord {
        id: ResourceId::generate(),
        name: "Summit Sprint".to_owned(),
        opens_at: ts(5_000),
        closes_at: ts(50_000),
    };
    plane.leaderboards().create(&board, now).expect("create leaderboard");

    let mut request = CreateJobRequest {
        kind: JobKind::Submission,
        model_id: model_id.clone(),
        profile_id: profile_id.clone(),
        leaderboard_id: Some(board.id.clone()),
        max_time_in_minutes: 5,
    };

    // Before the window opens.
    assert!(matches!(
        plane.create_job(&request, ts(4_999)),
        Err(ControlPlaneError::LeaderboardClosed { .. })
    ));
    // Exactly at close.
    assert!(matches!(
        plane.create_job(&request, ts(50_000)),
        Err(ControlPlaneError::LeaderboardClosed { .. })
    ));
    // Without a leaderboard at all.
    request.leaderboard_id = None;
    assert!(matches!(
        plane.create_job(&request, ts(10_000)),
        Err(ControlPlaneError::MissingLeaderboard)
    ));

    request.leaderboard_id = Some(board.id.clone());
    let ticket = plane.create_job(&request, ts(10_000)).expect("create submission");
    let job_ids = JobIds {
        model_id: model_id.clone(),
        profile_id: profile_id.clone(),
        leaderboard_id: Some(board.id.clone()),
    };
    plane.dispatch_job(&ticket.job_name, &job_ids, ts(11_000)).expect("dispatch");

    // Submissions never claim the model beyond Queued.
    let model = plane.models().load(&profile_id, &model_id).expect("model");
    assert_eq!(model.record.status, ModelStatus::Queued);

    plane
        .report_job_status(&ticket.job_name, &job_ids, JobStatus::InProgress, None, ts(12_000))
        .expect("in progress");
    backend.script_report(
        &ticket.job_name,
        BackendJobReport { billable_seconds: 240, artifact_location: None },
    );
    plane
        .report_job_status(&ticket.job_name, &job_ids, JobStatus::Completed, None, ts(13_000))
        .expect("completed");
    let model = plane.models().load(&profile_id, &model_id).expect("model");
    assert_eq!(model.record.status, ModelStatus::Ready);
}

#[test]
fn queued_submission_is_found_and_canceled_by_stop() {
    let (plane, backend) = plane();
    let now = ts(1_000);
    let (profile_id, model_id) = seed_model(&plane, now);
    train_to_ready(&plane, &backend, &profile_id, &model_id, now);

    let board = LeaderboardRecord {
        id: ResourceId::generate(),
        name: "Night Circuit".to_owned(),
        opens_at: ts(0),
        closes_at: ts(100_000),
    };
    plane.leaderboards().create(&board, now).expect("create leaderboard");

    let request = CreateJobRequest {
        kind: JobKind::Submission,
        model_id: model_id.clone(),
        profile_id: profile_id.clone(),
        leaderboard_id: Some(board.id.clone()),
        max_time_in_minutes: 5,
    };
    let ticket = plane.create_job(&request, ts(10_000)).expect("create submission");

    let summary = plane.stop_job(&model_id, &profile_id, ts(11_000)).expect("stop");
    assert_eq!(summary.job_name, ticket.job_name);
    assert_eq!(summary.kind, JobKind::Submission);
    assert_eq!(summary.status, JobStatus::Canceled);

    let model = plane.models().load(&profile_id, &model_id).expect("model");
    assert_eq!(model.record.status, ModelStatus::Ready);
    let profile = plane.profiles().load(&profile_id).expect("profile");
    assert_eq!(profile.record.compute_minutes_queued, 0);
}

#[test]
fn model_registration_respects_the_model_cap() {
    let backend: Arc<dyn ComputeBackend> = Arc::new(FakeBackend::default());
    let plane = ControlPlane::new(
        Arc::new(InMemoryTableStore::new()),
        Arc::new(NoopStoreEvents),
        backend,
        QuotaLimits {
            account_monthly_minutes_ceiling: 10_000,
            default_max_total_compute_minutes: None,
            default_max_model_count: Some(2),
        },
    );
    let now = ts(1_000);
    let profile = plane.register_profile("collector", now).expect("register profile");

    plane.register_model(&profile.record.id, "one", now).expect("first model");
    plane.register_model(&profile.record.id, "two", now).expect("second model");
    let err = plane
        .register_model(&profile.record.id, "three", now)
        .expect_err("cap must reject the third");
    assert!(matches!(err, ControlPlaneError::ModelLimitExceeded { cap: 2, .. }));

    let profile = plane.profiles().load(&profile.record.id).expect("profile");
    assert_eq!(profile.record.model_count, 2);
}
