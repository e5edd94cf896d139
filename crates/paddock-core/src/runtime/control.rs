// crates/paddock-core/src/runtime/control.rs
// ============================================================================
// Module: Paddock Control Plane
// Description: Job admission, dispatch, stop, status reporting, and resets.
// Purpose: Orchestrate DAOs, the quota engine, and the compute backend.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! The control plane owns every multi-step workflow: admitting a job
//! (capacity reservation, model claim, conditional record creation),
//! dispatching it to the backend, stopping it, folding backend status
//! reports into records, and the monthly quota reset. Each step that could
//! race a concurrent request goes through a conditioned write, and every
//! partial failure unwinds the reservations taken before it.
//!
//! All operations take an explicit `now` timestamp; the control plane never
//! reads the wall clock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::identifiers::JobKind;
use crate::core::identifiers::ResourceId;
use crate::core::names::JobName;
use crate::core::records::BackendRefs;
use crate::core::records::EvaluationRecord;
use crate::core::records::JobRecord;
use crate::core::records::ModelRecord;
use crate::core::records::ProfileRecord;
use crate::core::records::SubmissionRecord;
use crate::core::records::TrainingRecord;
use crate::core::status::JobStatus;
use crate::core::status::ModelStatus;
use crate::core::status::model_status_for;
use crate::core::time::TimeError;
use crate::core::time::Timestamp;
use crate::core::time::UsagePeriod;
use crate::interfaces::BackendError;
use crate::interfaces::ComputeBackend;
use crate::interfaces::JobLaunchSpec;
use crate::interfaces::PageCursor;
use crate::interfaces::StoreEventSink;
use crate::interfaces::TableStore;
use crate::runtime::dao::AccountUsageDao;
use crate::runtime::dao::DaoError;
use crate::runtime::dao::DaoUpdateError;
use crate::runtime::dao::EvaluationDao;
use crate::runtime::dao::LeaderboardDao;
use crate::runtime::dao::ModelDao;
use crate::runtime::dao::Page;
use crate::runtime::dao::ProfileDao;
use crate::runtime::dao::Stored;
use crate::runtime::dao::SubmissionDao;
use crate::runtime::dao::TrainingDao;
use crate::runtime::quota::CapacityExceeded;
use crate::runtime::quota::QuotaEngine;
use crate::runtime::quota::QuotaError;
use crate::runtime::quota::QuotaLimits;
use crate::runtime::quota::ResetReport;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Control-plane errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling; transports map them onto
///   their own error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    /// A submission request carried no leaderboard.
    #[error("submission requests must name a leaderboard")]
    MissingLeaderboard,
    /// The leaderboard is outside its submission window.
    #[error("leaderboard {leaderboard_id} is not open for submissions")]
    LeaderboardClosed {
        /// The closed leaderboard.
        leaderboard_id: ResourceId,
    },
    /// The model is not in a status that allows the requested job.
    #[error("model {model_id} is {status}, not ready for this job")]
    ModelNotReady {
        /// The addressed model.
        model_id: ResourceId,
        /// Its current status.
        status: ModelStatus,
    },
    /// Another job already holds the model.
    #[error("model {model_id} already has an active job")]
    JobAlreadyActive {
        /// The contested model.
        model_id: ResourceId,
    },
    /// No job on the model is in a stoppable status.
    #[error("model {model_id} has no stoppable job")]
    NoStoppableJob {
        /// The addressed model.
        model_id: ResourceId,
    },
    /// A stop is already in flight for the model.
    #[error("model {model_id} is already stopping")]
    StopInProgress {
        /// The addressed model.
        model_id: ResourceId,
    },
    /// Initializing jobs cannot be stopped; backend provisioning is not
    /// interruptible.
    #[error("job {job_name} is initializing and cannot be stopped yet")]
    CannotStopInitializing {
        /// The addressed job.
        job_name: JobName,
    },
    /// The requested status change is not a legal transition.
    #[error("job {job_name} cannot move from {from} to {to}")]
    IllegalTransition {
        /// The addressed job.
        job_name: JobName,
        /// Status the job is in.
        from: JobStatus,
        /// Status the request asked for.
        to: JobStatus,
    },
    /// The profile owns as many models as its cap allows.
    #[error("profile {profile_id} reached its model cap of {cap}")]
    ModelLimitExceeded {
        /// The capped profile.
        profile_id: ResourceId,
        /// The cap that was hit.
        cap: u32,
    },
    /// The request exceeds a compute-minute bound.
    #[error(transparent)]
    Capacity(#[from] CapacityExceeded),
    /// Data access failed.
    #[error(transparent)]
    Dao(#[from] DaoError),
    /// The compute backend reported an error.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// A timestamp could not be interpreted.
    #[error(transparent)]
    Time(#[from] TimeError),
}

impl From<QuotaError> for ControlPlaneError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::Capacity(capacity) => Self::Capacity(capacity),
            QuotaError::Dao(dao) => Self::Dao(dao),
        }
    }
}

/// Folds a guarded-update outcome whose closure aborted with a
/// control-plane error.
impl From<DaoUpdateError<ControlPlaneError>> for ControlPlaneError {
    fn from(err: DaoUpdateError<ControlPlaneError>) -> Self {
        match err {
            DaoUpdateError::Aborted(inner) => inner,
            DaoUpdateError::Dao(dao) => Self::Dao(dao),
        }
    }
}

// ============================================================================
// SECTION: Requests and Views
// ============================================================================

/// Request to admit and create a new job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateJobRequest {
    /// Kind of job to create.
    pub kind: JobKind,
    /// Model the job runs against.
    pub model_id: ResourceId,
    /// Owning profile.
    pub profile_id: ResourceId,
    /// Target leaderboard; required for submissions, ignored otherwise.
    pub leaderboard_id: Option<ResourceId>,
    /// Compute-minute budget to admit and reserve.
    pub max_time_in_minutes: u32,
}

/// Handle returned for a newly created job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTicket {
    /// The job's globally unique name.
    pub job_name: JobName,
    /// The job's resource identifier (the model's, for trainings).
    pub job_id: ResourceId,
}

/// Keys needed to locate a job record from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobIds {
    /// Model the job runs against.
    pub model_id: ResourceId,
    /// Owning profile.
    pub profile_id: ResourceId,
    /// Target leaderboard; required to locate submissions.
    pub leaderboard_id: Option<ResourceId>,
}

/// Kind-independent view of a job record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    /// The job's globally unique name.
    pub job_name: JobName,
    /// Kind of job.
    pub kind: JobKind,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Model the job runs against.
    pub model_id: ResourceId,
    /// Owning profile.
    pub profile_id: ResourceId,
    /// Admitted compute-minute budget.
    pub max_time_in_minutes: u32,
    /// When the job entered `InProgress`.
    pub started_at: Option<Timestamp>,
    /// When the job terminated.
    pub ended_at: Option<Timestamp>,
}

/// Scope selector for job listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobListScope {
    /// The model's training, if any.
    Trainings {
        /// The addressed model.
        model_id: ResourceId,
    },
    /// The model's evaluations.
    Evaluations {
        /// The addressed model.
        model_id: ResourceId,
    },
    /// One profile's submissions to one leaderboard.
    Submissions {
        /// The addressed leaderboard.
        leaderboard_id: ResourceId,
        /// The submitting profile.
        profile_id: ResourceId,
    },
}

/// What a dispatch attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The job was handed to the backend and is initializing.
    Started,
    /// The job was canceled before dispatch; nothing was started.
    Skipped,
}

/// A loaded job of any kind, paired with its storage metadata.
enum ActiveJob {
    /// A training job.
    Training(Stored<TrainingRecord>),
    /// An evaluation job.
    Evaluation(Stored<EvaluationRecord>),
    /// A submission job.
    Submission(Stored<SubmissionRecord>),
}

impl ActiveJob {
    /// Current lifecycle status.
    fn status(&self) -> JobStatus {
        match self {
            Self::Training(job) => job.record.status(),
            Self::Evaluation(job) => job.record.status(),
            Self::Submission(job) => job.record.status(),
        }
    }

    /// Kind of the loaded job.
    const fn kind(&self) -> JobKind {
        match self {
            Self::Training(_) => JobKind::Training,
            Self::Evaluation(_) => JobKind::Evaluation,
            Self::Submission(_) => JobKind::Submission,
        }
    }

    /// The job's name.
    fn job_name(&self) -> &JobName {
        match self {
            Self::Training(job) => job.record.job_name(),
            Self::Evaluation(job) => job.record.job_name(),
            Self::Submission(job) => job.record.job_name(),
        }
    }

    /// Owning profile.
    fn profile_id(&self) -> &ResourceId {
        match self {
            Self::Training(job) => job.record.profile_id(),
            Self::Evaluation(job) => job.record.profile_id(),
            Self::Submission(job) => job.record.profile_id(),
        }
    }

    /// Model the job runs against.
    fn model_id(&self) -> &ResourceId {
        match self {
            Self::Training(job) => job.record.model_id(),
            Self::Evaluation(job) => job.record.model_id(),
            Self::Submission(job) => job.record.model_id(),
        }
    }

    /// Admitted compute-minute budget.
    fn max_time_in_minutes(&self) -> u32 {
        match self {
            Self::Training(job) => job.record.max_time_in_minutes(),
            Self::Evaluation(job) => job.record.max_time_in_minutes(),
            Self::Submission(job) => job.record.max_time_in_minutes(),
        }
    }

    /// Whether the backend ever acknowledged this job.
    fn has_backend_handle(&self) -> bool {
        match self {
            Self::Training(job) => job.record.backend.compute_job_ref.is_some(),
            Self::Evaluation(job) => job.record.backend.compute_job_ref.is_some(),
            Self::Submission(job) => job.record.backend.compute_job_ref.is_some(),
        }
    }
}

/// Builds the kind-independent view of a job record.
fn summarize<R: JobRecord>(stored: &Stored<R>) -> JobSummary {
    JobSummary {
        job_name: stored.record.job_name().clone(),
        kind: R::KIND,
        status: stored.record.status(),
        model_id: stored.record.model_id().clone(),
        profile_id: stored.record.profile_id().clone(),
        max_time_in_minutes: stored.record.max_time_in_minutes(),
        started_at: stored.record.started_at(),
        ended_at: stored.record.ended_at(),
    }
}

/// Applies one status transition to a job record in place.
///
/// Entering `InProgress` stamps the start time once; reaching a terminal
/// status stamps the end time and drops the video-stream reference, which is
/// only meaningful while the job runs.
fn transition<R: JobRecord>(
    record: &mut R,
    to: JobStatus,
    refs: Option<&BackendRefs>,
    now: Timestamp,
) {
    if let Some(refs) = refs {
        record.backend_mut().merge(refs.clone());
    }
    if to == JobStatus::InProgress && record.started_at().is_none() {
        record.set_started_at(now);
    }
    if to.is_terminal() {
        record.set_ended_at(now);
        record.backend_mut().video_stream = None;
    }
    record.set_status(to);
}

// ============================================================================
// SECTION: Control Plane
// ============================================================================

/// The Paddock control plane.
pub struct ControlPlane {
    /// Profile records and counters.
    profiles: ProfileDao,
    /// Model records.
    models: ModelDao,
    /// Training job records.
    trainings: TrainingDao,
    /// Evaluation job records.
    evaluations: EvaluationDao,
    /// Submission job records.
    submissions: SubmissionDao,
    /// Leaderboard records.
    leaderboards: LeaderboardDao,
    /// Two-tier admission control.
    quota: QuotaEngine,
    /// Compute dispatch.
    backend: Arc<dyn ComputeBackend>,
}

impl ControlPlane {
    /// Assembles the control plane over a store, event sink, backend, and
    /// quota bounds.
    #[must_use]
    pub fn new(
        store: Arc<dyn TableStore>,
        events: Arc<dyn StoreEventSink>,
        backend: Arc<dyn ComputeBackend>,
        limits: QuotaLimits,
    ) -> Self {
        let profiles = ProfileDao::new(Arc::clone(&store), Arc::clone(&events));
        let usage = AccountUsageDao::new(Arc::clone(&store), Arc::clone(&events));
        let quota = QuotaEngine::new(profiles.clone(), usage, limits);
        Self {
            profiles: profiles.clone(),
            models: ModelDao::new(Arc::clone(&store), Arc::clone(&events)),
            trainings: TrainingDao::new(Arc::clone(&store), Arc::clone(&events)),
            evaluations: EvaluationDao::new(Arc::clone(&store), Arc::clone(&events)),
            submissions: SubmissionDao::new(Arc::clone(&store), Arc::clone(&events)),
            leaderboards: LeaderboardDao::new(store, events),
            quota,
            backend,
        }
    }

    /// Profile data access, for hosts serving read traffic.
    #[must_use]
    pub const fn profiles(&self) -> &ProfileDao {
        &self.profiles
    }

    /// Model data access, for hosts serving read traffic.
    #[must_use]
    pub const fn models(&self) -> &ModelDao {
        &self.models
    }

    /// Leaderboard data access, for hosts managing competitions.
    #[must_use]
    pub const fn leaderboards(&self) -> &LeaderboardDao {
        &self.leaderboards
    }

    /// The quota engine.
    #[must_use]
    pub const fn quota(&self) -> &QuotaEngine {
        &self.quota
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Registers a new profile with the configured default caps.
    ///
    /// # Errors
    /// Returns [`ControlPlaneError::Dao`] when the profile cannot be written.
    pub fn register_profile(
        &self,
        alias: &str,
        now: Timestamp,
    ) -> Result<Stored<ProfileRecord>, ControlPlaneError> {
        let limits = self.quota.limits();
        let record = ProfileRecord {
            id: ResourceId::generate(),
            alias: alias.to_owned(),
            compute_minutes_used: 0,
            compute_minutes_queued: 0,
            max_total_compute_minutes: limits.default_max_total_compute_minutes,
            model_count: 0,
            max_model_count: limits.default_max_model_count,
        };
        self.profiles.create(&record, now)?;
        Ok(self.profiles.load(&record.id)?)
    }

    /// Registers a new model under a profile, enforcing the model-count cap.
    ///
    /// # Errors
    /// Returns [`ControlPlaneError::ModelLimitExceeded`] when the profile is
    /// at its cap.
    pub fn register_model(
        &self,
        profile_id: &ResourceId,
        name: &str,
        now: Timestamp,
    ) -> Result<Stored<ModelRecord>, ControlPlaneError> {
        self.profiles
            .modify(profile_id, now, |profile| {
                if let Some(cap) = profile.max_model_count {
                    if profile.model_count >= cap {
                        return Err(ControlPlaneError::ModelLimitExceeded {
                            profile_id: profile.id.clone(),
                            cap,
                        });
                    }
                }
                profile.model_count += 1;
                Ok(())
            })
            .map_err(ControlPlaneError::from)?;

        let record = ModelRecord {
            id: ResourceId::generate(),
            profile_id: profile_id.clone(),
            name: name.to_owned(),
            status: ModelStatus::Ready,
            artifact_location: None,
        };
        if let Err(err) = self.models.create(&record, now) {
            // Give back the slot taken above.
            self.profiles.update(profile_id, now, |profile| {
                profile.model_count = profile.model_count.saturating_sub(1);
            })?;
            return Err(err.into());
        }
        Ok(self.models.load(profile_id, &record.id)?)
    }

    // ------------------------------------------------------------------
    // Job creation
    // ------------------------------------------------------------------

    /// Admits and creates a new job in `Queued`.
    ///
    /// The sequence is: validate the model and (for submissions) the
    /// leaderboard window, reserve capacity on both quota tiers, claim the
    /// model with a conditioned status write, then conditionally create the
    /// job record. Each later failure unwinds the earlier reservations.
    ///
    /// # Errors
    /// Returns [`ControlPlaneError::JobAlreadyActive`] when another job
    /// holds the model, [`ControlPlaneError::Capacity`] when a quota tier
    /// rejects the estimate, and [`ControlPlaneError::LeaderboardClosed`]
    /// when a submission misses the window.
    pub fn create_job(
        &self,
        request: &CreateJobRequest,
        now: Timestamp,
    ) -> Result<JobTicket, ControlPlaneError> {
        let period = UsagePeriod::from_timestamp(now)?;
        let model = self.models.load(&request.profile_id, &request.model_id)?;
        let prior_status = model.record.status;
        Self::check_model_accepts(request.kind, &model.record)?;

        if request.kind == JobKind::Submission {
            let leaderboard_id =
                request.leaderboard_id.as_ref().ok_or(ControlPlaneError::MissingLeaderboard)?;
            let board = self.leaderboards.load(leaderboard_id)?;
            if !board.record.is_open_at(now) {
                return Err(ControlPlaneError::LeaderboardClosed {
                    leaderboard_id: leaderboard_id.clone(),
                });
            }
        }

        let minutes = u64::from(request.max_time_in_minutes);
        self.quota.admit(&request.profile_id, period, minutes, now)?;

        // Claim the model. The version condition makes this the race point:
        // of two concurrent requests, exactly one sees an eligible status.
        let claim = self.models.modify(&request.profile_id, &request.model_id, now, |m| {
            Self::check_model_accepts(request.kind, m)?;
            m.status = ModelStatus::Queued;
            Ok::<(), ControlPlaneError>(())
        });
        if let Err(err) = claim {
            self.quota.release(&request.profile_id, period, minutes, 0, now)?;
            // The closure's rejection carries the distinction between a model
            // that raced into another job and one that raced into Error.
            return Err(err.into());
        }

        match self.create_job_record(request, now) {
            Ok(ticket) => Ok(ticket),
            Err(err) => {
                self.models.update(&request.profile_id, &request.model_id, now, |m| {
                    m.status = prior_status;
                })?;
                self.quota.release(&request.profile_id, period, minutes, 0, now)?;
                Err(match err {
                    ControlPlaneError::Dao(DaoError::AlreadyExists { .. }) => {
                        ControlPlaneError::JobAlreadyActive { model_id: request.model_id.clone() }
                    }
                    other => other,
                })
            }
        }
    }

    /// Checks whether a model's status admits a new job of `kind`.
    ///
    /// A model in `Error` may be retrained; evaluations and submissions need
    /// a usable artifact and therefore `Ready`.
    fn check_model_accepts(kind: JobKind, model: &ModelRecord) -> Result<(), ControlPlaneError> {
        let eligible = match kind {
            JobKind::Training => {
                matches!(model.status, ModelStatus::Ready | ModelStatus::Error)
            }
            JobKind::Evaluation | JobKind::Submission => model.status == ModelStatus::Ready,
        };
        if eligible {
            Ok(())
        } else if model.status == ModelStatus::Error {
            Err(ControlPlaneError::ModelNotReady {
                model_id: model.id.clone(),
                status: model.status,
            })
        } else {
            Err(ControlPlaneError::JobAlreadyActive { model_id: model.id.clone() })
        }
    }

    /// Writes the job record for an admitted request.
    fn create_job_record(
        &self,
        request: &CreateJobRequest,
        now: Timestamp,
    ) -> Result<JobTicket, ControlPlaneError> {
        match request.kind {
            JobKind::Training => {
                let job_name = JobName::compose(JobKind::Training, &request.model_id);
                let record = TrainingRecord {
                    model_id: request.model_id.clone(),
                    profile_id: request.profile_id.clone(),
                    job_name: job_name.clone(),
                    status: JobStatus::Queued,
                    max_time_in_minutes: request.max_time_in_minutes,
                    backend: BackendRefs::default(),
                    started_at: None,
                    ended_at: None,
                };
                self.trainings.create(&record, now)?;
                Ok(JobTicket { job_name, job_id: request.model_id.clone() })
            }
            JobKind::Evaluation => {
                let id = ResourceId::generate();
                let job_name = JobName::compose(JobKind::Evaluation, &id);
                let record = EvaluationRecord {
                    id: id.clone(),
                    model_id: request.model_id.clone(),
                    profile_id: request.profile_id.clone(),
                    job_name: job_name.clone(),
                    status: JobStatus::Queued,
                    max_time_in_minutes: request.max_time_in_minutes,
                    backend: BackendRefs::default(),
                    started_at: None,
                    ended_at: None,
                };
                self.evaluations.create(&record, now)?;
                Ok(JobTicket { job_name, job_id: id })
            }
            JobKind::Submission => {
                let leaderboard_id = request
                    .leaderboard_id
                    .clone()
                    .ok_or(ControlPlaneError::MissingLeaderboard)?;
                let id = ResourceId::generate();
                let job_name = JobName::compose(JobKind::Submission, &id);
                let record = SubmissionRecord {
                    id: id.clone(),
                    leaderboard_id,
                    profile_id: request.profile_id.clone(),
                    model_id: request.model_id.clone(),
                    job_name: job_name.clone(),
                    status: JobStatus::Queued,
                    max_time_in_minutes: request.max_time_in_minutes,
                    backend: BackendRefs::default(),
                    created_at: now,
                    started_at: None,
                    ended_at: None,
                };
                self.submissions.create(&record, now)?;
                Ok(JobTicket { job_name, job_id: id })
            }
        }
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Hands a queued job to the compute backend.
    ///
    /// A job canceled between admission and dispatch is skipped silently;
    /// that race is expected and benign.
    ///
    /// # Errors
    /// Returns [`ControlPlaneError::IllegalTransition`] when the job is in
    /// any status other than `Queued` or `Canceled`.
    pub fn dispatch_job(
        &self,
        job_name: &JobName,
        ids: &JobIds,
        now: Timestamp,
    ) -> Result<DispatchOutcome, ControlPlaneError> {
        let job = self.load_job(job_name, ids)?;
        match job.status() {
            JobStatus::Canceled => Ok(DispatchOutcome::Skipped),
            JobStatus::Queued => {
                let model = self.models.load(job.profile_id(), job.model_id())?;
                let spec = JobLaunchSpec {
                    kind: job.kind(),
                    model_id: job.model_id().clone(),
                    profile_id: job.profile_id().clone(),
                    max_time_in_minutes: job.max_time_in_minutes(),
                    model_artifact: model.record.artifact_location,
                };
                let refs = self.backend.start_job(job_name, &spec)?;
                self.write_transition(&job, JobStatus::Initializing, Some(&refs), now)?;
                self.models.update(job.profile_id(), job.model_id(), now, |m| {
                    m.status = model_status_for(job.kind(), JobStatus::Initializing);
                })?;
                Ok(DispatchOutcome::Started)
            }
            other => Err(ControlPlaneError::IllegalTransition {
                job_name: job_name.clone(),
                from: other,
                to: JobStatus::Initializing,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Stop
    // ------------------------------------------------------------------

    /// Finds the job a stop request would act on, without acting.
    ///
    /// # Errors
    /// Returns [`ControlPlaneError::Dao`] when records cannot be read.
    pub fn get_stoppable_job(
        &self,
        model_id: &ResourceId,
        profile_id: &ResourceId,
    ) -> Result<Option<JobSummary>, ControlPlaneError> {
        let model = self.models.load(profile_id, model_id)?;
        Ok(self
            .resolve_stoppable(model.record.status, model_id, profile_id)?
            .map(|job| match job {
                ActiveJob::Training(stored) => summarize(&stored),
                ActiveJob::Evaluation(stored) => summarize(&stored),
                ActiveJob::Submission(stored) => summarize(&stored),
            }))
    }

    /// Stops the model's active job.
    ///
    /// An `InProgress` job transitions to `Stopping` locally before the
    /// backend stop call goes out, so a crash between the two leaves a
    /// record that already reflects the intent. A `Queued` job is canceled
    /// entirely within the control plane and its reservation released.
    ///
    /// # Errors
    /// Returns [`ControlPlaneError::NoStoppableJob`] when nothing can be
    /// stopped, [`ControlPlaneError::StopInProgress`] when a stop is already
    /// in flight, and [`ControlPlaneError::CannotStopInitializing`] for jobs
    /// still provisioning.
    pub fn stop_job(
        &self,
        model_id: &ResourceId,
        profile_id: &ResourceId,
        now: Timestamp,
    ) -> Result<JobSummary, ControlPlaneError> {
        let model = self.models.load(profile_id, model_id)?;
        if model.record.status == ModelStatus::Stopping {
            return Err(ControlPlaneError::StopInProgress { model_id: model_id.clone() });
        }
        let Some(job) = self.resolve_stoppable(model.record.status, model_id, profile_id)? else {
            return Err(ControlPlaneError::NoStoppableJob { model_id: model_id.clone() });
        };

        match job.status() {
            JobStatus::Initializing => Err(ControlPlaneError::CannotStopInitializing {
                job_name: job.job_name().clone(),
            }),
            JobStatus::InProgress => {
                let summary = self.write_transition(&job, JobStatus::Stopping, None, now)?;
                self.models.update(profile_id, model_id, now, |m| {
                    m.status = ModelStatus::Stopping;
                })?;
                self.backend.stop_job(job.job_name())?;
                Ok(summary)
            }
            JobStatus::Queued => {
                let summary = self.write_transition(&job, JobStatus::Canceled, None, now)?;
                self.models.update(profile_id, model_id, now, |m| {
                    m.status = model_status_for(job.kind(), JobStatus::Canceled);
                })?;
                let period = UsagePeriod::from_timestamp(now)?;
                self.quota.release(
                    profile_id,
                    period,
                    u64::from(job.max_time_in_minutes()),
                    0,
                    now,
                )?;
                Ok(summary)
            }
            other => Err(ControlPlaneError::IllegalTransition {
                job_name: job.job_name().clone(),
                from: other,
                to: JobStatus::Stopping,
            }),
        }
    }

    /// Resolves which job a stop would act on, keyed by the model's status.
    ///
    /// A model in `Queued` may owe its status to any kind, so all three are
    /// consulted; submissions only while still `Queued`.
    fn resolve_stoppable(
        &self,
        model_status: ModelStatus,
        model_id: &ResourceId,
        profile_id: &ResourceId,
    ) -> Result<Option<ActiveJob>, ControlPlaneError> {
        match model_status {
            ModelStatus::Training => {
                Ok(self.trainings.stoppable(model_id)?.map(ActiveJob::Training))
            }
            ModelStatus::Evaluating => {
                Ok(self.evaluations.stoppable(model_id)?.map(ActiveJob::Evaluation))
            }
            ModelStatus::Queued => {
                if let Some(training) = self.trainings.stoppable(model_id)? {
                    return Ok(Some(ActiveJob::Training(training)));
                }
                if let Some(evaluation) = self.evaluations.stoppable(model_id)? {
                    return Ok(Some(ActiveJob::Evaluation(evaluation)));
                }
                Ok(self
                    .submissions
                    .stoppable(profile_id, model_id)?
                    .map(ActiveJob::Submission))
            }
            ModelStatus::Ready | ModelStatus::Error | ModelStatus::Stopping => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Status reports
    // ------------------------------------------------------------------

    /// Folds a backend status report into the job and model records.
    ///
    /// On a terminal status the backend is asked for billing before any
    /// record changes, the job is stamped and closed, the reservation is
    /// settled against actual consumption, and the model status is derived
    /// through the pure mapping.
    ///
    /// # Errors
    /// Returns [`ControlPlaneError::IllegalTransition`] when the reported
    /// status is not reachable from the job's current status; terminal jobs
    /// reject every report.
    pub fn report_job_status(
        &self,
        job_name: &JobName,
        ids: &JobIds,
        new_status: JobStatus,
        refs: Option<&BackendRefs>,
        now: Timestamp,
    ) -> Result<JobSummary, ControlPlaneError> {
        let job = self.load_job(job_name, ids)?;
        let from = job.status();
        if !from.can_transition_to(new_status) {
            return Err(ControlPlaneError::IllegalTransition {
                job_name: job_name.clone(),
                from,
                to: new_status,
            });
        }

        let billing = if new_status.is_terminal() && job.has_backend_handle() {
            Some(self.backend.describe_job(job_name)?)
        } else {
            None
        };

        let summary = self.write_transition(&job, new_status, refs, now)?;

        if new_status.is_terminal() {
            let consumed = billing
                .as_ref()
                .map_or(0, |report| report.billable_seconds.div_ceil(60));
            let period = UsagePeriod::from_timestamp(now)?;
            self.quota.release(
                job.profile_id(),
                period,
                u64::from(job.max_time_in_minutes()),
                consumed,
                now,
            )?;
        }

        let mapped = model_status_for(job.kind(), new_status);
        let artifact = billing.and_then(|report| report.artifact_location);
        let completed_training =
            job.kind() == JobKind::Training && new_status == JobStatus::Completed;
        self.models.update(job.profile_id(), job.model_id(), now, |m| {
            m.status = mapped;
            if completed_training && artifact.is_some() {
                m.artifact_location.clone_from(&artifact);
            }
        })?;
        Ok(summary)
    }

    // ------------------------------------------------------------------
    // Listings and resets
    // ------------------------------------------------------------------

    /// Lists jobs within a scope, one page at a time.
    ///
    /// # Errors
    /// Returns [`ControlPlaneError::Dao`] when the page cannot be fetched.
    pub fn list_jobs(
        &self,
        scope: &JobListScope,
        cursor: Option<PageCursor>,
        max_results: Option<usize>,
    ) -> Result<Page<JobSummary>, ControlPlaneError> {
        match scope {
            JobListScope::Trainings { model_id } => {
                let items =
                    self.trainings.get(model_id)?.map(|stored| summarize(&stored));
                Ok(Page { items: items.into_iter().collect(), next: None })
            }
            JobListScope::Evaluations { model_id } => Ok(self
                .evaluations
                .list(model_id, cursor, max_results)?
                .map(|stored| summarize(&stored))),
            JobListScope::Submissions { leaderboard_id, profile_id } => Ok(self
                .submissions
                .list(leaderboard_id, profile_id, cursor, max_results)?
                .map(|stored| summarize(&stored))),
        }
    }

    /// Runs the monthly quota reset for the period containing `now`.
    ///
    /// # Errors
    /// Returns [`ControlPlaneError::Dao`] when a page of profiles cannot be
    /// fetched; per-profile failures land in the report instead.
    pub fn reset_monthly_quotas(
        &self,
        batch_size: Option<usize>,
        now: Timestamp,
    ) -> Result<ResetReport, ControlPlaneError> {
        let period = UsagePeriod::from_timestamp(now)?;
        Ok(self.quota.reset_monthly(period, batch_size, now)?)
    }

    // ------------------------------------------------------------------
    // Internal plumbing
    // ------------------------------------------------------------------

    /// Loads the job record a name refers to.
    fn load_job(&self, job_name: &JobName, ids: &JobIds) -> Result<ActiveJob, ControlPlaneError> {
        match job_name.kind() {
            JobKind::Training => {
                Ok(ActiveJob::Training(self.trainings.load(job_name.resource_id())?))
            }
            JobKind::Evaluation => Ok(ActiveJob::Evaluation(
                self.evaluations.load(&ids.model_id, job_name.resource_id())?,
            )),
            JobKind::Submission => {
                let leaderboard_id =
                    ids.leaderboard_id.as_ref().ok_or(ControlPlaneError::MissingLeaderboard)?;
                Ok(ActiveJob::Submission(self.submissions.load(
                    leaderboard_id,
                    &ids.profile_id,
                    job_name.resource_id(),
                )?))
            }
        }
    }

    /// Persists one status transition on whichever record backs the job.
    fn write_transition(
        &self,
        job: &ActiveJob,
        to: JobStatus,
        refs: Option<&BackendRefs>,
        now: Timestamp,
    ) -> Result<JobSummary, ControlPlaneError> {
        match job {
            ActiveJob::Training(stored) => {
                let updated = self.trainings.update(&stored.record.model_id, now, |record| {
                    transition(record, to, refs, now);
                })?;
                Ok(summarize(&updated))
            }
            ActiveJob::Evaluation(stored) => {
                let updated = self.evaluations.update(
                    &stored.record.model_id,
                    &stored.record.id,
                    now,
                    |record| transition(record, to, refs, now),
                )?;
                Ok(summarize(&updated))
            }
            ActiveJob::Submission(stored) => {
                let updated = self.submissions.update(
                    &stored.record.leaderboard_id,
                    &stored.record.profile_id,
                    &stored.record.id,
                    now,
                    |record| transition(record, to, refs, now),
                )?;
                Ok(summarize(&updated))
            }
        }
    }
}
