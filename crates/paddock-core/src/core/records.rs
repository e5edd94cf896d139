// crates/paddock-core/src/core/records.rs
// ============================================================================
// Module: Paddock Records
// Description: Persistent entity records for profiles, models, jobs, and usage.
// Purpose: Define the payload shapes stored in the single logical table.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Seven record shapes share one logical table, distinguished by key template
//! (see the schema module) and by an entity-type tag carried in item
//! metadata. Records hold domain state only; storage metadata (version,
//! created/updated stamps) lives on the raw item envelope, not here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::JobKind;
use crate::core::identifiers::ResourceId;
use crate::core::names::JobName;
use crate::core::status::JobStatus;
use crate::core::status::ModelStatus;
use crate::core::time::Timestamp;
use crate::core::time::UsagePeriod;

// ============================================================================
// SECTION: Profile
// ============================================================================

/// A racer profile: the per-tenant unit of quota accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProfileRecord {
    /// Profile identifier.
    pub id: ResourceId,
    /// Human-readable alias shown on leaderboards.
    pub alias: String,
    /// Compute minutes consumed by terminated jobs this month.
    pub compute_minutes_used: u64,
    /// Compute minutes reserved by admitted, not-yet-terminated jobs.
    pub compute_minutes_queued: u64,
    /// Monthly compute-minute cap; `None` means uncapped.
    pub max_total_compute_minutes: Option<u64>,
    /// Number of models this profile currently owns.
    pub model_count: u32,
    /// Cap on owned models; `None` means uncapped.
    pub max_model_count: Option<u32>,
}

// ============================================================================
// SECTION: Model
// ============================================================================

/// A reinforcement-learning model owned by a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ModelRecord {
    /// Model identifier.
    pub id: ResourceId,
    /// Owning profile.
    pub profile_id: ResourceId,
    /// Display name.
    pub name: String,
    /// Derived lifecycle status; see `model_status_for`.
    pub status: ModelStatus,
    /// Location of the trained artifact, once a training completed.
    pub artifact_location: Option<String>,
}

// ============================================================================
// SECTION: Backend References
// ============================================================================

/// Opaque references into the compute backend, carried by job records.
///
/// The control plane never interprets these values; it stores what the
/// backend hands back and returns them on request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BackendRefs {
    /// Backend-side handle of the running compute job.
    pub compute_job_ref: Option<String>,
    /// Live video stream attached to the job, if any.
    pub video_stream: Option<String>,
    /// Location the backend writes liveness heartbeats to.
    pub heartbeat_location: Option<String>,
}

impl BackendRefs {
    /// Merges `other` into `self`, keeping existing values where `other` is unset.
    pub fn merge(&mut self, other: Self) {
        if other.compute_job_ref.is_some() {
            self.compute_job_ref = other.compute_job_ref;
        }
        if other.video_stream.is_some() {
            self.video_stream = other.video_stream;
        }
        if other.heartbeat_location.is_some() {
            self.heartbeat_location = other.heartbeat_location;
        }
    }
}

// ============================================================================
// SECTION: Job Records
// ============================================================================

/// Training job record. At most one exists per model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TrainingRecord {
    /// Model being trained; also the training's resource identifier.
    pub model_id: ResourceId,
    /// Owning profile.
    pub profile_id: ResourceId,
    /// Globally unique job name.
    pub job_name: JobName,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Admitted compute-minute budget; the backend hard-stops at this bound.
    pub max_time_in_minutes: u32,
    /// Opaque backend references.
    pub backend: BackendRefs,
    /// When the job entered `InProgress`.
    pub started_at: Option<Timestamp>,
    /// When the job reached a terminal status.
    pub ended_at: Option<Timestamp>,
}

/// Evaluation job record. A model accumulates one per evaluation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EvaluationRecord {
    /// Evaluation identifier.
    pub id: ResourceId,
    /// Model under evaluation.
    pub model_id: ResourceId,
    /// Owning profile.
    pub profile_id: ResourceId,
    /// Globally unique job name.
    pub job_name: JobName,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Admitted compute-minute budget.
    pub max_time_in_minutes: u32,
    /// Opaque backend references.
    pub backend: BackendRefs,
    /// When the job entered `InProgress`.
    pub started_at: Option<Timestamp>,
    /// When the job reached a terminal status.
    pub ended_at: Option<Timestamp>,
}

/// Leaderboard submission record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SubmissionRecord {
    /// Submission identifier.
    pub id: ResourceId,
    /// Leaderboard submitted against.
    pub leaderboard_id: ResourceId,
    /// Submitting profile.
    pub profile_id: ResourceId,
    /// Model being ranked.
    pub model_id: ResourceId,
    /// Globally unique job name.
    pub job_name: JobName,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Admitted compute-minute budget.
    pub max_time_in_minutes: u32,
    /// Opaque backend references.
    pub backend: BackendRefs,
    /// Submission time; also feeds the time-ordered index sort key.
    pub created_at: Timestamp,
    /// When the job entered `InProgress`.
    pub started_at: Option<Timestamp>,
    /// When the job reached a terminal status.
    pub ended_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Job Record Access
// ============================================================================

/// Uniform access to the lifecycle fields shared by all three job records.
///
/// The control plane resolves a job by kind and then works through this
/// trait, so stop and status-report logic is written once.
pub trait JobRecord {
    /// Kind of job this record represents.
    const KIND: JobKind;

    /// The job's globally unique name.
    fn job_name(&self) -> &JobName;
    /// Model the job runs against.
    fn model_id(&self) -> &ResourceId;
    /// Owning profile.
    fn profile_id(&self) -> &ResourceId;
    /// Current lifecycle status.
    fn status(&self) -> JobStatus;
    /// Overwrites the lifecycle status. Legality is the caller's concern.
    fn set_status(&mut self, status: JobStatus);
    /// Admitted compute-minute budget.
    fn max_time_in_minutes(&self) -> u32;
    /// Backend references, mutable for merging backend callbacks.
    fn backend_mut(&mut self) -> &mut BackendRefs;
    /// When the job entered `InProgress`, if it has.
    fn started_at(&self) -> Option<Timestamp>;
    /// Stamps the `InProgress` entry time.
    fn set_started_at(&mut self, at: Timestamp);
    /// When the job terminated, if it has.
    fn ended_at(&self) -> Option<Timestamp>;
    /// Stamps the termination time.
    fn set_ended_at(&mut self, at: Timestamp);
}

/// Implements [`JobRecord`] field plumbing for a job record struct.
macro_rules! impl_job_record {
    ($record:ty, $kind:expr) => {
        impl JobRecord for $record {
            const KIND: JobKind = $kind;

            fn job_name(&self) -> &JobName {
                &self.job_name
            }

            fn model_id(&self) -> &ResourceId {
                &self.model_id
            }

            fn profile_id(&self) -> &ResourceId {
                &self.profile_id
            }

            fn status(&self) -> JobStatus {
                self.status
            }

            fn set_status(&mut self, status: JobStatus) {
                self.status = status;
            }

            fn max_time_in_minutes(&self) -> u32 {
                self.max_time_in_minutes
            }

            fn backend_mut(&mut self) -> &mut BackendRefs {
                &mut self.backend
            }

            fn started_at(&self) -> Option<Timestamp> {
                self.started_at
            }

            fn set_started_at(&mut self, at: Timestamp) {
                self.started_at = Some(at);
            }

            fn ended_at(&self) -> Option<Timestamp> {
                self.ended_at
            }

            fn set_ended_at(&mut self, at: Timestamp) {
                self.ended_at = Some(at);
            }
        }
    };
}

impl_job_record!(TrainingRecord, JobKind::Training);
impl_job_record!(EvaluationRecord, JobKind::Evaluation);
impl_job_record!(SubmissionRecord, JobKind::Submission);

// ============================================================================
// SECTION: Leaderboard
// ============================================================================

/// A ranked competition that accepts submissions while open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LeaderboardRecord {
    /// Leaderboard identifier.
    pub id: ResourceId,
    /// Display name.
    pub name: String,
    /// When submissions open.
    pub opens_at: Timestamp,
    /// When submissions close.
    pub closes_at: Timestamp,
}

impl LeaderboardRecord {
    /// Returns `true` when the leaderboard accepts submissions at `now`.
    ///
    /// Open is inclusive of `opens_at` and exclusive of `closes_at`.
    #[must_use]
    pub fn is_open_at(&self, now: Timestamp) -> bool {
        self.opens_at <= now && now < self.closes_at
    }
}

// ============================================================================
// SECTION: Account Usage
// ============================================================================

/// System-wide compute-minute tallies for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AccountUsageRecord {
    /// The month this record tallies.
    pub period: UsagePeriod,
    /// Minutes consumed by terminated jobs across all profiles.
    pub minutes_used: u64,
    /// Minutes reserved by admitted, not-yet-terminated jobs.
    pub minutes_queued: u64,
}

impl AccountUsageRecord {
    /// Creates the zero-initialized record for a period.
    #[must_use]
    pub const fn empty(period: UsagePeriod) -> Self {
        Self { period, minutes_used: 0, minutes_queued: 0 }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
