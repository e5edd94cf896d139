// crates/paddock-core/src/core/status.rs
// ============================================================================
// Module: Paddock Lifecycle Status
// Description: Job and model status enums and the legal-transition relation.
// Purpose: Centralize every lifecycle rule so callers never compute status ad hoc.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Jobs move through a fixed state machine:
//!
//! ```text
//! Queued -> Initializing -> InProgress -> Stopping -> Canceled
//!    |            |              |            |
//!    v            v              +-> Completed+
//!  Canceled     Failed           +-> Failed <-+
//! ```
//!
//! `Completed`, `Failed`, and `Canceled` are terminal; no transition leaves
//! them. A model's externally visible status is always derived from the kind
//! and status of its jobs through [`model_status_for`], the single pure
//! mapping in the system.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::JobKind;

// ============================================================================
// SECTION: Job Status
// ============================================================================

/// Lifecycle status of a compute job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted and admitted; not yet handed to the compute backend.
    Queued,
    /// Backend resources are being provisioned.
    Initializing,
    /// Running on the compute backend.
    InProgress,
    /// A stop was requested; the backend has not yet confirmed termination.
    Stopping,
    /// Finished successfully. Terminal.
    Completed,
    /// Finished unsuccessfully. Terminal.
    Failed,
    /// Stopped before completion. Terminal.
    Canceled,
}

impl JobStatus {
    /// Returns the stable wire form of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Initializing => "initializing",
            Self::InProgress => "in_progress",
            Self::Stopping => "stopping",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Returns `true` when no transition may leave this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// Returns `true` when a stop request can act on a job in this status.
    ///
    /// `Stopping` is excluded: a second stop while one is in flight is a
    /// conflict, not a no-op.
    #[must_use]
    pub const fn is_stoppable(self) -> bool {
        matches!(self, Self::Queued | Self::Initializing | Self::InProgress)
    }

    /// Returns `true` when the transition from `self` to `next` is legal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Queued => matches!(next, Self::Initializing | Self::Canceled | Self::Failed),
            Self::Initializing => matches!(next, Self::InProgress | Self::Failed),
            Self::InProgress => {
                matches!(next, Self::Stopping | Self::Completed | Self::Failed)
            }
            // A stopped job may still complete or fail if the backend beat
            // the stop request to the finish line.
            Self::Stopping => matches!(next, Self::Canceled | Self::Completed | Self::Failed),
            Self::Completed | Self::Failed | Self::Canceled => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Model Status
// ============================================================================

/// Externally visible status of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    /// No active job; the model can be trained, evaluated, or submitted.
    Ready,
    /// The most recent training terminated without a usable artifact.
    Error,
    /// A job was admitted and is waiting for the backend.
    Queued,
    /// A training job is running.
    Training,
    /// An evaluation job is running.
    Evaluating,
    /// A stop request is in flight.
    Stopping,
}

impl ModelStatus {
    /// Returns the stable wire form of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Queued => "queued",
            Self::Training => "training",
            Self::Evaluating => "evaluating",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Model Status Mapping
// ============================================================================

/// Derives the model status implied by a job of `kind` in `status`.
///
/// Submissions never claim the model: the model stays `Queued` while a
/// submission runs so a training or evaluation queued behind it is still
/// discoverable, and returns to `Ready` when the submission terminates.
/// Only a failed or canceled training marks the model `Error`; a model that
/// completed training before remains usable after a failed evaluation.
#[must_use]
pub const fn model_status_for(kind: JobKind, status: JobStatus) -> ModelStatus {
    if status.is_terminal() {
        return match (kind, status) {
            (JobKind::Training, JobStatus::Completed) => ModelStatus::Ready,
            (JobKind::Training, _) => ModelStatus::Error,
            _ => ModelStatus::Ready,
        };
    }
    match (kind, status) {
        (JobKind::Submission, _) | (_, JobStatus::Queued) => ModelStatus::Queued,
        (JobKind::Training, JobStatus::Initializing | JobStatus::InProgress) => {
            ModelStatus::Training
        }
        (JobKind::Evaluation, JobStatus::Initializing | JobStatus::InProgress) => {
            ModelStatus::Evaluating
        }
        (_, _) => ModelStatus::Stopping,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// All statuses, for exhaustive checks.
    const ALL: [JobStatus; 7] = [
        JobStatus::Queued,
        JobStatus::Initializing,
        JobStatus::InProgress,
        JobStatus::Stopping,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Canceled,
    ];

    #[test]
    fn terminal_statuses_admit_no_transitions() {
        for from in [JobStatus::Completed, JobStatus::Failed, JobStatus::Canceled] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be illegal");
            }
        }
    }

    #[test]
    fn happy_path_transitions_are_legal() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Initializing));
        assert!(JobStatus::Initializing.can_transition_to(JobStatus::InProgress));
        assert!(JobStatus::InProgress.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn stop_path_transitions_are_legal() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Canceled));
        assert!(JobStatus::InProgress.can_transition_to(JobStatus::Stopping));
        assert!(JobStatus::Stopping.can_transition_to(JobStatus::Canceled));
        // The backend may finish before honoring the stop.
        assert!(JobStatus::Stopping.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn skipping_states_is_illegal() {
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::InProgress));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Initializing.can_transition_to(JobStatus::Stopping));
        assert!(!JobStatus::InProgress.can_transition_to(JobStatus::Canceled));
    }

    #[test]
    fn stoppable_excludes_stopping_and_terminal() {
        assert!(JobStatus::Queued.is_stoppable());
        assert!(JobStatus::Initializing.is_stoppable());
        assert!(JobStatus::InProgress.is_stoppable());
        assert!(!JobStatus::Stopping.is_stoppable());
        assert!(!JobStatus::Completed.is_stoppable());
        assert!(!JobStatus::Failed.is_stoppable());
        assert!(!JobStatus::Canceled.is_stoppable());
    }

    #[test]
    fn training_failure_marks_model_error() {
        assert_eq!(
            model_status_for(JobKind::Training, JobStatus::Failed),
            ModelStatus::Error
        );
        assert_eq!(
            model_status_for(JobKind::Training, JobStatus::Canceled),
            ModelStatus::Error
        );
        assert_eq!(
            model_status_for(JobKind::Training, JobStatus::Completed),
            ModelStatus::Ready
        );
    }

    #[test]
    fn evaluation_termination_returns_model_to_ready() {
        for status in [JobStatus::Completed, JobStatus::Failed, JobStatus::Canceled] {
            assert_eq!(model_status_for(JobKind::Evaluation, status), ModelStatus::Ready);
            assert_eq!(model_status_for(JobKind::Submission, status), ModelStatus::Ready);
        }
    }

    #[test]
    fn running_jobs_claim_the_model() {
        assert_eq!(
            model_status_for(JobKind::Training, JobStatus::InProgress),
            ModelStatus::Training
        );
        assert_eq!(
            model_status_for(JobKind::Evaluation, JobStatus::Initializing),
            ModelStatus::Evaluating
        );
        assert_eq!(
            model_status_for(JobKind::Training, JobStatus::Stopping),
            ModelStatus::Stopping
        );
    }

    #[test]
    fn submissions_keep_the_model_queued_while_active() {
        for status in [JobStatus::Queued, JobStatus::Initializing, JobStatus::InProgress] {
            assert_eq!(model_status_for(JobKind::Submission, status), ModelStatus::Queued);
        }
    }
}
