// crates/paddock-core/src/lib.rs
// ============================================================================
// Module: Paddock Core Library
// Description: Control plane for training, evaluating, and submitting models.
// Purpose: Expose the domain types, contracts, and runtime of Paddock.
// Dependencies: serde, serde_json, thiserror, rand, time, base64
// ============================================================================

//! ## Overview
//! Paddock coordinates compute jobs for reinforcement-learning models: each
//! model trains, evaluates, and submits to leaderboards, one job at a time,
//! under per-profile and account-wide compute-minute quotas.
//! Invariants:
//! - Every record write is conditional; there are no blind overwrites.
//! - Conditional creation is the only cross-entity synchronization primitive.
//! - A model has at most one active job; concurrent requests lose at the
//!   model-claim write, never later.
//! - The runtime never reads the wall clock; callers pass `now` explicitly.
//!
//! Storage and compute backends plug in through the [`interfaces`] contracts;
//! an in-memory store ships for tests and embedded use.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::identifiers::IdentifierError;
pub use crate::core::identifiers::JobKind;
pub use crate::core::identifiers::ResourceId;
pub use crate::core::names::JobName;
pub use crate::core::names::JobNameError;
pub use crate::core::records::AccountUsageRecord;
pub use crate::core::records::BackendRefs;
pub use crate::core::records::EvaluationRecord;
pub use crate::core::records::JobRecord;
pub use crate::core::records::LeaderboardRecord;
pub use crate::core::records::ModelRecord;
pub use crate::core::records::ProfileRecord;
pub use crate::core::records::SubmissionRecord;
pub use crate::core::records::TrainingRecord;
pub use crate::core::schema::EntityType;
pub use crate::core::schema::ItemKey;
pub use crate::core::schema::RawItem;
pub use crate::core::schema::StoredRecord;
pub use crate::core::status::JobStatus;
pub use crate::core::status::ModelStatus;
pub use crate::core::status::model_status_for;
pub use crate::core::time::TimeError;
pub use crate::core::time::Timestamp;
pub use crate::core::time::UsagePeriod;
pub use crate::interfaces::BackendError;
pub use crate::interfaces::BackendJobReport;
pub use crate::interfaces::ComputeBackend;
pub use crate::interfaces::CursorPosition;
pub use crate::interfaces::JobLaunchSpec;
pub use crate::interfaces::NoopStoreEvents;
pub use crate::interfaces::PageCursor;
pub use crate::interfaces::QueryIndex;
pub use crate::interfaces::QueryPage;
pub use crate::interfaces::QueryRequest;
pub use crate::interfaces::StoreError;
pub use crate::interfaces::StoreEventSink;
pub use crate::interfaces::StoreOutcome;
pub use crate::interfaces::TableStore;
pub use crate::runtime::control::ControlPlane;
pub use crate::runtime::control::ControlPlaneError;
pub use crate::runtime::control::CreateJobRequest;
pub use crate::runtime::control::DispatchOutcome;
pub use crate::runtime::control::JobIds;
pub use crate::runtime::control::JobListScope;
pub use crate::runtime::control::JobSummary;
pub use crate::runtime::control::JobTicket;
pub use crate::runtime::dao::DaoError;
pub use crate::runtime::dao::DaoUpdateError;
pub use crate::runtime::dao::Page;
pub use crate::runtime::dao::Stored;
pub use crate::runtime::memory::InMemoryTableStore;
pub use crate::runtime::metrics::SystemMetrics;
pub use crate::runtime::metrics::collect_system_metrics;
pub use crate::runtime::quota::CapacityExceeded;
pub use crate::runtime::quota::QuotaEngine;
pub use crate::runtime::quota::QuotaError;
pub use crate::runtime::quota::QuotaLimits;
pub use crate::runtime::quota::ResetReport;
