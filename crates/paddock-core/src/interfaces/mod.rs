// crates/paddock-core/src/interfaces/mod.rs
// ============================================================================
// Module: Paddock Interfaces
// Description: Backend-agnostic interfaces for storage and compute dispatch.
// Purpose: Define the contract surfaces used by the Paddock runtime.
// Dependencies: crate::core, serde, serde_json, base64
// ============================================================================

//! ## Overview
//! Interfaces define how Paddock integrates with external systems without
//! embedding backend-specific details. The storage contract is a single
//! logical table with conditional writes; conditional creation is the only
//! synchronization primitive the runtime relies on. Implementations must be
//! deterministic and fail closed on missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::JobKind;
use crate::core::identifiers::ResourceId;
use crate::core::names::JobName;
use crate::core::schema::EntityType;
use crate::core::schema::ItemKey;
use crate::core::schema::RawItem;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Table store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling; `AlreadyExists` and
///   `VersionConflict` are load-bearing signals, not failures to retry blindly.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No item exists at the addressed key.
    #[error("no item at key {key}")]
    NotFound {
        /// The addressed key, rendered `partition/sort`.
        key: String,
    },
    /// A conditional create collided with an existing item.
    #[error("item already exists at key {key}")]
    AlreadyExists {
        /// The colliding key, rendered `partition/sort`.
        key: String,
    },
    /// A conditioned update observed a version other than the expected one.
    #[error("version conflict at key {key}")]
    VersionConflict {
        /// The contested key, rendered `partition/sort`.
        key: String,
    },
    /// A pagination cursor was malformed or replayed against the wrong query.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    /// An item payload could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The backing store reported an error.
    #[error("store backend error: {0}")]
    Backend(String),
}

// ============================================================================
// SECTION: Pagination Cursors
// ============================================================================

/// Continuation position a cursor encodes.
///
/// # Invariants
/// - `partition` is the partition of the query that produced the cursor;
///   stores reject cursors replayed against a different partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    /// Partition the originating query ranged over.
    pub partition: String,
    /// Sort key of the last item already returned.
    pub sort: String,
}

/// Opaque pagination token handed to callers between pages.
///
/// Callers treat the token as a black box; only store implementations encode
/// and decode it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(String);

impl PageCursor {
    /// Encodes a continuation position into an opaque token.
    ///
    /// # Errors
    /// Returns [`StoreError::Serialization`] when the position cannot be
    /// serialized.
    pub fn encode(position: &CursorPosition) -> Result<Self, StoreError> {
        let json = serde_json::to_vec(position)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        Ok(Self(BASE64.encode(json)))
    }

    /// Decodes the token back into a continuation position.
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidCursor`] when the token is not a cursor
    /// this codec produced.
    pub fn decode(&self) -> Result<CursorPosition, StoreError> {
        let bytes = BASE64
            .decode(&self.0)
            .map_err(|err| StoreError::InvalidCursor(err.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|err| StoreError::InvalidCursor(err.to_string()))
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// SECTION: Queries
// ============================================================================

/// Which key space a query ranges over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIndex {
    /// The primary (partition, sort) key.
    Primary,
    /// The secondary index key, where the record shape defines one.
    Secondary,
}

/// A ranged query over one partition of one key space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Key space to range over.
    pub index: QueryIndex,
    /// Partition to range within.
    pub partition: String,
    /// Optional sort-key prefix narrowing the range.
    pub sort_prefix: Option<String>,
    /// Continuation token from a previous page.
    pub cursor: Option<PageCursor>,
    /// Maximum number of items to return.
    pub limit: usize,
    /// When `true`, items are returned in descending sort-key order.
    pub newest_first: bool,
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage {
    /// Items in sort-key order (descending when `newest_first` was set).
    pub items: Vec<RawItem>,
    /// Continuation token; `None` when the range is exhausted.
    pub cursor: Option<PageCursor>,
}

// ============================================================================
// SECTION: Table Store
// ============================================================================

/// Single-table storage contract.
///
/// Conditional creation (`put_new`) and version-conditioned updates are the
/// only synchronization primitives; implementations never need transactions
/// spanning multiple items.
pub trait TableStore: Send + Sync {
    /// Fetches the item at `key`, if present.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the store cannot be read.
    fn get(&self, key: &ItemKey) -> Result<Option<RawItem>, StoreError>;

    /// Creates `item`, failing if its key is already occupied.
    ///
    /// # Errors
    /// Returns [`StoreError::AlreadyExists`] on key collision.
    fn put_new(&self, item: RawItem) -> Result<(), StoreError>;

    /// Replaces the item at `key` if its stored version equals `expected_version`.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] when absent and
    /// [`StoreError::VersionConflict`] when another write won the race.
    fn update(&self, key: &ItemKey, item: RawItem, expected_version: u64)
    -> Result<(), StoreError>;

    /// Deletes the item at `key`.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] when absent.
    fn delete(&self, key: &ItemKey) -> Result<(), StoreError>;

    /// Ranges over one partition, returning at most `limit` items and a
    /// continuation cursor when more remain.
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidCursor`] when the request replays a
    /// cursor against a different partition.
    fn query(&self, request: &QueryRequest) -> Result<QueryPage, StoreError>;
}

// ============================================================================
// SECTION: Compute Backend
// ============================================================================

/// Compute backend errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend rejected the request as invalid.
    #[error("backend rejected {job}: {reason}")]
    Rejected {
        /// Job name the request addressed.
        job: String,
        /// Backend-reported reason.
        reason: String,
    },
    /// The backend has no job under the given name.
    #[error("backend has no job named {job}")]
    UnknownJob {
        /// The unknown job name.
        job: String,
    },
    /// The backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Parameters handed to the backend when launching a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLaunchSpec {
    /// Kind of job to launch.
    pub kind: JobKind,
    /// Model the job runs against.
    pub model_id: ResourceId,
    /// Owning profile.
    pub profile_id: ResourceId,
    /// Hard runtime bound in minutes; the backend terminates at this bound.
    pub max_time_in_minutes: u32,
    /// Artifact to evaluate, for non-training kinds.
    pub model_artifact: Option<String>,
}

/// What the backend reports about a job on request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendJobReport {
    /// Seconds the backend will bill for the job so far.
    pub billable_seconds: u64,
    /// Location of the produced artifact, once available.
    pub artifact_location: Option<String>,
}

/// Backend-agnostic compute dispatch.
///
/// The runtime addresses backend jobs exclusively by [`JobName`]; every
/// other backend handle flows through records as an opaque string.
pub trait ComputeBackend: Send + Sync {
    /// Launches a job under `name`, returning opaque references to it.
    ///
    /// # Errors
    /// Returns [`BackendError`] when the launch is rejected or the backend
    /// is unreachable.
    fn start_job(
        &self,
        name: &JobName,
        spec: &JobLaunchSpec,
    ) -> Result<crate::core::records::BackendRefs, BackendError>;

    /// Requests termination of the job named `name`.
    ///
    /// # Errors
    /// Returns [`BackendError`] when the stop is rejected or the backend is
    /// unreachable.
    fn stop_job(&self, name: &JobName) -> Result<(), BackendError>;

    /// Reports billing and artifact state for the job named `name`.
    ///
    /// # Errors
    /// Returns [`BackendError::UnknownJob`] when the backend never saw the job.
    fn describe_job(&self, name: &JobName) -> Result<BackendJobReport, BackendError>;
}

// ============================================================================
// SECTION: Store Events
// ============================================================================

/// Outcome tag attached to recorded store operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The operation succeeded.
    Succeeded,
    /// The operation returned an error.
    Failed,
}

/// Observer for data-access operations.
///
/// The runtime invokes the sink uniformly around every DAO operation; hosts
/// plug in their logging or metrics pipeline here. The default sink drops
/// everything, keeping the core free of logging dependencies.
pub trait StoreEventSink: Send + Sync {
    /// Records one completed operation against one entity.
    fn record_operation(
        &self,
        entity: EntityType,
        operation: &'static str,
        key: &str,
        outcome: StoreOutcome,
    );
}

/// Event sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStoreEvents;

impl StoreEventSink for NoopStoreEvents {
    fn record_operation(
        &self,
        _entity: EntityType,
        _operation: &'static str,
        _key: &str,
        _outcome: StoreOutcome,
    ) {
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips_position() -> Result<(), StoreError> {
        let position = CursorPosition {
            partition: "profile".to_owned(),
            sort: "profile_a123456789".to_owned(),
        };
        let cursor = PageCursor::encode(&position)?;
        assert_eq!(cursor.decode()?, position);
        Ok(())
    }

    #[test]
    fn cursor_rejects_garbage_tokens() {
        let garbage = PageCursor("not base64 at all!!!".to_owned());
        assert!(matches!(garbage.decode(), Err(StoreError::InvalidCursor(_))));
    }
}
