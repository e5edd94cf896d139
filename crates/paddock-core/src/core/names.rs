// crates/paddock-core/src/core/names.rs
// ============================================================================
// Module: Paddock Job Names
// Description: Composition and decoding of globally unique compute job names.
// Purpose: Provide the single reversible codec between (kind, id) and job names.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every compute job carries a globally unique name of the form
//! `paddock-<kind>-<resource id>`. The name is the only identifier that
//! crosses the compute-backend boundary, so both directions of the codec live
//! here: [`JobName::compose`] is the sole constructor for new names, and
//! [`JobName::parse`] is the sole decoder for names received back from the
//! backend. Decoding fails loudly on any name this codec did not produce.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::IdentifierError;
use crate::core::identifiers::JobKind;
use crate::core::identifiers::ResourceId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fixed first segment of every job name.
pub const JOB_NAME_PREFIX: &str = "paddock";

/// Segment delimiter. Excluded from the resource-identifier alphabet, so
/// splitting on it is unambiguous.
const JOB_NAME_DELIMITER: char = '-';

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors produced when decoding a job name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobNameError {
    /// The name did not have exactly three delimited segments.
    #[error("job name {name:?} is not of the form {JOB_NAME_PREFIX}-<kind>-<id>")]
    Malformed {
        /// The rejected name.
        name: String,
    },
    /// The first segment was not the expected prefix.
    #[error("job name {name:?} does not start with prefix {JOB_NAME_PREFIX:?}")]
    WrongPrefix {
        /// The rejected name.
        name: String,
    },
    /// The kind segment was not a known job kind.
    #[error("job name contains unknown kind {token:?}")]
    UnknownKind {
        /// The rejected kind token.
        token: String,
    },
    /// The identifier segment failed resource-identifier validation.
    #[error("job name contains invalid resource identifier: {0}")]
    InvalidResourceId(#[from] IdentifierError),
}

// ============================================================================
// SECTION: Job Name
// ============================================================================

/// Globally unique, reversible name of a compute job.
///
/// # Invariants
/// - Always of the form `paddock-<kind>-<id>` with a known kind and a valid
///   resource identifier; only [`JobName::compose`] and [`JobName::parse`]
///   construct values.
/// - Decoding a composed name returns the original `(kind, id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobName {
    /// Full rendered name.
    raw: String,
    /// Kind segment, decoded once at construction.
    kind: JobKind,
    /// Identifier segment, decoded once at construction.
    id: ResourceId,
}

impl JobName {
    /// Composes the job name for a kind and resource identifier.
    ///
    /// Infallible: the resource-identifier alphabet excludes the delimiter,
    /// so every composed name decodes back to the same `(kind, id)` pair.
    #[must_use]
    pub fn compose(kind: JobKind, id: &ResourceId) -> Self {
        let raw = format!("{JOB_NAME_PREFIX}{JOB_NAME_DELIMITER}{kind}{JOB_NAME_DELIMITER}{id}");
        Self { raw, kind, id: id.clone() }
    }

    /// Decodes a job name received from outside the control plane.
    ///
    /// # Errors
    /// Returns [`JobNameError`] when the name was not produced by
    /// [`JobName::compose`]: wrong segment count, wrong prefix, unknown kind,
    /// or an invalid identifier segment.
    pub fn parse(name: &str) -> Result<Self, JobNameError> {
        let mut segments = name.splitn(3, JOB_NAME_DELIMITER);
        let (Some(prefix), Some(kind_token), Some(id_token)) =
            (segments.next(), segments.next(), segments.next())
        else {
            return Err(JobNameError::Malformed { name: name.to_owned() });
        };
        if prefix != JOB_NAME_PREFIX {
            return Err(JobNameError::WrongPrefix { name: name.to_owned() });
        }
        let kind = JobKind::parse(kind_token)
            .ok_or_else(|| JobNameError::UnknownKind { token: kind_token.to_owned() })?;
        let id = ResourceId::new(id_token)?;
        Ok(Self { raw: name.to_owned(), kind, id })
    }

    /// Returns the job kind encoded in this name.
    #[must_use]
    pub const fn kind(&self) -> JobKind {
        self.kind
    }

    /// Returns the resource identifier encoded in this name.
    #[must_use]
    pub const fn resource_id(&self) -> &ResourceId {
        &self.id
    }

    /// Returns the full name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for JobName {
    type Error = JobNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<JobName> for String {
    fn from(value: JobName) -> Self {
        value.raw
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
