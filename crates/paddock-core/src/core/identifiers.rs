// crates/paddock-core/src/core/identifiers.rs
// ============================================================================
// Module: Paddock Identifiers
// Description: Canonical opaque identifiers for Paddock entities and jobs.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde, rand
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout Paddock.
//! Resource identifiers are opaque strings drawn from a restricted
//! alphanumeric alphabet so they can be embedded verbatim in composite keys
//! and job names without escaping. Validation happens at construction
//! boundaries; once constructed an identifier is immutable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Alphabet for generated resource identifiers.
///
/// Deliberately excludes `-`, `_`, and `#`, which are reserved as delimiters
/// in job names and storage key templates.
pub const RESOURCE_ID_ALPHABET: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length of generated resource identifiers.
///
/// Ten alphanumeric characters give 62^10 (> 8 * 10^17) combinations, making
/// collisions between independently generated identifiers negligible.
pub const RESOURCE_ID_LENGTH: usize = 10;

/// Maximum accepted length for externally supplied identifiers.
const RESOURCE_ID_MAX_LENGTH: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors produced when validating identifier wire forms.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// The identifier was empty.
    #[error("resource identifier must not be empty")]
    Empty,
    /// The identifier exceeded the maximum accepted length.
    #[error("resource identifier exceeds {RESOURCE_ID_MAX_LENGTH} characters (got {length})")]
    TooLong {
        /// Length of the rejected identifier.
        length: usize,
    },
    /// The identifier contained a character outside `[0-9A-Za-z]`.
    #[error("resource identifier contains invalid character {character:?}")]
    InvalidCharacter {
        /// First offending character.
        character: char,
    },
}

// ============================================================================
// SECTION: Resource Identifier
// ============================================================================

/// Opaque identifier for Paddock resources (profiles, models, jobs, boards).
///
/// # Invariants
/// - Non-empty, at most 64 characters.
/// - Every character is in `[0-9A-Za-z]`; delimiters used by job names and
///   key templates can never appear inside an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    /// Creates a resource identifier from an externally supplied string.
    ///
    /// # Errors
    /// Returns [`IdentifierError`] when the string is empty, too long, or
    /// contains a character outside the restricted alphabet.
    pub fn new(id: impl Into<String>) -> Result<Self, IdentifierError> {
        let raw = id.into();
        if raw.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if raw.len() > RESOURCE_ID_MAX_LENGTH {
            return Err(IdentifierError::TooLong { length: raw.len() });
        }
        if let Some(character) = raw.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(IdentifierError::InvalidCharacter { character });
        }
        Ok(Self(raw))
    }

    /// Generates a fresh random identifier of [`RESOURCE_ID_LENGTH`] characters.
    ///
    /// Uses the thread-local generator, which is seeded from the operating
    /// system and safe for concurrent generation.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let raw: String = (0..RESOURCE_ID_LENGTH)
            .map(|_| {
                let index = rng.gen_range(0..RESOURCE_ID_ALPHABET.len());
                char::from(RESOURCE_ID_ALPHABET[index])
            })
            .collect();
        Self(raw)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for ResourceId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ResourceId {
    type Error = IdentifierError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourceId> for String {
    fn from(value: ResourceId) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Job Kind
// ============================================================================

/// Kind of compute job a model can run.
///
/// Exactly three kinds exist; each maps one-to-one to an entity type and to
/// the in-use model status reported while a job of that kind is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Reinforcement-learning training run producing a model artifact.
    Training,
    /// Ad hoc evaluation of a trained model.
    Evaluation,
    /// Ranked evaluation submitted against a leaderboard.
    Submission,
}

impl JobKind {
    /// Returns the stable wire form of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Evaluation => "evaluation",
            Self::Submission => "submission",
        }
    }

    /// Parses a wire-form kind token, returning `None` for unknown tokens.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "training" => Some(Self::Training),
            "evaluation" => Some(Self::Evaluation),
            "submission" => Some(Self::Submission),
            _ => None,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_use_restricted_alphabet_and_fixed_length() {
        for _ in 0..1000 {
            let id = ResourceId::generate();
            assert_eq!(id.as_str().len(), RESOURCE_ID_LENGTH);
            assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn generated_ids_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(ResourceId::generate()));
        }
    }

    #[test]
    fn rejects_empty_identifier() {
        assert_eq!(ResourceId::new(""), Err(IdentifierError::Empty));
    }

    #[test]
    fn rejects_delimiter_characters() {
        assert_eq!(
            ResourceId::new("abc-def"),
            Err(IdentifierError::InvalidCharacter { character: '-' })
        );
        assert_eq!(
            ResourceId::new("abc_def"),
            Err(IdentifierError::InvalidCharacter { character: '_' })
        );
        assert_eq!(
            ResourceId::new("abc#def"),
            Err(IdentifierError::InvalidCharacter { character: '#' })
        );
    }

    #[test]
    fn rejects_overlong_identifier() {
        let raw = "a".repeat(65);
        assert_eq!(ResourceId::new(raw), Err(IdentifierError::TooLong { length: 65 }));
    }

    #[test]
    fn job_kind_round_trips_through_wire_form() {
        for kind in [JobKind::Training, JobKind::Evaluation, JobKind::Submission] {
            assert_eq!(JobKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(JobKind::parse("cloning"), None);
    }
}
