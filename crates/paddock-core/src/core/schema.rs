// crates/paddock-core/src/core/schema.rs
// ============================================================================
// Module: Paddock Storage Schema
// Description: Key templates, entity tags, and the raw item envelope.
// Purpose: Map every record shape onto the single logical table injectively.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! All records live in one logical table addressed by a composite
//! (partition, sort) key. This module owns every key template, so key
//! construction never happens ad hoc: each record type implements
//! [`StoredRecord`], which derives its primary key and optional
//! secondary-index key from the record's own fields.
//!
//! Templates are injective across entity types: distinct records can never
//! render the same key because each template embeds a distinct literal tag,
//! and identifiers cannot contain the `_` and `#` delimiters. Ranged
//! templates (leaderboard close times, submission creation times) embed a
//! fixed-width ISO-8601 timestamp so lexicographic key order equals
//! chronological order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::identifiers::ResourceId;
use crate::core::records::AccountUsageRecord;
use crate::core::records::EvaluationRecord;
use crate::core::records::LeaderboardRecord;
use crate::core::records::ModelRecord;
use crate::core::records::ProfileRecord;
use crate::core::records::SubmissionRecord;
use crate::core::records::TrainingRecord;
use crate::core::time::TimeError;
use crate::core::time::Timestamp;
use crate::core::time::UsagePeriod;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors produced while deriving storage keys.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// A ranged key template could not render its timestamp component.
    #[error("failed to render key timestamp: {0}")]
    Time(#[from] TimeError),
}

// ============================================================================
// SECTION: Entity Types
// ============================================================================

/// Tag distinguishing record shapes within the single table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Racer profile.
    Profile,
    /// Model owned by a profile.
    Model,
    /// Training job.
    Training,
    /// Evaluation job.
    Evaluation,
    /// Leaderboard submission job.
    Submission,
    /// Leaderboard.
    Leaderboard,
    /// Monthly system-wide usage tallies.
    AccountUsage,
}

impl EntityType {
    /// Returns the stable wire form of this tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Model => "model",
            Self::Training => "training",
            Self::Evaluation => "evaluation",
            Self::Submission => "submission",
            Self::Leaderboard => "leaderboard",
            Self::AccountUsage => "account_usage",
        }
    }

    /// Parses a wire-form tag, returning `None` for unknown tokens.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "profile" => Some(Self::Profile),
            "model" => Some(Self::Model),
            "training" => Some(Self::Training),
            "evaluation" => Some(Self::Evaluation),
            "submission" => Some(Self::Submission),
            "leaderboard" => Some(Self::Leaderboard),
            "account_usage" => Some(Self::AccountUsage),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Item Keys
// ============================================================================

/// Composite key addressing one item in the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    /// Partition component.
    pub partition: String,
    /// Sort component, unique within the partition.
    pub sort: String,
}

impl ItemKey {
    /// Creates a key from its components.
    #[must_use]
    pub const fn new(partition: String, sort: String) -> Self {
        Self { partition, sort }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition, self.sort)
    }
}

// ============================================================================
// SECTION: Key Templates
// ============================================================================

/// Fixed sort key of profile items.
pub const PROFILE_SORT: &str = "profile";
/// Fixed sort key of training items; at most one training per model.
pub const TRAINING_SORT: &str = "training";
/// Fixed sort key of leaderboard items.
pub const LEADERBOARD_SORT: &str = "leaderboard";
/// Fixed sort key of account usage items.
pub const USAGE_SORT: &str = "usage";
/// Sort-key prefix of model items within a profile partition.
pub const MODEL_SORT_PREFIX: &str = "model_";
/// Sort-key prefix of evaluation items within a model partition.
pub const EVALUATION_SORT_PREFIX: &str = "evaluation_";
/// Sort-key prefix of submission items within a leaderboard/profile partition.
pub const SUBMISSION_SORT_PREFIX: &str = "submission_";
/// Secondary-index partition enumerating all profiles.
pub const PROFILE_INDEX_PARTITION: &str = "profile";
/// Secondary-index partition enumerating leaderboards by close time.
pub const LEADERBOARD_INDEX_PARTITION: &str = "leaderboard";

/// Renders the partition key owning a profile and its models.
#[must_use]
pub fn profile_partition(profile_id: &ResourceId) -> String {
    format!("profile_{profile_id}")
}

/// Renders the partition key owning a model's jobs.
#[must_use]
pub fn model_partition(model_id: &ResourceId) -> String {
    format!("model_{model_id}")
}

/// Renders the partition key owning a leaderboard.
#[must_use]
pub fn leaderboard_partition(leaderboard_id: &ResourceId) -> String {
    format!("leaderboard_{leaderboard_id}")
}

/// Renders the partition key owning one profile's submissions to one board.
#[must_use]
pub fn submission_partition(leaderboard_id: &ResourceId, profile_id: &ResourceId) -> String {
    format!("leaderboard_{leaderboard_id}#profile_{profile_id}")
}

/// Renders the partition key of a monthly usage record (zero-padded).
#[must_use]
pub fn usage_partition(period: UsagePeriod) -> String {
    format!("usage_{}", period.label())
}

/// Renders the ranged secondary sort key `closes_<ISO-8601>#<id>`.
///
/// # Errors
/// Returns [`SchemaError`] when the close time cannot be rendered.
pub fn closes_sort(closes_at: Timestamp, leaderboard_id: &ResourceId) -> Result<String, SchemaError> {
    Ok(format!("closes_{}#{leaderboard_id}", closes_at.to_iso8601()?))
}

/// Renders the ranged secondary sort key `created_<ISO-8601>#<id>`.
///
/// # Errors
/// Returns [`SchemaError`] when the creation time cannot be rendered.
pub fn created_sort(created_at: Timestamp, submission_id: &ResourceId) -> Result<String, SchemaError> {
    Ok(format!("created_{}#{submission_id}", created_at.to_iso8601()?))
}

/// Primary key of a profile item.
#[must_use]
pub fn profile_key(profile_id: &ResourceId) -> ItemKey {
    ItemKey::new(profile_partition(profile_id), PROFILE_SORT.to_owned())
}

/// Primary key of a model item.
#[must_use]
pub fn model_key(profile_id: &ResourceId, model_id: &ResourceId) -> ItemKey {
    ItemKey::new(profile_partition(profile_id), format!("{MODEL_SORT_PREFIX}{model_id}"))
}

/// Primary key of a model's training item.
#[must_use]
pub fn training_key(model_id: &ResourceId) -> ItemKey {
    ItemKey::new(model_partition(model_id), TRAINING_SORT.to_owned())
}

/// Primary key of an evaluation item.
#[must_use]
pub fn evaluation_key(model_id: &ResourceId, evaluation_id: &ResourceId) -> ItemKey {
    ItemKey::new(model_partition(model_id), format!("{EVALUATION_SORT_PREFIX}{evaluation_id}"))
}

/// Primary key of a submission item.
#[must_use]
pub fn submission_key(
    leaderboard_id: &ResourceId,
    profile_id: &ResourceId,
    submission_id: &ResourceId,
) -> ItemKey {
    ItemKey::new(
        submission_partition(leaderboard_id, profile_id),
        format!("{SUBMISSION_SORT_PREFIX}{submission_id}"),
    )
}

/// Primary key of a leaderboard item.
#[must_use]
pub fn leaderboard_key(leaderboard_id: &ResourceId) -> ItemKey {
    ItemKey::new(leaderboard_partition(leaderboard_id), LEADERBOARD_SORT.to_owned())
}

/// Primary key of a monthly usage item.
#[must_use]
pub fn usage_key(period: UsagePeriod) -> ItemKey {
    ItemKey::new(usage_partition(period), USAGE_SORT.to_owned())
}

// ============================================================================
// SECTION: Raw Item Envelope
// ============================================================================

/// One stored item: keys, metadata, and the serialized record payload.
///
/// # Invariants
/// - `version` starts at 1 on creation and increments by exactly 1 on every
///   successful update; it backs version-conditioned writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    /// Primary key.
    pub key: ItemKey,
    /// Optional secondary-index key.
    pub index_key: Option<ItemKey>,
    /// Record shape tag.
    pub entity_type: EntityType,
    /// Monotone per-item write counter.
    pub version: u64,
    /// Creation time, fixed for the item's lifetime.
    pub created_at: Timestamp,
    /// Time of the most recent write.
    pub updated_at: Timestamp,
    /// Serialized record.
    pub payload: serde_json::Value,
}

// ============================================================================
// SECTION: Stored Record Trait
// ============================================================================

/// A record shape that knows its place in the table.
pub trait StoredRecord: Serialize + DeserializeOwned {
    /// Entity tag stored in item metadata.
    const ENTITY: EntityType;

    /// Derives the record's primary key.
    fn primary_key(&self) -> ItemKey;

    /// Derives the record's secondary-index key, if the shape is indexed.
    ///
    /// # Errors
    /// Returns [`SchemaError`] when a ranged key component cannot render.
    fn index_key(&self) -> Result<Option<ItemKey>, SchemaError> {
        Ok(None)
    }
}

impl StoredRecord for ProfileRecord {
    const ENTITY: EntityType = EntityType::Profile;

    fn primary_key(&self) -> ItemKey {
        profile_key(&self.id)
    }

    fn index_key(&self) -> Result<Option<ItemKey>, SchemaError> {
        Ok(Some(ItemKey::new(
            PROFILE_INDEX_PARTITION.to_owned(),
            profile_partition(&self.id),
        )))
    }
}

impl StoredRecord for ModelRecord {
    const ENTITY: EntityType = EntityType::Model;

    fn primary_key(&self) -> ItemKey {
        model_key(&self.profile_id, &self.id)
    }
}

impl StoredRecord for TrainingRecord {
    const ENTITY: EntityType = EntityType::Training;

    fn primary_key(&self) -> ItemKey {
        training_key(&self.model_id)
    }
}

impl StoredRecord for EvaluationRecord {
    const ENTITY: EntityType = EntityType::Evaluation;

    fn primary_key(&self) -> ItemKey {
        evaluation_key(&self.model_id, &self.id)
    }
}

impl StoredRecord for SubmissionRecord {
    const ENTITY: EntityType = EntityType::Submission;

    fn primary_key(&self) -> ItemKey {
        submission_key(&self.leaderboard_id, &self.profile_id, &self.id)
    }

    fn index_key(&self) -> Result<Option<ItemKey>, SchemaError> {
        Ok(Some(ItemKey::new(
            profile_partition(&self.profile_id),
            created_sort(self.created_at, &self.id)?,
        )))
    }
}

impl StoredRecord for LeaderboardRecord {
    const ENTITY: EntityType = EntityType::Leaderboard;

    fn primary_key(&self) -> ItemKey {
        leaderboard_key(&self.id)
    }

    fn index_key(&self) -> Result<Option<ItemKey>, SchemaError> {
        Ok(Some(ItemKey::new(
            LEADERBOARD_INDEX_PARTITION.to_owned(),
            closes_sort(self.closes_at, &self.id)?,
        )))
    }
}

impl StoredRecord for AccountUsageRecord {
    const ENTITY: EntityType = EntityType::AccountUsage;

    fn primary_key(&self) -> ItemKey {
        usage_key(self.period)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identifiers::IdentifierError;

    /// Builds a fixed identifier for key-shape assertions.
    fn id(raw: &str) -> Result<ResourceId, IdentifierError> {
        ResourceId::new(raw)
    }

    #[test]
    fn key_templates_render_expected_shapes() -> Result<(), IdentifierError> {
        let profile = id("p1234567ab")?;
        let model = id("m1234567ab")?;
        let board = id("b1234567ab")?;
        let submission = id("s1234567ab")?;

        assert_eq!(profile_key(&profile).to_string(), "profile_p1234567ab/profile");
        assert_eq!(
            model_key(&profile, &model).to_string(),
            "profile_p1234567ab/model_m1234567ab"
        );
        assert_eq!(training_key(&model).to_string(), "model_m1234567ab/training");
        assert_eq!(
            evaluation_key(&model, &submission).to_string(),
            "model_m1234567ab/evaluation_s1234567ab"
        );
        assert_eq!(
            submission_key(&board, &profile, &submission).to_string(),
            "leaderboard_b1234567ab#profile_p1234567ab/submission_s1234567ab"
        );
        assert_eq!(leaderboard_key(&board).to_string(), "leaderboard_b1234567ab/leaderboard");
        Ok(())
    }

    #[test]
    fn usage_key_is_zero_padded() -> Result<(), crate::core::time::TimeError> {
        let period = UsagePeriod::new(2024, 3)?;
        assert_eq!(usage_key(period).to_string(), "usage_2024_03/usage");
        Ok(())
    }

    #[test]
    fn key_templates_are_injective_across_entity_types() -> Result<(), IdentifierError> {
        // The same identifier reused for every role still yields distinct keys.
        let same = id("x1234567ab")?;
        let keys = [
            profile_key(&same),
            model_key(&same, &same),
            training_key(&same),
            evaluation_key(&same, &same),
            submission_key(&same, &same, &same),
            leaderboard_key(&same),
        ];
        let unique: std::collections::HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
        Ok(())
    }

    #[test]
    fn closes_sort_orders_chronologically() -> Result<(), Box<dyn std::error::Error>> {
        let a = id("a000000000")?;
        let earlier = closes_sort(Timestamp::from_unix_millis(1_700_000_000_000), &a)?;
        let later = closes_sort(Timestamp::from_unix_millis(1_700_000_001_000), &a)?;
        assert!(earlier < later);
        Ok(())
    }
}
