// crates/paddock-core/src/runtime/dao.rs
// ============================================================================
// Module: Paddock Data Access
// Description: Typed per-entity access over the single-table store contract.
// Purpose: Encode, decode, and page records; surface conflicts with context.
// Dependencies: crate::core, crate::interfaces, serde_json
// ============================================================================

//! ## Overview
//! One generic access core handles envelope encoding, version-conditioned
//! updates with bounded optimistic retry, and cursor pagination; seven thin
//! typed facades expose it per entity. DAOs perform no transient-error
//! retries of their own: store errors surface verbatim, annotated with the
//! entity type and key that produced them. Every operation is reported to
//! the configured [`StoreEventSink`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::identifiers::ResourceId;
use crate::core::records::AccountUsageRecord;
use crate::core::records::EvaluationRecord;
use crate::core::records::LeaderboardRecord;
use crate::core::records::ModelRecord;
use crate::core::records::ProfileRecord;
use crate::core::records::SubmissionRecord;
use crate::core::records::TrainingRecord;
use crate::core::schema::EVALUATION_SORT_PREFIX;
use crate::core::schema::EntityType;
use crate::core::schema::ItemKey;
use crate::core::schema::LEADERBOARD_INDEX_PARTITION;
use crate::core::schema::MODEL_SORT_PREFIX;
use crate::core::schema::PROFILE_INDEX_PARTITION;
use crate::core::schema::RawItem;
use crate::core::schema::SUBMISSION_SORT_PREFIX;
use crate::core::schema::StoredRecord;
use crate::core::schema::evaluation_key;
use crate::core::schema::leaderboard_key;
use crate::core::schema::model_key;
use crate::core::schema::model_partition;
use crate::core::schema::profile_key;
use crate::core::schema::profile_partition;
use crate::core::schema::submission_key;
use crate::core::schema::submission_partition;
use crate::core::schema::training_key;
use crate::core::schema::usage_key;
use crate::core::status::JobStatus;
use crate::core::time::Timestamp;
use crate::core::time::UsagePeriod;
use crate::interfaces::PageCursor;
use crate::interfaces::QueryIndex;
use crate::interfaces::QueryRequest;
use crate::interfaces::StoreError;
use crate::interfaces::StoreEventSink;
use crate::interfaces::StoreOutcome;
use crate::interfaces::TableStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Page size applied when a caller does not specify one.
pub const DEFAULT_MAX_QUERY_RESULTS: usize = 25;

/// Attempts a version-conditioned update makes before giving up.
///
/// Exhaustion fails the request; the loop never spins unbounded under
/// contention.
pub const MAX_CONDITION_RETRIES: u32 = 4;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Data-access errors, annotated with the entity and key that produced them.
#[derive(Debug, thiserror::Error)]
pub enum DaoError {
    /// No record exists at the addressed key.
    #[error("{entity} not found at {key}")]
    NotFound {
        /// Entity type addressed.
        entity: EntityType,
        /// Key addressed, rendered `partition/sort`.
        key: String,
    },
    /// A create collided with an existing record.
    #[error("{entity} already exists at {key}")]
    AlreadyExists {
        /// Entity type addressed.
        entity: EntityType,
        /// Colliding key, rendered `partition/sort`.
        key: String,
    },
    /// A conditioned update lost the version race [`MAX_CONDITION_RETRIES`] times.
    #[error("{entity} at {key} was updated concurrently; retries exhausted")]
    ConcurrentUpdate {
        /// Entity type addressed.
        entity: EntityType,
        /// Contested key, rendered `partition/sort`.
        key: String,
    },
    /// A record payload or key could not be encoded or decoded.
    #[error("{entity} codec error: {message}")]
    Codec {
        /// Entity type addressed.
        entity: EntityType,
        /// Underlying codec failure.
        message: String,
    },
    /// The store reported an error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a guarded update whose closure may abort the write.
#[derive(Debug, thiserror::Error)]
pub enum DaoUpdateError<E> {
    /// The closure rejected the update; nothing was written.
    #[error("update aborted")]
    Aborted(E),
    /// Data access failed before or during the write.
    #[error(transparent)]
    Dao(#[from] DaoError),
}

// ============================================================================
// SECTION: Stored Records and Pages
// ============================================================================

/// A decoded record together with its storage metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<R> {
    /// The decoded record.
    pub record: R,
    /// Version observed at read time; conditions subsequent writes.
    pub version: u64,
    /// Creation time of the item.
    pub created_at: Timestamp,
    /// Time of the most recent write.
    pub updated_at: Timestamp,
}

/// One page of typed results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items in this page.
    pub items: Vec<T>,
    /// Continuation token; `None` when the listing is exhausted.
    pub next: Option<PageCursor>,
}

impl<T> Page<T> {
    /// Maps the items of this page, keeping the cursor.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page { items: self.items.into_iter().map(f).collect(), next: self.next }
    }
}

/// Resolves the page size for an optional caller-supplied maximum.
///
/// Zero is treated as unspecified.
fn effective_limit(max_results: Option<usize>) -> usize {
    match max_results {
        Some(0) | None => DEFAULT_MAX_QUERY_RESULTS,
        Some(limit) => limit,
    }
}

// ============================================================================
// SECTION: Generic Access Core
// ============================================================================

/// Shared store handle and event sink behind every typed DAO.
#[derive(Clone)]
pub(crate) struct DaoContext {
    /// The table store.
    store: Arc<dyn TableStore>,
    /// Observer notified of every operation.
    events: Arc<dyn StoreEventSink>,
}

impl DaoContext {
    /// Creates a context over a store and an event sink.
    pub(crate) fn new(store: Arc<dyn TableStore>, events: Arc<dyn StoreEventSink>) -> Self {
        Self { store, events }
    }

    /// Reports one finished operation to the event sink and passes it through.
    fn observe<T>(
        &self,
        entity: EntityType,
        operation: &'static str,
        key: &str,
        result: Result<T, DaoError>,
    ) -> Result<T, DaoError> {
        let outcome =
            if result.is_ok() { StoreOutcome::Succeeded } else { StoreOutcome::Failed };
        self.events.record_operation(entity, operation, key, outcome);
        result
    }

    /// Encodes a record into its raw item envelope.
    fn encode<R: StoredRecord>(
        record: &R,
        version: u64,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Result<RawItem, DaoError> {
        let index_key = record
            .index_key()
            .map_err(|err| DaoError::Codec { entity: R::ENTITY, message: err.to_string() })?;
        let payload = serde_json::to_value(record)
            .map_err(|err| DaoError::Codec { entity: R::ENTITY, message: err.to_string() })?;
        Ok(RawItem {
            key: record.primary_key(),
            index_key,
            entity_type: R::ENTITY,
            version,
            created_at,
            updated_at,
            payload,
        })
    }

    /// Decodes a raw item back into a typed record with metadata.
    fn decode<R: StoredRecord>(item: RawItem) -> Result<Stored<R>, DaoError> {
        let record = serde_json::from_value(item.payload)
            .map_err(|err| DaoError::Codec { entity: R::ENTITY, message: err.to_string() })?;
        Ok(Stored {
            record,
            version: item.version,
            created_at: item.created_at,
            updated_at: item.updated_at,
        })
    }

    /// Fetches and decodes the record at `key`, if present.
    fn get<R: StoredRecord>(&self, key: &ItemKey) -> Result<Option<Stored<R>>, DaoError> {
        let result = self
            .store
            .get(key)
            .map_err(DaoError::from)
            .and_then(|item| item.map(Self::decode::<R>).transpose());
        self.observe(R::ENTITY, "get", &key.to_string(), result)
    }

    /// Fetches the record at `key`, failing when absent.
    fn load<R: StoredRecord>(&self, key: &ItemKey) -> Result<Stored<R>, DaoError> {
        self.get::<R>(key)?.ok_or_else(|| DaoError::NotFound {
            entity: R::ENTITY,
            key: key.to_string(),
        })
    }

    /// Creates a record at version 1, failing on key collision.
    fn create<R: StoredRecord>(&self, record: &R, now: Timestamp) -> Result<(), DaoError> {
        let key = record.primary_key();
        let result = Self::encode(record, 1, now, now).and_then(|item| {
            self.store.put_new(item).map_err(|err| match err {
                StoreError::AlreadyExists { key } => {
                    DaoError::AlreadyExists { entity: R::ENTITY, key }
                }
                other => DaoError::Store(other),
            })
        });
        self.observe(R::ENTITY, "create", &key.to_string(), result)
    }

    /// Applies `apply` to the record at `key` under a version condition.
    ///
    /// Rereads and retries on version conflict, up to
    /// [`MAX_CONDITION_RETRIES`] attempts. When `apply` returns an error the
    /// write is abandoned and the error surfaces as
    /// [`DaoUpdateError::Aborted`].
    fn modify<R: StoredRecord, E>(
        &self,
        key: &ItemKey,
        now: Timestamp,
        mut apply: impl FnMut(&mut R) -> Result<(), E>,
    ) -> Result<Stored<R>, DaoUpdateError<E>> {
        let mut attempts = 0;
        loop {
            let stored = self.load::<R>(key)?;
            let mut record = stored.record;
            apply(&mut record).map_err(DaoUpdateError::Aborted)?;
            let next_version = stored.version + 1;
            let item = Self::encode(&record, next_version, stored.created_at, now)
                .map_err(DaoUpdateError::Dao)?;
            match self.store.update(key, item, stored.version) {
                Ok(()) => {
                    self.events.record_operation(
                        R::ENTITY,
                        "update",
                        &key.to_string(),
                        StoreOutcome::Succeeded,
                    );
                    return Ok(Stored {
                        record,
                        version: next_version,
                        created_at: stored.created_at,
                        updated_at: now,
                    });
                }
                Err(StoreError::VersionConflict { .. }) => {
                    attempts += 1;
                    if attempts >= MAX_CONDITION_RETRIES {
                        let err = DaoError::ConcurrentUpdate {
                            entity: R::ENTITY,
                            key: key.to_string(),
                        };
                        self.events.record_operation(
                            R::ENTITY,
                            "update",
                            &key.to_string(),
                            StoreOutcome::Failed,
                        );
                        return Err(DaoUpdateError::Dao(err));
                    }
                }
                Err(StoreError::NotFound { key }) => {
                    return Err(DaoUpdateError::Dao(DaoError::NotFound {
                        entity: R::ENTITY,
                        key,
                    }));
                }
                Err(other) => return Err(DaoUpdateError::Dao(DaoError::Store(other))),
            }
        }
    }

    /// Applies an infallible partial update to the record at `key`.
    fn update<R: StoredRecord>(
        &self,
        key: &ItemKey,
        now: Timestamp,
        mut apply: impl FnMut(&mut R),
    ) -> Result<Stored<R>, DaoError> {
        self.modify::<R, DaoError>(key, now, |record| {
            apply(record);
            Ok(())
        })
        .map_err(|err| match err {
            DaoUpdateError::Aborted(inner) | DaoUpdateError::Dao(inner) => inner,
        })
    }

    /// Deletes the record at `key`, failing when absent.
    fn delete(&self, entity: EntityType, key: &ItemKey) -> Result<(), DaoError> {
        let result = self.store.delete(key).map_err(|err| match err {
            StoreError::NotFound { key } => DaoError::NotFound { entity, key },
            other => DaoError::Store(other),
        });
        self.observe(entity, "delete", &key.to_string(), result)
    }

    /// Runs one page of a ranged query and decodes the results.
    fn query_page<R: StoredRecord>(
        &self,
        request: &QueryRequest,
    ) -> Result<Page<Stored<R>>, DaoError> {
        let result = self.store.query(request).map_err(DaoError::from).and_then(|page| {
            let items = page
                .items
                .into_iter()
                .map(Self::decode::<R>)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Page { items, next: page.cursor })
        });
        self.observe(R::ENTITY, "query", &request.partition, result)
    }
}

// ============================================================================
// SECTION: Profile DAO
// ============================================================================

/// Typed access to profile records.
#[derive(Clone)]
pub struct ProfileDao {
    /// Shared access core.
    ctx: DaoContext,
}

impl ProfileDao {
    /// Creates the DAO over a store and event sink.
    #[must_use]
    pub fn new(store: Arc<dyn TableStore>, events: Arc<dyn StoreEventSink>) -> Self {
        Self { ctx: DaoContext::new(store, events) }
    }

    /// Creates a profile, failing if the identifier is taken.
    ///
    /// # Errors
    /// Returns [`DaoError::AlreadyExists`] on identifier collision.
    pub fn create(&self, record: &ProfileRecord, now: Timestamp) -> Result<(), DaoError> {
        self.ctx.create(record, now)
    }

    /// Fetches a profile, if present.
    ///
    /// # Errors
    /// Returns [`DaoError`] when the store cannot be read.
    pub fn get(&self, id: &ResourceId) -> Result<Option<Stored<ProfileRecord>>, DaoError> {
        self.ctx.get(&profile_key(id))
    }

    /// Fetches a profile, failing when absent.
    ///
    /// # Errors
    /// Returns [`DaoError::NotFound`] when no such profile exists.
    pub fn load(&self, id: &ResourceId) -> Result<Stored<ProfileRecord>, DaoError> {
        self.ctx.load(&profile_key(id))
    }

    /// Applies a partial update to a profile under a version condition.
    ///
    /// # Errors
    /// Returns [`DaoError::ConcurrentUpdate`] when retries are exhausted.
    pub fn update(
        &self,
        id: &ResourceId,
        now: Timestamp,
        apply: impl FnMut(&mut ProfileRecord),
    ) -> Result<Stored<ProfileRecord>, DaoError> {
        self.ctx.update(&profile_key(id), now, apply)
    }

    /// Applies a guarded update whose closure may abort the write.
    ///
    /// # Errors
    /// Returns [`DaoUpdateError::Aborted`] with the closure's error when the
    /// update is rejected before writing.
    pub fn modify<E>(
        &self,
        id: &ResourceId,
        now: Timestamp,
        apply: impl FnMut(&mut ProfileRecord) -> Result<(), E>,
    ) -> Result<Stored<ProfileRecord>, DaoUpdateError<E>> {
        self.ctx.modify(&profile_key(id), now, apply)
    }

    /// Deletes a profile.
    ///
    /// # Errors
    /// Returns [`DaoError::NotFound`] when no such profile exists.
    pub fn delete(&self, id: &ResourceId) -> Result<(), DaoError> {
        self.ctx.delete(EntityType::Profile, &profile_key(id))
    }

    /// Lists all profiles in identifier order.
    ///
    /// # Errors
    /// Returns [`DaoError`] when the page cannot be fetched.
    pub fn list(
        &self,
        cursor: Option<PageCursor>,
        max_results: Option<usize>,
    ) -> Result<Page<Stored<ProfileRecord>>, DaoError> {
        self.ctx.query_page(&QueryRequest {
            index: QueryIndex::Secondary,
            partition: PROFILE_INDEX_PARTITION.to_owned(),
            sort_prefix: None,
            cursor,
            limit: effective_limit(max_results),
            newest_first: false,
        })
    }

    /// Lists profile identifiers only; the projection used for counting.
    ///
    /// # Errors
    /// Returns [`DaoError`] when the page cannot be fetched.
    pub fn list_ids(
        &self,
        cursor: Option<PageCursor>,
        max_results: Option<usize>,
    ) -> Result<Page<ResourceId>, DaoError> {
        Ok(self.list(cursor, max_results)?.map(|stored| stored.record.id))
    }
}

// ============================================================================
// SECTION: Model DAO
// ============================================================================

/// Typed access to model records.
#[derive(Clone)]
pub struct ModelDao {
    /// Shared access core.
    ctx: DaoContext,
}

impl ModelDao {
    /// Creates the DAO over a store and event sink.
    #[must_use]
    pub fn new(store: Arc<dyn TableStore>, events: Arc<dyn StoreEventSink>) -> Self {
        Self { ctx: DaoContext::new(store, events) }
    }

    /// Creates a model, failing if the identifier is taken within the profile.
    ///
    /// # Errors
    /// Returns [`DaoError::AlreadyExists`] on identifier collision.
    pub fn create(&self, record: &ModelRecord, now: Timestamp) -> Result<(), DaoError> {
        self.ctx.create(record, now)
    }

    /// Fetches a model, if present.
    ///
    /// # Errors
    /// Returns [`DaoError`] when the store cannot be read.
    pub fn get(
        &self,
        profile_id: &ResourceId,
        model_id: &ResourceId,
    ) -> Result<Option<Stored<ModelRecord>>, DaoError> {
        self.ctx.get(&model_key(profile_id, model_id))
    }

    /// Fetches a model, failing when absent.
    ///
    /// # Errors
    /// Returns [`DaoError::NotFound`] when no such model exists.
    pub fn load(
        &self,
        profile_id: &ResourceId,
        model_id: &ResourceId,
    ) -> Result<Stored<ModelRecord>, DaoError> {
        self.ctx.load(&model_key(profile_id, model_id))
    }

    /// Applies a partial update to a model under a version condition.
    ///
    /// # Errors
    /// Returns [`DaoError::ConcurrentUpdate`] when retries are exhausted.
    pub fn update(
        &self,
        profile_id: &ResourceId,
        model_id: &ResourceId,
        now: Timestamp,
        apply: impl FnMut(&mut ModelRecord),
    ) -> Result<Stored<ModelRecord>, DaoError> {
        self.ctx.update(&model_key(profile_id, model_id), now, apply)
    }

    /// Applies a guarded update whose closure may abort the write.
    ///
    /// # Errors
    /// Returns [`DaoUpdateError::Aborted`] with the closure's error when the
    /// update is rejected before writing.
    pub fn modify<E>(
        &self,
        profile_id: &ResourceId,
        model_id: &ResourceId,
        now: Timestamp,
        apply: impl FnMut(&mut ModelRecord) -> Result<(), E>,
    ) -> Result<Stored<ModelRecord>, DaoUpdateError<E>> {
        self.ctx.modify(&model_key(profile_id, model_id), now, apply)
    }

    /// Deletes a model.
    ///
    /// # Errors
    /// Returns [`DaoError::NotFound`] when no such model exists.
    pub fn delete(&self, profile_id: &ResourceId, model_id: &ResourceId) -> Result<(), DaoError> {
        self.ctx.delete(EntityType::Model, &model_key(profile_id, model_id))
    }

    /// Lists a profile's models in identifier order.
    ///
    /// # Errors
    /// Returns [`DaoError`] when the page cannot be fetched.
    pub fn list(
        &self,
        profile_id: &ResourceId,
        cursor: Option<PageCursor>,
        max_results: Option<usize>,
    ) -> Result<Page<Stored<ModelRecord>>, DaoError> {
        self.ctx.query_page(&QueryRequest {
            index: QueryIndex::Primary,
            partition: profile_partition(profile_id),
            sort_prefix: Some(MODEL_SORT_PREFIX.to_owned()),
            cursor,
            limit: effective_limit(max_results),
            newest_first: false,
        })
    }

    /// Lists model identifiers only; the projection used for counting.
    ///
    /// # Errors
    /// Returns [`DaoError`] when the page cannot be fetched.
    pub fn list_ids(
        &self,
        profile_id: &ResourceId,
        cursor: Option<PageCursor>,
        max_results: Option<usize>,
    ) -> Result<Page<ResourceId>, DaoError> {
        Ok(self.list(profile_id, cursor, max_results)?.map(|stored| stored.record.id))
    }
}

// ============================================================================
// SECTION: Training DAO
// ============================================================================

/// Typed access to training records.
#[derive(Clone)]
pub struct TrainingDao {
    /// Shared access core.
    ctx: DaoContext,
}

impl TrainingDao {
    /// Creates the DAO over a store and event sink.
    #[must_use]
    pub fn new(store: Arc<dyn TableStore>, events: Arc<dyn StoreEventSink>) -> Self {
        Self { ctx: DaoContext::new(store, events) }
    }

    /// Creates the training record for a model.
    ///
    /// The sort key is fixed, so this doubles as the structural guard: a
    /// second concurrent training for the same model collides here.
    ///
    /// # Errors
    /// Returns [`DaoError::AlreadyExists`] when the model already has a
    /// training record.
    pub fn create(&self, record: &TrainingRecord, now: Timestamp) -> Result<(), DaoError> {
        self.ctx.create(record, now)
    }

    /// Fetches a model's training record, if present.
    ///
    /// # Errors
    /// Returns [`DaoError`] when the store cannot be read.
    pub fn get(&self, model_id: &ResourceId) -> Result<Option<Stored<TrainingRecord>>, DaoError> {
        self.ctx.get(&training_key(model_id))
    }

    /// Fetches a model's training record, failing when absent.
    ///
    /// # Errors
    /// Returns [`DaoError::NotFound`] when the model has never trained.
    pub fn load(&self, model_id: &ResourceId) -> Result<Stored<TrainingRecord>, DaoError> {
        self.ctx.load(&training_key(model_id))
    }

    /// Applies a partial update under a version condition.
    ///
    /// # Errors
    /// Returns [`DaoError::ConcurrentUpdate`] when retries are exhausted.
    pub fn update(
        &self,
        model_id: &ResourceId,
        now: Timestamp,
        apply: impl FnMut(&mut TrainingRecord),
    ) -> Result<Stored<TrainingRecord>, DaoError> {
        self.ctx.update(&training_key(model_id), now, apply)
    }

    /// Deletes a model's training record.
    ///
    /// # Errors
    /// Returns [`DaoError::NotFound`] when absent.
    pub fn delete(&self, model_id: &ResourceId) -> Result<(), DaoError> {
        self.ctx.delete(EntityType::Training, &training_key(model_id))
    }

    /// Returns the model's training if it is in a stoppable status.
    ///
    /// # Errors
    /// Returns [`DaoError`] when the store cannot be read.
    pub fn stoppable(
        &self,
        model_id: &ResourceId,
    ) -> Result<Option<Stored<TrainingRecord>>, DaoError> {
        Ok(self.get(model_id)?.filter(|stored| stored.record.status.is_stoppable()))
    }
}

// ============================================================================
// SECTION: Evaluation DAO
// ============================================================================

/// Typed access to evaluation records.
#[derive(Clone)]
pub struct EvaluationDao {
    /// Shared access core.
    ctx: DaoContext,
}

impl EvaluationDao {
    /// Creates the DAO over a store and event sink.
    #[must_use]
    pub fn new(store: Arc<dyn TableStore>, events: Arc<dyn StoreEventSink>) -> Self {
        Self { ctx: DaoContext::new(store, events) }
    }

    /// Creates an evaluation record.
    ///
    /// # Errors
    /// Returns [`DaoError::AlreadyExists`] on identifier collision.
    pub fn create(&self, record: &EvaluationRecord, now: Timestamp) -> Result<(), DaoError> {
        self.ctx.create(record, now)
    }

    /// Fetches an evaluation, failing when absent.
    ///
    /// # Errors
    /// Returns [`DaoError::NotFound`] when no such evaluation exists.
    pub fn load(
        &self,
        model_id: &ResourceId,
        evaluation_id: &ResourceId,
    ) -> Result<Stored<EvaluationRecord>, DaoError> {
        self.ctx.load(&evaluation_key(model_id, evaluation_id))
    }

    /// Applies a partial update under a version condition.
    ///
    /// # Errors
    /// Returns [`DaoError::ConcurrentUpdate`] when retries are exhausted.
    pub fn update(
        &self,
        model_id: &ResourceId,
        evaluation_id: &ResourceId,
        now: Timestamp,
        apply: impl FnMut(&mut EvaluationRecord),
    ) -> Result<Stored<EvaluationRecord>, DaoError> {
        self.ctx.update(&evaluation_key(model_id, evaluation_id), now, apply)
    }

    /// Lists a model's evaluations in identifier order.
    ///
    /// # Errors
    /// Returns [`DaoError`] when the page cannot be fetched.
    pub fn list(
        &self,
        model_id: &ResourceId,
        cursor: Option<PageCursor>,
        max_results: Option<usize>,
    ) -> Result<Page<Stored<EvaluationRecord>>, DaoError> {
        self.ctx.query_page(&QueryRequest {
            index: QueryIndex::Primary,
            partition: model_partition(model_id),
            sort_prefix: Some(EVALUATION_SORT_PREFIX.to_owned()),
            cursor,
            limit: effective_limit(max_results),
            newest_first: false,
        })
    }

    /// Lists evaluation identifiers only; the projection used for counting.
    ///
    /// # Errors
    /// Returns [`DaoError`] when the page cannot be fetched.
    pub fn list_ids(
        &self,
        model_id: &ResourceId,
        cursor: Option<PageCursor>,
        max_results: Option<usize>,
    ) -> Result<Page<ResourceId>, DaoError> {
        Ok(self.list(model_id, cursor, max_results)?.map(|stored| stored.record.id))
    }

    /// Finds the first stoppable evaluation of a model, draining pages until
    /// one is found or the listing is exhausted.
    ///
    /// # Errors
    /// Returns [`DaoError`] when a page cannot be fetched.
    pub fn stoppable(
        &self,
        model_id: &ResourceId,
    ) -> Result<Option<Stored<EvaluationRecord>>, DaoError> {
        let mut cursor = None;
        loop {
            let page = self.list(model_id, cursor, None)?;
            if let Some(found) =
                page.items.into_iter().find(|stored| stored.record.status.is_stoppable())
            {
                return Ok(Some(found));
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => return Ok(None),
            }
        }
    }
}

// ============================================================================
// SECTION: Submission DAO
// ============================================================================

/// Typed access to submission records.
#[derive(Clone)]
pub struct SubmissionDao {
    /// Shared access core.
    ctx: DaoContext,
}

impl SubmissionDao {
    /// Creates the DAO over a store and event sink.
    #[must_use]
    pub fn new(store: Arc<dyn TableStore>, events: Arc<dyn StoreEventSink>) -> Self {
        Self { ctx: DaoContext::new(store, events) }
    }

    /// Creates a submission record.
    ///
    /// # Errors
    /// Returns [`DaoError::AlreadyExists`] on identifier collision.
    pub fn create(&self, record: &SubmissionRecord, now: Timestamp) -> Result<(), DaoError> {
        self.ctx.create(record, now)
    }

    /// Fetches a submission, failing when absent.
    ///
    /// # Errors
    /// Returns [`DaoError::NotFound`] when no such submission exists.
    pub fn load(
        &self,
        leaderboard_id: &ResourceId,
        profile_id: &ResourceId,
        submission_id: &ResourceId,
    ) -> Result<Stored<SubmissionRecord>, DaoError> {
        self.ctx.load(&submission_key(leaderboard_id, profile_id, submission_id))
    }

    /// Applies a partial update under a version condition.
    ///
    /// # Errors
    /// Returns [`DaoError::ConcurrentUpdate`] when retries are exhausted.
    pub fn update(
        &self,
        leaderboard_id: &ResourceId,
        profile_id: &ResourceId,
        submission_id: &ResourceId,
        now: Timestamp,
        apply: impl FnMut(&mut SubmissionRecord),
    ) -> Result<Stored<SubmissionRecord>, DaoError> {
        self.ctx.update(&submission_key(leaderboard_id, profile_id, submission_id), now, apply)
    }

    /// Lists one profile's submissions to one leaderboard in identifier order.
    ///
    /// # Errors
    /// Returns [`DaoError`] when the page cannot be fetched.
    pub fn list(
        &self,
        leaderboard_id: &ResourceId,
        profile_id: &ResourceId,
        cursor: Option<PageCursor>,
        max_results: Option<usize>,
    ) -> Result<Page<Stored<SubmissionRecord>>, DaoError> {
        self.ctx.query_page(&QueryRequest {
            index: QueryIndex::Primary,
            partition: submission_partition(leaderboard_id, profile_id),
            sort_prefix: Some(SUBMISSION_SORT_PREFIX.to_owned()),
            cursor,
            limit: effective_limit(max_results),
            newest_first: false,
        })
    }

    /// Lists a profile's submissions across all leaderboards, newest first.
    ///
    /// # Errors
    /// Returns [`DaoError`] when the page cannot be fetched.
    pub fn list_by_profile(
        &self,
        profile_id: &ResourceId,
        cursor: Option<PageCursor>,
        max_results: Option<usize>,
    ) -> Result<Page<Stored<SubmissionRecord>>, DaoError> {
        self.ctx.query_page(&QueryRequest {
            index: QueryIndex::Secondary,
            partition: profile_partition(profile_id),
            sort_prefix: None,
            cursor,
            limit: effective_limit(max_results),
            newest_first: true,
        })
    }

    /// Finds the profile's queued submission for a model, if any.
    ///
    /// Submissions are only stoppable while still `Queued`; once handed to
    /// the backend they run to completion.
    ///
    /// # Errors
    /// Returns [`DaoError`] when a page cannot be fetched.
    pub fn stoppable(
        &self,
        profile_id: &ResourceId,
        model_id: &ResourceId,
    ) -> Result<Option<Stored<SubmissionRecord>>, DaoError> {
        let mut cursor = None;
        loop {
            let page = self.list_by_profile(profile_id, cursor, None)?;
            if let Some(found) = page.items.into_iter().find(|stored| {
                stored.record.model_id == *model_id && stored.record.status == JobStatus::Queued
            }) {
                return Ok(Some(found));
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => return Ok(None),
            }
        }
    }
}

// ============================================================================
// SECTION: Leaderboard DAO
// ============================================================================

/// Typed access to leaderboard records.
#[derive(Clone)]
pub struct LeaderboardDao {
    /// Shared access core.
    ctx: DaoContext,
}

impl LeaderboardDao {
    /// Creates the DAO over a store and event sink.
    #[must_use]
    pub fn new(store: Arc<dyn TableStore>, events: Arc<dyn StoreEventSink>) -> Self {
        Self { ctx: DaoContext::new(store, events) }
    }

    /// Creates a leaderboard.
    ///
    /// # Errors
    /// Returns [`DaoError::AlreadyExists`] on identifier collision.
    pub fn create(&self, record: &LeaderboardRecord, now: Timestamp) -> Result<(), DaoError> {
        self.ctx.create(record, now)
    }

    /// Fetches a leaderboard, failing when absent.
    ///
    /// # Errors
    /// Returns [`DaoError::NotFound`] when no such leaderboard exists.
    pub fn load(&self, id: &ResourceId) -> Result<Stored<LeaderboardRecord>, DaoError> {
        self.ctx.load(&leaderboard_key(id))
    }

    /// Applies a partial update under a version condition.
    ///
    /// # Errors
    /// Returns [`DaoError::ConcurrentUpdate`] when retries are exhausted.
    pub fn update(
        &self,
        id: &ResourceId,
        now: Timestamp,
        apply: impl FnMut(&mut LeaderboardRecord),
    ) -> Result<Stored<LeaderboardRecord>, DaoError> {
        self.ctx.update(&leaderboard_key(id), now, apply)
    }

    /// Deletes a leaderboard.
    ///
    /// # Errors
    /// Returns [`DaoError::NotFound`] when no such leaderboard exists.
    pub fn delete(&self, id: &ResourceId) -> Result<(), DaoError> {
        self.ctx.delete(EntityType::Leaderboard, &leaderboard_key(id))
    }

    /// Lists leaderboards ordered by close time, soonest first.
    ///
    /// # Errors
    /// Returns [`DaoError`] when the page cannot be fetched.
    pub fn list_by_close_time(
        &self,
        cursor: Option<PageCursor>,
        max_results: Option<usize>,
    ) -> Result<Page<Stored<LeaderboardRecord>>, DaoError> {
        self.ctx.query_page(&QueryRequest {
            index: QueryIndex::Secondary,
            partition: LEADERBOARD_INDEX_PARTITION.to_owned(),
            sort_prefix: None,
            cursor,
            limit: effective_limit(max_results),
            newest_first: false,
        })
    }

    /// Lists leaderboard identifiers only; the projection used for counting.
    ///
    /// # Errors
    /// Returns [`DaoError`] when the page cannot be fetched.
    pub fn list_ids(
        &self,
        cursor: Option<PageCursor>,
        max_results: Option<usize>,
    ) -> Result<Page<ResourceId>, DaoError> {
        Ok(self.list_by_close_time(cursor, max_results)?.map(|stored| stored.record.id))
    }
}

// ============================================================================
// SECTION: Account Usage DAO
// ============================================================================

/// Typed access to monthly account usage records.
#[derive(Clone)]
pub struct AccountUsageDao {
    /// Shared access core.
    ctx: DaoContext,
}

impl AccountUsageDao {
    /// Creates the DAO over a store and event sink.
    #[must_use]
    pub fn new(store: Arc<dyn TableStore>, events: Arc<dyn StoreEventSink>) -> Self {
        Self { ctx: DaoContext::new(store, events) }
    }

    /// Fetches the usage record for a period, if present.
    ///
    /// # Errors
    /// Returns [`DaoError`] when the store cannot be read.
    pub fn get(
        &self,
        period: UsagePeriod,
    ) -> Result<Option<Stored<AccountUsageRecord>>, DaoError> {
        self.ctx.get(&usage_key(period))
    }

    /// Fetches the usage record for a period, creating the zero-initialized
    /// record on first touch. A concurrent first touch is resolved by
    /// rereading after the losing create.
    ///
    /// # Errors
    /// Returns [`DaoError`] when the store cannot be read or written.
    pub fn get_or_create(
        &self,
        period: UsagePeriod,
        now: Timestamp,
    ) -> Result<Stored<AccountUsageRecord>, DaoError> {
        if let Some(existing) = self.get(period)? {
            return Ok(existing);
        }
        let fresh = AccountUsageRecord::empty(period);
        match self.ctx.create(&fresh, now) {
            Ok(()) => Ok(Stored { record: fresh, version: 1, created_at: now, updated_at: now }),
            Err(DaoError::AlreadyExists { .. }) => self.ctx.load(&usage_key(period)),
            Err(other) => Err(other),
        }
    }

    /// Applies a guarded update whose closure may abort the write.
    ///
    /// # Errors
    /// Returns [`DaoUpdateError::Aborted`] with the closure's error when the
    /// update is rejected before writing.
    pub fn modify<E>(
        &self,
        period: UsagePeriod,
        now: Timestamp,
        apply: impl FnMut(&mut AccountUsageRecord) -> Result<(), E>,
    ) -> Result<Stored<AccountUsageRecord>, DaoUpdateError<E>> {
        self.ctx.modify(&usage_key(period), now, apply)
    }

    /// Applies a partial update under a version condition.
    ///
    /// # Errors
    /// Returns [`DaoError::ConcurrentUpdate`] when retries are exhausted.
    pub fn update(
        &self,
        period: UsagePeriod,
        now: Timestamp,
        apply: impl FnMut(&mut AccountUsageRecord),
    ) -> Result<Stored<AccountUsageRecord>, DaoError> {
        self.ctx.update(&usage_key(period), now, apply)
    }
}
