// crates/paddock-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Table Store
// Description: Durable TableStore backed by SQLite WAL.
// Purpose: Persist Paddock items with conditional writes and ranged queries.
// Dependencies: paddock-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! One `items` table holds every entity, addressed by the (pk, sk) composite
//! primary key; secondary-index keys live in two nullable columns covered by
//! their own index. Conditional creation maps onto the primary-key
//! constraint, and version-conditioned updates onto `UPDATE ... WHERE
//! version = ?` with a follow-up read to tell a missing row from a lost
//! race. Query semantics match the in-memory reference store exactly,
//! including cursor partition guarding.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use paddock_core::CursorPosition;
use paddock_core::EntityType;
use paddock_core::ItemKey;
use paddock_core::PageCursor;
use paddock_core::QueryIndex;
use paddock_core::QueryPage;
use paddock_core::QueryRequest;
use paddock_core::RawItem;
use paddock_core::StoreError;
use paddock_core::TableStore;
use paddock_core::Timestamp;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use rusqlite::params_from_iter;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema version written to `store_meta` on first open.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Character appended to a prefix to form its exclusive upper bound.
///
/// Sort keys are ASCII, so any key extending the prefix sorts below this.
const PREFIX_UPPER_BOUND: char = '\u{10FFFF}';

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` table store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors opening or initializing the `SQLite` store.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
}

/// Maps an engine error onto the store contract.
fn db_err(err: &rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed [`TableStore`] with WAL support.
#[derive(Clone)]
pub struct SqliteTableStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteTableStore {
    /// Opens an `SQLite`-backed table store.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self { connection: Arc::new(Mutex::new(connection)) })
    }

    /// Acquires the connection lock, surfacing poisoning as a backend error.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::Backend("sqlite connection lock poisoned".to_owned()))
    }
}

impl TableStore for SqliteTableStore {
    fn get(&self, key: &ItemKey) -> Result<Option<RawItem>, StoreError> {
        let connection = self.lock()?;
        connection
            .query_row(
                "SELECT pk, sk, index_pk, index_sk, entity_type, version, created_at, \
                 updated_at, payload FROM items WHERE pk = ?1 AND sk = ?2",
                params![key.partition, key.sort],
                row_to_item,
            )
            .optional()
            .map_err(|err| db_err(&err))
    }

    fn put_new(&self, item: RawItem) -> Result<(), StoreError> {
        let fields = ItemFields::try_from(&item)?;
        let connection = self.lock()?;
        let inserted = connection.execute(
            "INSERT INTO items (pk, sk, index_pk, index_sk, entity_type, version, created_at, \
             updated_at, payload) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                item.key.partition,
                item.key.sort,
                fields.index_pk,
                fields.index_sk,
                item.entity_type.as_str(),
                fields.version,
                item.created_at.as_unix_millis(),
                item.updated_at.as_unix_millis(),
                fields.payload,
            ],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::AlreadyExists { key: item.key.to_string() })
            }
            Err(err) => Err(db_err(&err)),
        }
    }

    fn update(
        &self,
        key: &ItemKey,
        item: RawItem,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let fields = ItemFields::try_from(&item)?;
        let expected = i64::try_from(expected_version)
            .map_err(|_| StoreError::Serialization("version exceeds i64 range".to_owned()))?;
        let connection = self.lock()?;
        let changed = connection
            .execute(
                "UPDATE items SET index_pk = ?1, index_sk = ?2, entity_type = ?3, version = ?4, \
                 updated_at = ?5, payload = ?6 WHERE pk = ?7 AND sk = ?8 AND version = ?9",
                params![
                    fields.index_pk,
                    fields.index_sk,
                    item.entity_type.as_str(),
                    fields.version,
                    item.updated_at.as_unix_millis(),
                    fields.payload,
                    key.partition,
                    key.sort,
                    expected,
                ],
            )
            .map_err(|err| db_err(&err))?;
        if changed > 0 {
            return Ok(());
        }
        // Zero rows means either a missing item or a lost version race.
        let exists: Option<i64> = connection
            .query_row(
                "SELECT 1 FROM items WHERE pk = ?1 AND sk = ?2",
                params![key.partition, key.sort],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_err(&err))?;
        if exists.is_some() {
            Err(StoreError::VersionConflict { key: key.to_string() })
        } else {
            Err(StoreError::NotFound { key: key.to_string() })
        }
    }

    fn delete(&self, key: &ItemKey) -> Result<(), StoreError> {
        let connection = self.lock()?;
        let deleted = connection
            .execute(
                "DELETE FROM items WHERE pk = ?1 AND sk = ?2",
                params![key.partition, key.sort],
            )
            .map_err(|err| db_err(&err))?;
        if deleted > 0 { Ok(()) } else { Err(StoreError::NotFound { key: key.to_string() }) }
    }

    fn query(&self, request: &QueryRequest) -> Result<QueryPage, StoreError> {
        let resume_after = match &request.cursor {
            Some(cursor) => {
                let position = cursor.decode()?;
                if position.partition != request.partition {
                    return Err(StoreError::InvalidCursor(format!(
                        "cursor belongs to partition {}, query ranges over {}",
                        position.partition, request.partition
                    )));
                }
                Some(position.sort)
            }
            None => None,
        };

        let (pk_column, sk_column) = match request.index {
            QueryIndex::Primary => ("pk", "sk"),
            QueryIndex::Secondary => ("index_pk", "index_sk"),
        };
        let mut sql = format!(
            "SELECT pk, sk, index_pk, index_sk, entity_type, version, created_at, updated_at, \
             payload FROM items WHERE {pk_column} = ?1"
        );
        let mut binds: Vec<String> = vec![request.partition.clone()];
        if let Some(prefix) = &request.sort_prefix {
            binds.push(prefix.clone());
            sql.push_str(&format!(" AND {sk_column} >= ?{}", binds.len()));
            binds.push(format!("{prefix}{PREFIX_UPPER_BOUND}"));
            sql.push_str(&format!(" AND {sk_column} < ?{}", binds.len()));
        }
        if let Some(after) = resume_after {
            let comparison = if request.newest_first { "<" } else { ">" };
            binds.push(after);
            sql.push_str(&format!(" AND {sk_column} {comparison} ?{}", binds.len()));
        }
        let direction = if request.newest_first { "DESC" } else { "ASC" };
        // Fetch one extra row to learn whether a continuation cursor is due.
        sql.push_str(&format!(
            " ORDER BY {sk_column} {direction} LIMIT {}",
            request.limit.saturating_add(1)
        ));

        let connection = self.lock()?;
        let mut statement = connection.prepare(&sql).map_err(|err| db_err(&err))?;
        let rows = statement
            .query_map(params_from_iter(binds.iter()), |row| {
                let item = row_to_item(row)?;
                let sort: String = match request.index {
                    QueryIndex::Primary => row.get(1)?,
                    QueryIndex::Secondary => row.get(3)?,
                };
                Ok((sort, item))
            })
            .map_err(|err| db_err(&err))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| db_err(&err))?;

        let has_more = rows.len() > request.limit;
        let mut items = Vec::new();
        let mut last_sort = None;
        for (sort, item) in rows.into_iter().take(request.limit) {
            last_sort = Some(sort);
            items.push(item);
        }
        let cursor = match last_sort {
            Some(sort) if has_more => Some(PageCursor::encode(&CursorPosition {
                partition: request.partition.clone(),
                sort,
            })?),
            _ => None,
        };
        Ok(QueryPage { items, cursor })
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Column values derived from an item before binding.
struct ItemFields {
    /// Secondary-index partition, when indexed.
    index_pk: Option<String>,
    /// Secondary-index sort, when indexed.
    index_sk: Option<String>,
    /// Version as the engine's integer type.
    version: i64,
    /// Serialized payload.
    payload: String,
}

impl TryFrom<&RawItem> for ItemFields {
    type Error = StoreError;

    fn try_from(item: &RawItem) -> Result<Self, StoreError> {
        let version = i64::try_from(item.version)
            .map_err(|_| StoreError::Serialization("version exceeds i64 range".to_owned()))?;
        let payload = serde_json::to_string(&item.payload)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        Ok(Self {
            index_pk: item.index_key.as_ref().map(|key| key.partition.clone()),
            index_sk: item.index_key.as_ref().map(|key| key.sort.clone()),
            version,
            payload,
        })
    }
}

/// Decodes one `items` row back into a [`RawItem`].
///
/// Decoding failures surface as engine conversion errors so `query_row`
/// callers keep a single error path.
fn row_to_item(row: &Row<'_>) -> Result<RawItem, rusqlite::Error> {
    let partition: String = row.get(0)?;
    let sort: String = row.get(1)?;
    let index_pk: Option<String> = row.get(2)?;
    let index_sk: Option<String> = row.get(3)?;
    let entity: String = row.get(4)?;
    let version: i64 = row.get(5)?;
    let created_at: i64 = row.get(6)?;
    let updated_at: i64 = row.get(7)?;
    let payload: String = row.get(8)?;

    let entity_type = EntityType::parse(&entity).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown entity type {entity}").into(),
        )
    })?;
    let version = u64::try_from(version).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Integer,
            Box::new(err),
        )
    })?;
    let payload = serde_json::from_str(&payload).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            rusqlite::types::Type::Text,
            Box::new(err),
        )
    })?;
    let index_key = match (index_pk, index_sk) {
        (Some(pk), Some(sk)) => Some(ItemKey::new(pk, sk)),
        _ => None,
    };
    Ok(RawItem {
        key: ItemKey::new(partition, sort),
        index_key,
        entity_type,
        version,
        created_at: Timestamp::from_unix_millis(created_at),
        updated_at: Timestamp::from_unix_millis(updated_at),
        payload,
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_owned()));
    };
    if parent.as_os_str().is_empty() {
        // Bare filename; the working directory already exists.
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Opens an `SQLite` connection with durable defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS items (
                    pk TEXT NOT NULL,
                    sk TEXT NOT NULL,
                    index_pk TEXT,
                    index_sk TEXT,
                    entity_type TEXT NOT NULL,
                    version INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    payload TEXT NOT NULL,
                    PRIMARY KEY (pk, sk)
                );
                CREATE INDEX IF NOT EXISTS idx_items_secondary
                    ON items (index_pk, index_sk);",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}
