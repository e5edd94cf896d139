// crates/paddock-core/src/runtime/memory.rs
// ============================================================================
// Module: Paddock In-Memory Store
// Description: Reference TableStore over in-process ordered maps.
// Purpose: Back unit and control-plane tests without touching disk.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! A complete [`TableStore`] over two ordered maps guarded by one mutex:
//! items by primary key, plus a secondary-index map pointing back at primary
//! keys. Semantics match the durable store exactly, including conditional
//! creation, version-conditioned updates, prefix-ranged queries, and cursor
//! partition guarding, so tests written against this store exercise the
//! same contract the SQLite store implements.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::schema::ItemKey;
use crate::core::schema::RawItem;
use crate::interfaces::CursorPosition;
use crate::interfaces::PageCursor;
use crate::interfaces::QueryIndex;
use crate::interfaces::QueryPage;
use crate::interfaces::QueryRequest;
use crate::interfaces::StoreError;
use crate::interfaces::TableStore;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Map key type: (partition, sort).
type MapKey = (String, String);

/// The two key spaces backing the store.
#[derive(Debug, Default)]
struct Tables {
    /// Items addressed by primary key.
    primary: BTreeMap<MapKey, RawItem>,
    /// Secondary-index entries pointing back at primary keys.
    secondary: BTreeMap<MapKey, MapKey>,
}

/// In-process [`TableStore`] for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryTableStore {
    /// Guarded key spaces.
    inner: Mutex<Tables>,
}

impl InMemoryTableStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the table lock, surfacing poisoning as a backend error.
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_owned()))
    }

    /// Converts an [`ItemKey`] into the map key form.
    fn map_key(key: &ItemKey) -> MapKey {
        (key.partition.clone(), key.sort.clone())
    }
}

impl TableStore for InMemoryTableStore {
    fn get(&self, key: &ItemKey) -> Result<Option<RawItem>, StoreError> {
        let tables = self.lock()?;
        Ok(tables.primary.get(&Self::map_key(key)).cloned())
    }

    fn put_new(&self, item: RawItem) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        let map_key = Self::map_key(&item.key);
        if tables.primary.contains_key(&map_key) {
            return Err(StoreError::AlreadyExists { key: item.key.to_string() });
        }
        if let Some(index_key) = &item.index_key {
            tables.secondary.insert(Self::map_key(index_key), map_key.clone());
        }
        tables.primary.insert(map_key, item);
        Ok(())
    }

    fn update(
        &self,
        key: &ItemKey,
        item: RawItem,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        let map_key = Self::map_key(key);
        let Some(current) = tables.primary.get(&map_key) else {
            return Err(StoreError::NotFound { key: key.to_string() });
        };
        if current.version != expected_version {
            return Err(StoreError::VersionConflict { key: key.to_string() });
        }
        let old_index = current.index_key.clone();
        if let Some(index_key) = old_index {
            tables.secondary.remove(&Self::map_key(&index_key));
        }
        if let Some(index_key) = &item.index_key {
            tables.secondary.insert(Self::map_key(index_key), map_key.clone());
        }
        tables.primary.insert(map_key, item);
        Ok(())
    }

    fn delete(&self, key: &ItemKey) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        let map_key = Self::map_key(key);
        let Some(removed) = tables.primary.remove(&map_key) else {
            return Err(StoreError::NotFound { key: key.to_string() });
        };
        if let Some(index_key) = &removed.index_key {
            tables.secondary.remove(&Self::map_key(index_key));
        }
        Ok(())
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

        let tables = self.lock()?;
        // Matching sort keys in ascending order, paired with their items.
        let mut matching: Vec<(String, RawItem)> = match request.index {
            QueryIndex::Primary => tables
                .primary
                .iter()
                .filter(|((partition, sort), _)| {
                    *partition == request.partition && sort_matches(sort, request)
                })
                .map(|((_, sort), item)| (sort.clone(), item.clone()))
                .collect(),
            QueryIndex::Secondary => tables
                .secondary
                .iter()
                .filter(|((partition, sort), _)| {
                    *partition == request.partition && sort_matches(sort, request)
                })
                .map(|((_, sort), primary_key)| {
                    tables
                        .primary
                        .get(primary_key)
                        .cloned()
                        .map(|item| (sort.clone(), item))
                        .ok_or_else(|| {
                            StoreError::Backend(format!(
                                "index entry {}/{sort} points at a missing item",
                                request.partition
                            ))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?,
        };
        if request.newest_first {
            matching.reverse();
        }

        let resumed: Vec<(String, RawItem)> = match resume_after {
            Some(after) => matching
                .into_iter()
                .skip_while(|(sort, _)| {
                    if request.newest_first { *sort >= after } else { *sort <= after }
                })
                .collect(),
            None => matching,
        };

        let remaining = resumed.len();
        let mut items = Vec::new();
        let mut last_sort = None;
        for (sort, item) in resumed.into_iter().take(request.limit) {
            last_sort = Some(sort);
            items.push(item);
        }
        let cursor = match last_sort {
            Some(sort) if remaining > request.limit => Some(PageCursor::encode(
                &CursorPosition { partition: request.partition.clone(), sort },
            )?),
            _ => None,
        };
        Ok(QueryPage { items, cursor })
    }
}

/// Applies the optional sort-key prefix filter of a query.
fn sort_matches(sort: &str, request: &QueryRequest) -> bool {
    request.sort_prefix.as_deref().is_none_or(|prefix| sort.starts_with(prefix))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::EntityType;
    use crate::core::time::Timestamp;

    /// Builds a bare item for store-contract checks.
    fn item(partition: &str, sort: &str, version: u64) -> RawItem {
        RawItem {
            key: ItemKey::new(partition.to_owned(), sort.to_owned()),
            index_key: None,
            entity_type: EntityType::Profile,
            version,
            created_at: Timestamp::from_unix_millis(0),
            updated_at: Timestamp::from_unix_millis(0),
            payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn put_new_rejects_key_collision() -> Result<(), StoreError> {
        let store = InMemoryTableStore::new();
        store.put_new(item("p", "a", 1))?;
        assert!(matches!(
            store.put_new(item("p", "a", 1)),
            Err(StoreError::AlreadyExists { .. })
        ));
        Ok(())
    }

    #[test]
    fn update_requires_expected_version() -> Result<(), StoreError> {
        let store = InMemoryTableStore::new();
        store.put_new(item("p", "a", 1))?;
        assert!(matches!(
            store.update(&ItemKey::new("p".into(), "a".into()), item("p", "a", 2), 9),
            Err(StoreError::VersionConflict { .. })
        ));
        store.update(&ItemKey::new("p".into(), "a".into()), item("p", "a", 2), 1)?;
        Ok(())
    }

    #[test]
    fn delete_of_missing_item_is_not_found() {
        let store = InMemoryTableStore::new();
        assert!(matches!(
            store.delete(&ItemKey::new("p".into(), "a".into())),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn query_pages_in_sort_order_with_cursor() -> Result<(), StoreError> {
        let store = InMemoryTableStore::new();
        for sort in ["a", "b", "c", "d", "e"] {
            store.put_new(item("p", sort, 1))?;
        }
        let request = QueryRequest {
            index: QueryIndex::Primary,
            partition: "p".to_owned(),
            sort_prefix: None,
            cursor: None,
            limit: 2,
            newest_first: false,
        };
        let first = store.query(&request)?;
        assert_eq!(first.items.len(), 2);
        let second = store.query(&QueryRequest { cursor: first.cursor, ..request.clone() })?;
        assert_eq!(second.items.len(), 2);
        let third = store.query(&QueryRequest { cursor: second.cursor, ..request })?;
        assert_eq!(third.items.len(), 1);
        assert!(third.cursor.is_none());
        Ok(())
    }

    #[test]
    fn query_rejects_cursor_from_another_partition() -> Result<(), StoreError> {
        let store = InMemoryTableStore::new();
        for sort in ["a", "b", "c"] {
            store.put_new(item("p", sort, 1))?;
            store.put_new(item("q", sort, 1))?;
        }
        let request = QueryRequest {
            index: QueryIndex::Primary,
            partition: "p".to_owned(),
            sort_prefix: None,
            cursor: None,
            limit: 1,
            newest_first: false,
        };
        let page = store.query(&request)?;
        let replay = QueryRequest { partition: "q".to_owned(), cursor: page.cursor, ..request };
        assert!(matches!(store.query(&replay), Err(StoreError::InvalidCursor(_))));
        Ok(())
    }
}
