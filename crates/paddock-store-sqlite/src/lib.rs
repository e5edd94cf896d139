// crates/paddock-store-sqlite/src/lib.rs
// ============================================================================
// Module: Paddock SQLite Store Library
// Description: Durable single-table store for Paddock over SQLite WAL.
// Purpose: Provide the production TableStore implementation.
// Dependencies: paddock-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Durable [`paddock_core::TableStore`] implementation backed by `SQLite`.
//! Semantics match the in-memory reference store: conditional creation,
//! version-conditioned updates, prefix-ranged queries, and partition-guarded
//! cursors.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteJournalMode;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteSyncMode;
pub use store::SqliteTableStore;
