// crates/paddock-core/src/core/mod.rs
// ============================================================================
// Module: Paddock Core Domain
// Description: Identifiers, job names, time, lifecycle, records, and schema.
// Purpose: House the pure domain types shared by every other layer.
// Dependencies: serde, serde_json, rand, time
// ============================================================================

//! ## Overview
//! Pure domain layer: nothing here performs I/O or reads the wall clock.
//! Storage access lives in the runtime module; backend and store interfaces
//! live in the interfaces module.

/// Opaque resource identifiers and job kinds.
pub mod identifiers;
/// The reversible job-name codec.
pub mod names;
/// Entity record shapes.
pub mod records;
/// Key templates and the raw item envelope.
pub mod schema;
/// Job and model lifecycle statuses.
pub mod status;
/// Timestamps and usage periods.
pub mod time;
