// crates/paddock-core/src/runtime/mod.rs
// ============================================================================
// Module: Paddock Runtime
// Description: Data access, quota enforcement, and the control plane.
// Purpose: House everything that reads or writes the table store.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The runtime layers upward: typed DAOs over the raw store contract, the
//! quota engine over the counter DAOs, and the control plane over all of it.
//! Every mutating operation takes an explicit `now` timestamp; the runtime
//! never reads the wall clock.

/// Job admission, dispatch, stop, reporting, and resets.
pub mod control;
/// Typed per-entity data access.
pub mod dao;
/// In-process reference store.
pub mod memory;
/// Fleet-level tallies.
pub mod metrics;
/// Two-tier compute-minute admission.
pub mod quota;
