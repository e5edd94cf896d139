// crates/paddock-config/src/lib.rs
// ============================================================================
// Module: Paddock Config Library
// Description: Canonical config model, validation, and TOML loading.
// Purpose: Single source of truth for paddock.toml semantics.
// Dependencies: paddock-core, paddock-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `paddock-config` defines the canonical configuration model for Paddock.
//! It provides strict, fail-closed validation: a file that parses but fails
//! validation is rejected in full rather than partially applied.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ConfigError;
pub use config::PaddockConfig;
pub use config::QuotaConfig;
