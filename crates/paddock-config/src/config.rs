// crates/paddock-config/src/config.rs
// ============================================================================
// Module: Paddock Configuration
// Description: Canonical TOML configuration model and validation.
// Purpose: Single source of truth for paddock.toml semantics.
// Dependencies: paddock-core, paddock-store-sqlite, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! The configuration model for a Paddock deployment: quota limits and the
//! durable store. Loading is fail-closed: a file that parses but fails
//! validation is rejected, never silently corrected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use paddock_core::QuotaLimits;
use paddock_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "paddock.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "PADDOCK_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default system-wide compute-minute ceiling per calendar month.
pub(crate) const DEFAULT_ACCOUNT_MONTHLY_MINUTES_CEILING: u64 = 10_000;
/// Default per-profile compute-minute cap for new registrations.
pub(crate) const DEFAULT_PROFILE_MINUTES_CAP: u64 = 500;
/// Default per-profile model-count cap for new registrations.
pub(crate) const DEFAULT_PROFILE_MODEL_CAP: u32 = 10;
/// Default page size for the monthly quota reset walk.
pub(crate) const DEFAULT_RESET_BATCH_SIZE: usize = 25;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Paddock deployment configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PaddockConfig {
    /// Compute-quota limits and reset tuning.
    #[serde(default)]
    pub quota: QuotaConfig,
    /// Durable store configuration.
    pub store: SqliteStoreConfig,
}

impl PaddockConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: the explicit `path` argument, then the
    /// `PADDOCK_CONFIG` environment variable, then `paddock.toml` in the
    /// working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.quota.validate()?;
        validate_store(&self.store)?;
        Ok(())
    }
}

/// Compute-quota limits and reset tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    /// System-wide compute-minute ceiling per calendar month.
    #[serde(default = "default_account_ceiling")]
    pub account_monthly_minutes_ceiling: u64,
    /// Compute-minute cap stamped onto new profiles; `None` leaves them
    /// bounded only by the account ceiling.
    #[serde(default = "default_profile_minutes_cap")]
    pub default_max_total_compute_minutes: Option<u64>,
    /// Model-count cap stamped onto new profiles; `None` leaves them uncapped.
    #[serde(default = "default_profile_model_cap")]
    pub default_max_model_count: Option<u32>,
    /// Page size for the monthly quota reset walk.
    #[serde(default = "default_reset_batch_size")]
    pub reset_batch_size: usize,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            account_monthly_minutes_ceiling: default_account_ceiling(),
            default_max_total_compute_minutes: default_profile_minutes_cap(),
            default_max_model_count: default_profile_model_cap(),
            reset_batch_size: default_reset_batch_size(),
        }
    }
}

impl QuotaConfig {
    /// Validates quota settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when quota settings are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account_monthly_minutes_ceiling == 0 {
            return Err(ConfigError::Invalid(
                "quota.account_monthly_minutes_ceiling must be greater than zero".to_string(),
            ));
        }
        if self.default_max_total_compute_minutes == Some(0) {
            return Err(ConfigError::Invalid(
                "quota.default_max_total_compute_minutes must be greater than zero".to_string(),
            ));
        }
        if self.default_max_model_count == Some(0) {
            return Err(ConfigError::Invalid(
                "quota.default_max_model_count must be greater than zero".to_string(),
            ));
        }
        if self.reset_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "quota.reset_batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts the section into the limits carried by the quota engine.
    #[must_use]
    pub const fn limits(&self) -> QuotaLimits {
        QuotaLimits {
            account_monthly_minutes_ceiling: self.account_monthly_minutes_ceiling,
            default_max_total_compute_minutes: self.default_max_total_compute_minutes,
            default_max_model_count: self.default_max_model_count,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the configuration path from argument, environment, or default.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against size limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates the store section.
fn validate_store(store: &SqliteStoreConfig) -> Result<(), ConfigError> {
    if store.path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("store.path must be set".to_string()));
    }
    if store.busy_timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "store.busy_timeout_ms must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default account-wide monthly compute-minute ceiling.
const fn default_account_ceiling() -> u64 {
    DEFAULT_ACCOUNT_MONTHLY_MINUTES_CEILING
}

/// Default per-profile compute-minute cap.
const fn default_profile_minutes_cap() -> Option<u64> {
    Some(DEFAULT_PROFILE_MINUTES_CAP)
}

/// Default per-profile model-count cap.
const fn default_profile_model_cap() -> Option<u32> {
    Some(DEFAULT_PROFILE_MODEL_CAP)
}

/// Default page size for the monthly reset walk.
const fn default_reset_batch_size() -> usize {
    DEFAULT_RESET_BATCH_SIZE
}
