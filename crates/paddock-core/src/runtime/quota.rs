// crates/paddock-core/src/runtime/quota.rs
// ============================================================================
// Module: Paddock Quota Engine
// Description: Two-tier compute-minute admission, release, and monthly reset.
// Purpose: Guarantee neither profile caps nor the account ceiling overcommit.
// Dependencies: crate::core, crate::runtime::dao
// ============================================================================

//! ## Overview
//! Admission reserves the full requested estimate on two counters before a
//! job is created: the owning profile's `compute_minutes_queued` and the
//! system-wide monthly tally. Both reservations go through
//! version-conditioned writes, so concurrent admissions against the same
//! remaining capacity cannot both succeed. The profile is checked and
//! reserved first; if the account ceiling then rejects the request, the
//! profile reservation is rolled back before the error surfaces.
//!
//! On termination the reservation is settled: queued minutes fall by the
//! reserved amount (floored at zero) and used minutes rise by the consumed
//! amount, capped at the reservation. Consumed never exceeding reserved is
//! a backend guarantee (jobs hard-stop at their minute budget); the cap
//! keeps a misreporting backend from corrupting the tallies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::core::identifiers::ResourceId;
use crate::core::time::Timestamp;
use crate::core::time::UsagePeriod;
use crate::runtime::dao::AccountUsageDao;
use crate::runtime::dao::DEFAULT_MAX_QUERY_RESULTS;
use crate::runtime::dao::DaoError;
use crate::runtime::dao::DaoUpdateError;
use crate::runtime::dao::ProfileDao;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// A rejected admission, naming the tier that rejected it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapacityExceeded {
    /// The profile's monthly cap cannot fit the request.
    #[error(
        "profile {profile_id} cannot fit {requested} minutes ({available} of {cap} available)"
    )]
    Profile {
        /// The capped profile.
        profile_id: ResourceId,
        /// Minutes the request asked for.
        requested: u64,
        /// Minutes still available under the cap.
        available: u64,
        /// The profile's monthly cap.
        cap: u64,
    },
    /// The system-wide monthly ceiling cannot fit the request.
    #[error("account ceiling for {period} cannot fit {requested} minutes ({available} available)")]
    Account {
        /// The month whose ceiling rejected the request.
        period: UsagePeriod,
        /// Minutes the request asked for.
        requested: u64,
        /// Minutes still available under the ceiling.
        available: u64,
    },
}

/// Quota engine errors.
#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    /// The request exceeds a capacity bound.
    #[error(transparent)]
    Capacity(#[from] CapacityExceeded),
    /// Data access failed.
    #[error(transparent)]
    Dao(#[from] DaoError),
}

/// Folds a guarded-update outcome into a [`QuotaError`].
impl From<DaoUpdateError<CapacityExceeded>> for QuotaError {
    fn from(err: DaoUpdateError<CapacityExceeded>) -> Self {
        match err {
            DaoUpdateError::Aborted(capacity) => Self::Capacity(capacity),
            DaoUpdateError::Dao(dao) => Self::Dao(dao),
        }
    }
}

// ============================================================================
// SECTION: Limits and Reports
// ============================================================================

/// Operator-configured quota bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaLimits {
    /// System-wide compute-minute ceiling per calendar month.
    pub account_monthly_minutes_ceiling: u64,
    /// Cap applied to newly registered profiles; `None` leaves them uncapped.
    pub default_max_total_compute_minutes: Option<u64>,
    /// Model-count cap applied to newly registered profiles.
    pub default_max_model_count: Option<u32>,
}

/// Audit record of one monthly reset run.
///
/// A failed profile write never halts the walk; it lands in `failed` and the
/// run continues, so the report always accounts for every profile visited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    /// Profiles whose counters were reset.
    pub reset: Vec<ResourceId>,
    /// Profiles whose reset write failed.
    pub failed: Vec<ResourceId>,
    /// Number of pages walked.
    pub batches: u32,
}

// ============================================================================
// SECTION: Quota Engine
// ============================================================================

/// Two-tier compute-minute admission control.
#[derive(Clone)]
pub struct QuotaEngine {
    /// Profile counters.
    profiles: ProfileDao,
    /// System-wide monthly counters.
    usage: AccountUsageDao,
    /// Configured bounds.
    limits: QuotaLimits,
}

impl QuotaEngine {
    /// Creates the engine over the two counter DAOs.
    #[must_use]
    pub fn new(profiles: ProfileDao, usage: AccountUsageDao, limits: QuotaLimits) -> Self {
        Self { profiles, usage, limits }
    }

    /// Returns the configured bounds.
    #[must_use]
    pub const fn limits(&self) -> &QuotaLimits {
        &self.limits
    }

    /// Admits a job estimated at `estimated_minutes`, reserving the estimate
    /// on both tiers.
    ///
    /// # Errors
    /// Returns [`QuotaError::Capacity`] when either tier cannot fit the
    /// request; the profile reservation is rolled back when the account
    /// ceiling rejects it. Returns [`QuotaError::Dao`] on store failures or
    /// retry exhaustion.
    pub fn admit(
        &self,
        profile_id: &ResourceId,
        period: UsagePeriod,
        estimated_minutes: u64,
        now: Timestamp,
    ) -> Result<(), QuotaError> {
        self.profiles
            .modify(profile_id, now, |profile| {
                if let Some(cap) = profile.max_total_compute_minutes {
                    let committed = profile.compute_minutes_used + profile.compute_minutes_queued;
                    if committed + estimated_minutes > cap {
                        return Err(CapacityExceeded::Profile {
                            profile_id: profile.id.clone(),
                            requested: estimated_minutes,
                            available: cap.saturating_sub(committed),
                            cap,
                        });
                    }
                }
                profile.compute_minutes_queued += estimated_minutes;
                Ok(())
            })
            .map_err(QuotaError::from)?;

        self.usage.get_or_create(period, now)?;
        let ceiling = self.limits.account_monthly_minutes_ceiling;
        let account_result = self
            .usage
            .modify(period, now, |usage| {
                let committed = usage.minutes_used + usage.minutes_queued;
                if committed + estimated_minutes > ceiling {
                    return Err(CapacityExceeded::Account {
                        period,
                        requested: estimated_minutes,
                        available: ceiling.saturating_sub(committed),
                    });
                }
                usage.minutes_queued += estimated_minutes;
                Ok(())
            })
            .map_err(QuotaError::from);

        if let Err(err) = account_result {
            // Undo the profile reservation; the request holds nothing now.
            self.profiles.update(profile_id, now, |profile| {
                profile.compute_minutes_queued =
                    profile.compute_minutes_queued.saturating_sub(estimated_minutes);
            })?;
            return Err(err);
        }
        Ok(())
    }

    /// Settles a reservation when its job terminates.
    ///
    /// Queued minutes fall by `minutes_reserved` (floored at zero); used
    /// minutes rise by `min(minutes_reserved, minutes_consumed)`. A consumed
    /// figure below the reservation is the normal case for jobs that
    /// finished or were stopped early.
    ///
    /// # Errors
    /// Returns [`QuotaError::Dao`] on store failures or retry exhaustion.
    pub fn release(
        &self,
        profile_id: &ResourceId,
        period: UsagePeriod,
        minutes_reserved: u64,
        minutes_consumed: u64,
        now: Timestamp,
    ) -> Result<(), QuotaError> {
        let settled = minutes_reserved.min(minutes_consumed);
        self.profiles.update(profile_id, now, |profile| {
            profile.compute_minutes_queued =
                profile.compute_minutes_queued.saturating_sub(minutes_reserved);
            profile.compute_minutes_used += settled;
        })?;
        self.usage.get_or_create(period, now)?;
        self.usage.update(period, now, |usage| {
            usage.minutes_queued = usage.minutes_queued.saturating_sub(minutes_reserved);
            usage.minutes_used += settled;
        })?;
        Ok(())
    }

    /// Resets every profile's monthly counters and opens the next period's
    /// account record.
    ///
    /// Zeroes `compute_minutes_used` and `model_count`; queued minutes are
    /// preserved because they belong to jobs still holding reservations
    /// across the month boundary. Per-profile write failures are recorded
    /// and the walk continues; only a failed page fetch aborts the run.
    ///
    /// # Errors
    /// Returns [`QuotaError::Dao`] when a page of profiles cannot be fetched
    /// or the next period's record cannot be opened.
    pub fn reset_monthly(
        &self,
        period: UsagePeriod,
        batch_size: Option<usize>,
        now: Timestamp,
    ) -> Result<ResetReport, QuotaError> {
        let batch = match batch_size {
            Some(0) | None => DEFAULT_MAX_QUERY_RESULTS,
            Some(size) => size,
        };
        let mut report = ResetReport::default();
        let mut cursor = None;
        loop {
            let page = self.profiles.list(cursor, Some(batch))?;
            report.batches += 1;
            for stored in page.items {
                let id = stored.record.id.clone();
                let outcome = self.profiles.update(&id, now, |profile| {
                    profile.compute_minutes_used = 0;
                    profile.model_count = 0;
                });
                match outcome {
                    Ok(_) => report.reset.push(id),
                    Err(_) => report.failed.push(id),
                }
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        self.usage.get_or_create(period.next(), now)?;
        Ok(report)
    }
}
