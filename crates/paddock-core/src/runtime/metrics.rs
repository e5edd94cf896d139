// crates/paddock-core/src/runtime/metrics.rs
// ============================================================================
// Module: Paddock Fleet Metrics
// Description: Paginated counting of profiles, models, and leaderboards.
// Purpose: Produce fleet-level tallies for operator dashboards and resets.
// Dependencies: crate::runtime::dao, serde
// ============================================================================

//! ## Overview
//! Counting walks listings page by page; nothing here assumes the store can
//! count natively. Model totals come from the `model_count` counter each
//! profile maintains, so one walk over profiles yields both tallies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::interfaces::PageCursor;
use crate::runtime::dao::DaoError;
use crate::runtime::dao::LeaderboardDao;
use crate::runtime::dao::Page;
use crate::runtime::dao::ProfileDao;

// ============================================================================
// SECTION: Counting
// ============================================================================

/// Counts every item a paginated listing yields.
///
/// `fetch` is called with the cursor of the previous page (`None` first) and
/// returns the next page; the walk ends when a page carries no cursor.
///
/// # Errors
/// Returns [`DaoError`] when a page cannot be fetched.
pub fn count_all<T>(
    mut fetch: impl FnMut(Option<PageCursor>) -> Result<Page<T>, DaoError>,
) -> Result<u64, DaoError> {
    let mut total = 0u64;
    let mut cursor = None;
    loop {
        let page = fetch(cursor)?;
        total += page.items.len() as u64;
        match page.next {
            Some(next) => cursor = Some(next),
            None => return Ok(total),
        }
    }
}

// ============================================================================
// SECTION: Fleet Metrics
// ============================================================================

/// Fleet-level tallies at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SystemMetrics {
    /// Registered profiles.
    pub profiles: u64,
    /// Models across all profiles, from the per-profile counters.
    pub models: u64,
    /// Leaderboards, open or closed.
    pub leaderboards: u64,
}

/// Tallies the fleet by walking the profile and leaderboard listings.
///
/// `batch_size` bounds each page fetch; `None` uses the default page size.
///
/// # Errors
/// Returns [`DaoError`] when a page cannot be fetched.
pub fn collect_system_metrics(
    profiles: &ProfileDao,
    leaderboards: &LeaderboardDao,
    batch_size: Option<usize>,
) -> Result<SystemMetrics, DaoError> {
    let mut metrics = SystemMetrics::default();
    let mut cursor = None;
    loop {
        let page = profiles.list(cursor, batch_size)?;
        metrics.profiles += page.items.len() as u64;
        for stored in &page.items {
            metrics.models += u64::from(stored.record.model_count);
        }
        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    metrics.leaderboards = count_all(|cursor| leaderboards.list_ids(cursor, batch_size))?;
    Ok(metrics)
}
