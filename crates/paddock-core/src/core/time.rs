// crates/paddock-core/src/core/time.rs
// ============================================================================
// Module: Paddock Time
// Description: Explicit timestamps, ISO-8601 rendering, and usage periods.
// Purpose: Keep core logic deterministic; hosts supply every now-value.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Core logic never reads the wall clock. Every operation that needs the
//! current time takes an explicit [`Timestamp`] supplied by the host, which
//! keeps admission, lifecycle, and reset behavior fully deterministic under
//! test. Timestamps render to a fixed-width ISO-8601 form so that
//! lexicographic ordering of rendered values matches chronological ordering,
//! which the ranged storage sort keys rely on.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fixed-width ISO-8601 rendering with millisecond precision.
///
/// The subsecond field is always three digits so rendered timestamps of equal
/// length compare lexicographically in chronological order.
const ISO8601_MILLIS: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors produced when converting or rendering timestamps.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    /// The timestamp lies outside the representable calendar range.
    #[error("timestamp {millis} ms is outside the representable range")]
    OutOfRange {
        /// Unix milliseconds of the rejected timestamp.
        millis: i64,
    },
    /// Rendering to ISO-8601 failed.
    #[error("failed to render timestamp: {0}")]
    Format(String),
    /// A usage period was constructed with an invalid month number.
    #[error("month must be in 1..=12 (got {month})")]
    InvalidMonth {
        /// The rejected month number.
        month: u8,
    },
}

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Point in time as milliseconds since the Unix epoch (UTC).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from Unix milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as Unix milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Renders the timestamp in fixed-width ISO-8601 (`2024-03-07T09:30:00.000Z`).
    ///
    /// # Errors
    /// Returns [`TimeError`] when the timestamp falls outside the calendar
    /// range supported by the rendering backend.
    pub fn to_iso8601(self) -> Result<String, TimeError> {
        let datetime = self.to_offset_datetime()?;
        datetime
            .format(&ISO8601_MILLIS)
            .map_err(|err| TimeError::Format(err.to_string()))
    }

    /// Converts to an [`OffsetDateTime`] in UTC.
    fn to_offset_datetime(self) -> Result<OffsetDateTime, TimeError> {
        let nanos = i128::from(self.0) * 1_000_000;
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map_err(|_| TimeError::OutOfRange { millis: self.0 })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// ============================================================================
// SECTION: Usage Period
// ============================================================================

/// Calendar month keying a system-wide usage record.
///
/// # Invariants
/// - `month` is always in `1..=12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UsagePeriod {
    /// Calendar year.
    year: i32,
    /// Calendar month, 1-based.
    month: u8,
}

impl UsagePeriod {
    /// Creates a usage period from a year and 1-based month.
    ///
    /// # Errors
    /// Returns [`TimeError::InvalidMonth`] when `month` is outside `1..=12`.
    pub const fn new(year: i32, month: u8) -> Result<Self, TimeError> {
        if month == 0 || month > 12 {
            return Err(TimeError::InvalidMonth { month });
        }
        Ok(Self { year, month })
    }

    /// Returns the period containing the given timestamp (UTC).
    ///
    /// # Errors
    /// Returns [`TimeError::OutOfRange`] when the timestamp is outside the
    /// representable calendar range.
    pub fn from_timestamp(at: Timestamp) -> Result<Self, TimeError> {
        let datetime = at.to_offset_datetime()?;
        Ok(Self { year: datetime.year(), month: u8::from(datetime.month()) })
    }

    /// Returns the calendar year.
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Returns the 1-based calendar month.
    #[must_use]
    pub const fn month(self) -> u8 {
        self.month
    }

    /// Returns the period immediately following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// Returns the zero-padded `<year>_<month>` key fragment (e.g. `2024_03`).
    #[must_use]
    pub fn label(self) -> String {
        format!("{:04}_{:02}", self.year, self.month)
    }
}

impl fmt::Display for UsagePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_fixed_width_iso8601() -> Result<(), TimeError> {
        // 2024-03-07T09:30:00.000Z
        let ts = Timestamp::from_unix_millis(1_709_804_200_000 + 33_800_000);
        let rendered = ts.to_iso8601()?;
        assert_eq!(rendered.len(), "2024-03-07T09:30:00.000Z".len());
        assert!(rendered.ends_with('Z'));
        Ok(())
    }

    #[test]
    fn iso8601_ordering_matches_chronological_ordering() -> Result<(), TimeError> {
        let earlier = Timestamp::from_unix_millis(1_700_000_000_123);
        let later = Timestamp::from_unix_millis(1_700_000_000_124);
        assert!(earlier.to_iso8601()? < later.to_iso8601()?);
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_timestamps() {
        let err = Timestamp::from_unix_millis(i64::MAX).to_iso8601();
        assert!(matches!(err, Err(TimeError::OutOfRange { .. })));
    }

    #[test]
    fn period_rolls_over_at_year_end() -> Result<(), TimeError> {
        let december = UsagePeriod::new(2024, 12)?;
        let january = december.next();
        assert_eq!(january.year(), 2025);
        assert_eq!(january.month(), 1);
        Ok(())
    }

    #[test]
    fn period_label_is_zero_padded() -> Result<(), TimeError> {
        assert_eq!(UsagePeriod::new(2024, 3)?.label(), "2024_03");
        assert_eq!(UsagePeriod::new(987, 11)?.label(), "0987_11");
        Ok(())
    }

    #[test]
    fn period_from_timestamp_uses_utc_calendar() -> Result<(), TimeError> {
        // 2024-03-07T09:30:00Z
        let ts = Timestamp::from_unix_millis(1_709_804_200_000);
        let period = UsagePeriod::from_timestamp(ts)?;
        assert_eq!(period.year(), 2024);
        assert_eq!(period.month(), 3);
        Ok(())
    }

    #[test]
    fn rejects_invalid_month() {
        assert!(matches!(UsagePeriod::new(2024, 0), Err(TimeError::InvalidMonth { month: 0 })));
        assert!(matches!(UsagePeriod::new(2024, 13), Err(TimeError::InvalidMonth { month: 13 })));
    }
}
