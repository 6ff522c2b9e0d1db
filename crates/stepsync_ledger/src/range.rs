//! Half-open time windows.

use crate::error::{LedgerError, LedgerResult};
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// A half-open time window `[start, end)`.
///
/// # Invariants
///
/// - `start < end`; empty and inverted windows cannot be constructed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateRange {
    /// Creates a new range.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRange`] if `start >= end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> LedgerResult<Self> {
        if start >= end {
            return Err(LedgerError::InvalidRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Returns the inclusive start.
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Returns the exclusive end.
    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Returns the length of the window.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Returns the temporal midpoint.
    #[must_use]
    pub fn midpoint(&self) -> DateTime<Utc> {
        self.start + self.duration() / 2
    }

    /// Returns true if `instant` lies inside the window.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Returns the overlap of two windows, if any.
    #[must_use]
    pub fn intersection(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(DateRange { start, end })
    }

    /// Splits the window at `at`.
    ///
    /// Returns `None` when `at` is not strictly inside the window, since one
    /// of the halves would be empty.
    #[must_use]
    pub fn split_at(&self, at: DateTime<Utc>) -> Option<(DateRange, DateRange)> {
        if at <= self.start || at >= self.end {
            return None;
        }
        Some((
            DateRange {
                start: self.start,
                end: at,
            },
            DateRange {
                start: at,
                end: self.end,
            },
        ))
    }

    /// Cuts the window into consecutive buckets of `interval`.
    ///
    /// The last bucket is truncated at `end`. A non-positive interval yields
    /// the window itself as the only bucket.
    #[must_use]
    pub fn buckets(&self, interval: Duration) -> Vec<DateRange> {
        if interval <= Duration::zero() {
            return vec![*self];
        }

        let mut buckets = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let next = (cursor + interval).min(self.end);
            buckets.push(DateRange {
                start: cursor,
                end: next,
            });
            cursor = next;
        }
        buckets
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}
