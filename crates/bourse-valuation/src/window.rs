//! Rolling window aggregation and the day-boundary convention.
//!
//! [`DayWindow`] is the only place calendar days are derived from instants.
//! Aggregation, streak counting, and cap-lift forecasting all go through it,
//! so the three can never disagree about which day an event belongs to or
//! when that day leaves the window.
//!
//! # Convention
//!
//! - Days are UTC calendar dates; a day starts at 00:00:00 UTC.
//! - A window of `W` days ending at `as_of` covers exactly `W` calendar
//!   days: `as_of`'s own date and the `W - 1` dates before it.
//! - An instant is in-window when it is at or after midnight of the first
//!   day and not after `as_of`. Events later than `as_of` are ignored.
//! - Day `D` drops out of the window on `D + W`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};

use bourse_types::{ActivityEvent, ActivityKind, EntityId};

use crate::error::ValuationError;

/// A midnight-aligned lookback window of whole UTC days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    as_of: DateTime<Utc>,
    window_days: u32,
    first_day: NaiveDate,
    start: DateTime<Utc>,
}

impl DayWindow {
    /// Build the window of `window_days` days ending at `as_of`.
    ///
    /// # Errors
    ///
    /// Returns [`ValuationError::InvalidInput`] if `window_days` is zero,
    /// or [`ValuationError::Overflow`] if the start date is unrepresentable.
    pub fn new(as_of: DateTime<Utc>, window_days: u32) -> Result<Self, ValuationError> {
        let lookback = window_days
            .checked_sub(1)
            .ok_or_else(|| ValuationError::invalid("window_days must be at least 1"))?;
        let first_day = Self::day_of(as_of)
            .checked_sub_days(Days::new(u64::from(lookback)))
            .ok_or(ValuationError::Overflow {
                context: "window start date",
            })?;
        let start = first_day.and_time(NaiveTime::MIN).and_utc();
        Ok(Self {
            as_of,
            window_days,
            first_day,
            start,
        })
    }

    /// The calendar day an instant belongs to.
    pub fn day_of(instant: DateTime<Utc>) -> NaiveDate {
        instant.date_naive()
    }

    /// The evaluation instant.
    pub const fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    /// Window length in days.
    pub const fn window_days(&self) -> u32 {
        self.window_days
    }

    /// Oldest day still inside the window.
    pub const fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    /// Newest day inside the window (the `as_of` date).
    pub fn last_day(&self) -> NaiveDate {
        Self::day_of(self.as_of)
    }

    /// Midnight UTC of [`first_day`](Self::first_day), the inclusive lower bound.
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Whether an instant falls inside the window.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.as_of
    }

    /// Whether a calendar day falls inside the window.
    pub fn contains_day(&self, day: NaiveDate) -> bool {
        day >= self.first_day && day <= self.last_day()
    }

    /// The date on which `day`'s events fall out of the window.
    ///
    /// # Errors
    ///
    /// Returns [`ValuationError::Overflow`] if the date is unrepresentable.
    pub fn expiry_date(&self, day: NaiveDate) -> Result<NaiveDate, ValuationError> {
        day.checked_add_days(Days::new(u64::from(self.window_days)))
            .ok_or(ValuationError::Overflow {
                context: "expiry date",
            })
    }
}

/// Sparse per-day event counts, oldest day first.
///
/// Days with zero events are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyBuckets {
    counts: BTreeMap<NaiveDate, u64>,
}

impl DailyBuckets {
    /// Create an empty set of buckets.
    pub const fn new() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }

    /// Build buckets from explicit `(day, count)` pairs.
    ///
    /// Repeated days are summed and zero counts dropped.
    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, u64)>,
    {
        let mut buckets = Self::new();
        for (day, count) in counts {
            buckets.add(day, count);
        }
        buckets
    }

    fn add(&mut self, day: NaiveDate, count: u64) {
        if count == 0 {
            return;
        }
        let slot = self.counts.entry(day).or_insert(0);
        *slot = slot.saturating_add(count);
    }

    /// Count for a single day (zero when absent).
    pub fn get(&self, day: NaiveDate) -> u64 {
        self.counts.get(&day).copied().unwrap_or(0)
    }

    /// Total events across all days.
    pub fn total(&self) -> u64 {
        self.counts.values().fold(0_u64, |acc, &n| acc.saturating_add(n))
    }

    /// Iterate `(day, count)` pairs from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (NaiveDate, u64)> + '_ {
        self.counts.iter().map(|(&day, &count)| (day, count))
    }

    /// Number of days with at least one event.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no day has any events.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Bucket an entity's activity events into per-day counts within `window`.
///
/// Events for other entities, of kinds outside `kinds`, or outside the
/// window are skipped. The result depends only on the arguments, so
/// re-querying the same ledger state at the same `as_of` is stable.
pub fn aggregate(
    events: &[ActivityEvent],
    entity_id: EntityId,
    window: &DayWindow,
    kinds: &BTreeSet<ActivityKind>,
) -> DailyBuckets {
    let mut buckets = DailyBuckets::new();
    for event in events {
        if event.entity_id != entity_id
            || !kinds.contains(&event.kind)
            || !window.contains(event.timestamp)
        {
            continue;
        }
        buckets.add(DayWindow::day_of(event.timestamp), 1);
    }
    buckets
}
