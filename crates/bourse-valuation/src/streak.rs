//! Consecutive-day activity streak bonus.
//!
//! A streak is a run of consecutive UTC days, ending at the window's last
//! day, on which the entity met a minimum event count. The day containing
//! `as_of` is still in progress, so when it has not qualified yet the run
//! is counted from the day before instead of breaking.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValuationError;
use crate::window::{DailyBuckets, DayWindow};

/// Parameters of the streak bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StreakRuleSpec")]
pub struct StreakRule {
    min_daily_events: u64,
    bonus_percent_per_day: Decimal,
    max_bonus_percent: Decimal,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct StreakRuleSpec {
    #[serde(default = "default_min_daily_events")]
    min_daily_events: u64,
    bonus_percent_per_day: Decimal,
    max_bonus_percent: Decimal,
}

const fn default_min_daily_events() -> u64 {
    1
}

impl TryFrom<StreakRuleSpec> for StreakRule {
    type Error = ValuationError;

    fn try_from(spec: StreakRuleSpec) -> Result<Self, Self::Error> {
        Self::new(
            spec.min_daily_events,
            spec.bonus_percent_per_day,
            spec.max_bonus_percent,
        )
    }
}

impl StreakRule {
    /// Build a streak rule.
    ///
    /// # Errors
    ///
    /// Returns [`ValuationError::InvalidInput`] if `min_daily_events` is zero
    /// or either percentage is negative.
    pub fn new(
        min_daily_events: u64,
        bonus_percent_per_day: Decimal,
        max_bonus_percent: Decimal,
    ) -> Result<Self, ValuationError> {
        if min_daily_events == 0 {
            return Err(ValuationError::invalid(
                "streak min_daily_events must be at least 1",
            ));
        }
        for (field, value) in [
            ("bonus_percent_per_day", bonus_percent_per_day),
            ("max_bonus_percent", max_bonus_percent),
        ] {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(ValuationError::invalid(format!(
                    "streak {field} {value} must not be negative"
                )));
            }
        }
        Ok(Self {
            min_daily_events,
            bonus_percent_per_day,
            max_bonus_percent,
        })
    }

    /// Events a day needs to extend the streak.
    pub const fn min_daily_events(&self) -> u64 {
        self.min_daily_events
    }

    /// Length of the current streak in days, bounded by the window.
    pub fn streak_days(&self, buckets: &DailyBuckets, window: &DayWindow) -> u32 {
        let qualifies = |day| buckets.get(day) >= self.min_daily_events;

        let mut cursor = window.last_day();
        if !qualifies(cursor) {
            match cursor.pred_opt() {
                Some(previous) => cursor = previous,
                None => return 0,
            }
        }

        let mut days = 0_u32;
        while window.contains_day(cursor) && qualifies(cursor) {
            days = days.saturating_add(1);
            match cursor.pred_opt() {
                Some(previous) => cursor = previous,
                None => break,
            }
        }
        days
    }

    /// Price multiplier for the current streak.
    ///
    /// # Errors
    ///
    /// Returns [`ValuationError::Overflow`] if the bonus is unrepresentable.
    pub fn multiplier(
        &self,
        buckets: &DailyBuckets,
        window: &DayWindow,
    ) -> Result<Decimal, ValuationError> {
        let days = self.streak_days(buckets, window);
        let bonus = Decimal::from(days)
            .checked_mul(self.bonus_percent_per_day)
            .ok_or(ValuationError::Overflow {
                context: "streak bonus",
            })?
            .min(self.max_bonus_percent);
        bonus
            .checked_div(Decimal::ONE_HUNDRED)
            .and_then(|fraction| Decimal::ONE.checked_add(fraction))
            .ok_or(ValuationError::Overflow {
                context: "streak multiplier",
            })
    }
}
