//! Tier schedules and the tier contribution calculator.
//!
//! A [`TierSchedule`] converts an event count into a percentage
//! contribution. Tiers are consumed in order: each absorbs up to
//! `up_to - previous_up_to` events at its own rate and passes the rest
//! down; the unbounded final tier absorbs whatever remains.
//!
//! The [`ScoringBasis`] decides what count the calculator sees:
//!
//! - [`ScoringBasis::Daily`] scores each day's bucket and sums the results,
//!   so diminishing returns reset every day.
//! - [`ScoringBasis::Window`] scores the whole window's total once. A single
//!   tier followed by a zero final rate then acts as a hard cap on the
//!   window, which is how the capped-linear regime is expressed.
//!
//! Rates are percent per event: `0.5` means each event adds half a percent.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValuationError;
use crate::window::DailyBuckets;

/// One bounded rate band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    /// Cumulative event count at which this tier ends (exclusive of later tiers).
    pub up_to: u64,
    /// Contribution per event inside this tier, in percent.
    pub rate_percent: Decimal,
}

impl Tier {
    /// Convenience constructor.
    pub const fn new(up_to: u64, rate_percent: Decimal) -> Self {
        Self {
            up_to,
            rate_percent,
        }
    }
}

/// What event count a schedule is applied to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringBasis {
    /// Score each day separately and sum.
    #[default]
    Daily,
    /// Score the window total once.
    Window,
}

/// A validated, named tier schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierSchedule {
    name: String,
    tiers: Vec<Tier>,
    final_rate_percent: Decimal,
    basis: ScoringBasis,
    max_contribution_percent: Option<Decimal>,
}

impl TierSchedule {
    /// Build a daily-basis schedule from bounded tiers and a final rate.
    ///
    /// # Errors
    ///
    /// Returns [`ValuationError::InvalidSchedule`] if the name is empty, a
    /// threshold is zero or not strictly greater than the previous one, or
    /// any rate is negative.
    pub fn new(
        name: impl Into<String>,
        tiers: Vec<Tier>,
        final_rate_percent: Decimal,
    ) -> Result<Self, ValuationError> {
        let name = name.into();
        let reject = |reason: String| ValuationError::InvalidSchedule {
            schedule: name.clone(),
            reason,
        };

        if name.trim().is_empty() {
            return Err(reject("schedule name must not be empty".to_owned()));
        }

        let mut previous = 0_u64;
        for (index, tier) in tiers.iter().enumerate() {
            if tier.up_to <= previous {
                return Err(reject(format!(
                    "tier {index} threshold {} must be greater than {previous}",
                    tier.up_to
                )));
            }
            if tier.rate_percent.is_sign_negative() && !tier.rate_percent.is_zero() {
                return Err(reject(format!(
                    "tier {index} rate {} must not be negative",
                    tier.rate_percent
                )));
            }
            previous = tier.up_to;
        }

        if final_rate_percent.is_sign_negative() && !final_rate_percent.is_zero() {
            return Err(reject(format!(
                "final rate {final_rate_percent} must not be negative"
            )));
        }

        Ok(Self {
            name,
            tiers,
            final_rate_percent,
            basis: ScoringBasis::Daily,
            max_contribution_percent: None,
        })
    }

    /// Set the scoring basis.
    #[must_use]
    pub const fn with_basis(mut self, basis: ScoringBasis) -> Self {
        self.basis = basis;
        self
    }

    /// Clamp the total window contribution to `max_percent`.
    ///
    /// # Errors
    ///
    /// Returns [`ValuationError::InvalidSchedule`] if `max_percent` is negative.
    pub fn with_max_contribution(mut self, max_percent: Decimal) -> Result<Self, ValuationError> {
        if max_percent.is_sign_negative() && !max_percent.is_zero() {
            return Err(ValuationError::InvalidSchedule {
                schedule: self.name,
                reason: format!("max contribution {max_percent} must not be negative"),
            });
        }
        self.max_contribution_percent = Some(max_percent);
        Ok(self)
    }

    /// Schedule name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bounded tiers in application order.
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Rate of the unbounded final tier.
    pub const fn final_rate_percent(&self) -> Decimal {
        self.final_rate_percent
    }

    /// Scoring basis.
    pub const fn basis(&self) -> ScoringBasis {
        self.basis
    }

    /// Optional ceiling on the window contribution.
    pub const fn max_contribution_percent(&self) -> Option<Decimal> {
        self.max_contribution_percent
    }

    /// Contribution of `count` events, in percent.
    ///
    /// Returns zero for zero events.
    ///
    /// # Errors
    ///
    /// Returns [`ValuationError::InvalidInput`] if `count` is negative, or
    /// [`ValuationError::Overflow`] if the result is unrepresentable.
    pub fn tier_contribution(&self, count: i64) -> Result<Decimal, ValuationError> {
        let count = u64::try_from(count).map_err(|_err| {
            ValuationError::invalid(format!("event count must be non-negative, got {count}"))
        })?;
        self.contribution_for(count)
    }

    /// Contribution of a non-negative event count, in percent.
    ///
    /// # Errors
    ///
    /// Returns [`ValuationError::Overflow`] if the result is unrepresentable.
    pub fn contribution_for(&self, count: u64) -> Result<Decimal, ValuationError> {
        let mut remaining = count;
        let mut floor = 0_u64;
        let mut total = Decimal::ZERO;

        for tier in &self.tiers {
            if remaining == 0 {
                break;
            }
            let width = tier.up_to.checked_sub(floor).ok_or(ValuationError::Overflow {
                context: "tier width",
            })?;
            let absorbed = remaining.min(width);
            total = add_units(total, absorbed, tier.rate_percent)?;
            remaining = remaining.saturating_sub(absorbed);
            floor = tier.up_to;
        }

        if remaining > 0 {
            total = add_units(total, remaining, self.final_rate_percent)?;
        }

        Ok(total)
    }

    /// Total contribution of a window's buckets under this schedule's basis,
    /// clamped to the configured maximum.
    ///
    /// # Errors
    ///
    /// Returns [`ValuationError::Overflow`] if the sum is unrepresentable.
    pub fn activity_contribution(&self, buckets: &DailyBuckets) -> Result<Decimal, ValuationError> {
        let raw = match self.basis {
            ScoringBasis::Daily => buckets.iter().try_fold(Decimal::ZERO, |acc, (_, count)| {
                acc.checked_add(self.contribution_for(count)?)
                    .ok_or(ValuationError::Overflow {
                        context: "daily contribution sum",
                    })
            })?,
            ScoringBasis::Window => self.contribution_for(buckets.total())?,
        };
        Ok(self
            .max_contribution_percent
            .map_or(raw, |max| raw.min(max)))
    }

    /// The in-window event count past which this schedule adds nothing.
    ///
    /// Only window-basis schedules whose final rate is zero have one: it is
    /// the threshold of the last tier with a positive rate. This is the hard
    /// cap `T` the cap-lift forecaster works against.
    pub fn saturation_threshold(&self) -> Option<u64> {
        if self.basis != ScoringBasis::Window || !self.final_rate_percent.is_zero() {
            return None;
        }
        self.tiers
            .iter()
            .rev()
            .find(|tier| tier.rate_percent > Decimal::ZERO)
            .map(|tier| tier.up_to)
    }
}

/// `total + units * rate`, checked.
fn add_units(total: Decimal, units: u64, rate: Decimal) -> Result<Decimal, ValuationError> {
    Decimal::from(units)
        .checked_mul(rate)
        .and_then(|part| total.checked_add(part))
        .ok_or(ValuationError::Overflow {
            context: "tier contribution",
        })
}
