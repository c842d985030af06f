//! Named valuation regimes.
//!
//! A [`Regime`] bundles everything that defines one version of the price
//! formula. Two regimes evaluated over the same buckets differ only in
//! their parameters, never in code path.

use rust_decimal::Decimal;
use tracing::trace;

use bourse_types::{EntityId, PriceSnapshot};

use crate::composer::{self, PriceInputs};
use crate::demand::DemandCurve;
use crate::error::ValuationError;
use crate::streak::StreakRule;
use crate::tiers::TierSchedule;
use crate::window::{DailyBuckets, DayWindow};

/// A complete, named price formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regime {
    name: String,
    schedule: TierSchedule,
    demand: DemandCurve,
    base_price: Decimal,
    streak: Option<StreakRule>,
}

impl Regime {
    /// Build a regime without a streak bonus.
    ///
    /// # Errors
    ///
    /// Returns [`ValuationError::InvalidInput`] if the name is empty or the
    /// base price is not strictly positive.
    pub fn new(
        name: impl Into<String>,
        schedule: TierSchedule,
        demand: DemandCurve,
        base_price: Decimal,
    ) -> Result<Self, ValuationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValuationError::invalid("regime name must not be empty"));
        }
        if base_price <= Decimal::ZERO {
            return Err(ValuationError::invalid(format!(
                "regime '{name}' base_price {base_price} must be positive"
            )));
        }
        Ok(Self {
            name,
            schedule,
            demand,
            base_price,
            streak: None,
        })
    }

    /// Attach a streak bonus rule.
    #[must_use]
    pub const fn with_streak(mut self, rule: StreakRule) -> Self {
        self.streak = Some(rule);
        self
    }

    /// Regime name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tier schedule.
    pub const fn schedule(&self) -> &TierSchedule {
        &self.schedule
    }

    /// Demand curve.
    pub const fn demand(&self) -> &DemandCurve {
        &self.demand
    }

    /// Base price.
    pub const fn base_price(&self) -> Decimal {
        self.base_price
    }

    /// Streak rule, if any.
    pub const fn streak(&self) -> Option<&StreakRule> {
        self.streak.as_ref()
    }

    /// Compose a price snapshot from pre-aggregated history.
    ///
    /// # Errors
    ///
    /// Returns [`ValuationError`] if any factor overflows or the currency
    /// precision is out of range.
    pub fn evaluate(
        &self,
        entity_id: EntityId,
        buckets: &DailyBuckets,
        window: &DayWindow,
        total_shares: u64,
        currency_decimals: u32,
    ) -> Result<PriceSnapshot, ValuationError> {
        let activity_percent = self.schedule.activity_contribution(buckets)?;
        let demand_multiplier = self.demand.multiplier(total_shares)?;
        let streak_multiplier = match &self.streak {
            Some(rule) => rule.multiplier(buckets, window)?,
            None => Decimal::ONE,
        };

        let final_price = composer::compose(
            &PriceInputs {
                base_price: self.base_price,
                activity_percent,
                demand_multiplier,
                streak_multiplier,
            },
            currency_decimals,
        )?;

        trace!(
            regime = %self.name,
            entity = %entity_id,
            %activity_percent,
            %demand_multiplier,
            %streak_multiplier,
            %final_price,
            "Regime evaluated"
        );

        Ok(PriceSnapshot {
            entity_id,
            as_of: window.as_of(),
            base_price: self.base_price,
            activity_contribution_percent: activity_percent,
            demand_multiplier,
            streak_multiplier,
            final_price,
            regime: self.name.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::tiers::Tier;

    fn tiered() -> Regime {
        let schedule = TierSchedule::new(
            "tiered",
            vec![
                Tier::new(20, dec!(0.5)),
                Tier::new(50, dec!(0.25)),
                Tier::new(100, dec!(0.15)),
            ],
            dec!(0.05),
        )
        .unwrap();
        let demand = DemandCurve::new(dec!(0.003), Some(dec!(0.30))).unwrap();
        Regime::new("tiered", schedule, demand, dec!(100)).unwrap()
    }

    fn window() -> DayWindow {
        let as_of = Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).single().unwrap();
        DayWindow::new(as_of, 7).unwrap()
    }

    #[test]
    fn end_to_end_price() {
        let day = NaiveDate::from_ymd_opt(2025, 5, 19).unwrap();
        let buckets = DailyBuckets::from_counts([(day, 60)]);
        let snapshot = tiered()
            .evaluate(EntityId(3), &buckets, &window(), 100, 2)
            .unwrap();
        assert_eq!(snapshot.activity_contribution_percent, dec!(19.0));
        assert_eq!(snapshot.demand_multiplier, dec!(1.30));
        assert_eq!(snapshot.streak_multiplier, Decimal::ONE);
        assert_eq!(snapshot.final_price, dec!(154.70));
        assert_eq!(snapshot.regime, "tiered");
        assert_eq!(snapshot.as_of, window().as_of());
    }

    #[test]
    fn empty_history_prices_at_base_times_demand() {
        let snapshot = tiered()
            .evaluate(EntityId(3), &DailyBuckets::new(), &window(), 50, 2)
            .unwrap();
        assert_eq!(snapshot.final_price, dec!(115.00));
    }

    #[test]
    fn streak_rule_feeds_the_snapshot() {
        let rule = StreakRule::new(1, dec!(2), dec!(10)).unwrap();
        let regime = tiered().with_streak(rule);
        let buckets = DailyBuckets::from_counts([
            (NaiveDate::from_ymd_opt(2025, 5, 19).unwrap(), 1),
            (NaiveDate::from_ymd_opt(2025, 5, 20).unwrap(), 1),
        ]);
        let snapshot = regime
            .evaluate(EntityId(3), &buckets, &window(), 0, 2)
            .unwrap();
        assert_eq!(snapshot.streak_multiplier, dec!(1.04));
        // 100 * 1.01 * 1 * 1.04
        assert_eq!(snapshot.final_price, dec!(105.04));
    }

    #[test]
    fn base_price_must_be_positive() {
        let schedule = TierSchedule::new("s", Vec::new(), Decimal::ZERO).unwrap();
        let result = Regime::new("zero", schedule, DemandCurve::flat(), Decimal::ZERO);
        assert!(matches!(result, Err(ValuationError::InvalidInput { .. })));
    }
}
