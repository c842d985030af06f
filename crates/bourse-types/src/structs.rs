//! Core record types: ledger events, holdings, and valuation outputs.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::ActivityKind;
use crate::ids::{EntityId, EventId};

// ---------------------------------------------------------------------------
// Ledger records
// ---------------------------------------------------------------------------

/// A single timestamped action recorded in the activity ledger.
///
/// Events are created by upstream producers and never mutated. The
/// valuation engine only ever reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Unique event identifier.
    #[serde(default)]
    pub id: EventId,
    /// The entity that performed the action.
    pub entity_id: EntityId,
    /// When the action happened.
    pub timestamp: DateTime<Utc>,
    /// What kind of action it was.
    pub kind: ActivityKind,
}

/// Shares of one entity held by one holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareHolding {
    /// The entity whose stock is held.
    pub entity_id: EntityId,
    /// The member holding the shares.
    pub holder_id: EntityId,
    /// Number of shares held.
    pub shares: u64,
}

// ---------------------------------------------------------------------------
// Valuation outputs
// ---------------------------------------------------------------------------

/// A fully composed price for one entity at one instant under one regime.
///
/// Snapshots are pure functions of ledger state, regime, and `as_of`.
/// Requesting the same snapshot twice yields bit-identical values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// The valued entity.
    pub entity_id: EntityId,
    /// The evaluation instant.
    pub as_of: DateTime<Utc>,
    /// Base price of the regime.
    pub base_price: Decimal,
    /// Summed activity contribution in percent (19.0 means +19 %).
    pub activity_contribution_percent: Decimal,
    /// Demand multiplier, always >= 1.
    pub demand_multiplier: Decimal,
    /// Streak multiplier, exactly 1 when the regime has no streak rule.
    pub streak_multiplier: Decimal,
    /// Final price, rounded to the configured currency precision.
    pub final_price: Decimal,
    /// Name of the regime that produced this snapshot.
    pub regime: String,
}

/// Side-by-side evaluation of one entity under two regimes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeComparisonReport {
    /// The valued entity.
    pub entity_id: EntityId,
    /// The evaluation instant shared by both snapshots.
    pub as_of: DateTime<Utc>,
    /// Snapshot under the current regime.
    pub regime_a: PriceSnapshot,
    /// Snapshot under the candidate regime.
    pub regime_b: PriceSnapshot,
    /// `regime_b.final_price - regime_a.final_price`.
    pub delta: Decimal,
}

impl RegimeComparisonReport {
    /// Whether moving from regime A to regime B lowers this entity's price.
    pub fn is_regression(&self) -> bool {
        self.delta.is_sign_negative() && !self.delta.is_zero()
    }
}

/// Prediction of when a capped regime's ceiling stops binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapLiftForecast {
    /// The forecast entity.
    pub entity_id: EntityId,
    /// The evaluation instant.
    pub as_of: DateTime<Utc>,
    /// Activity events currently inside the window.
    pub current_count: u64,
    /// The hard-cap event threshold.
    pub threshold: u64,
    /// UTC date on which enough old events have expired, or `None` when
    /// the entity is not capped.
    pub lift_date: Option<NaiveDate>,
}

impl CapLiftForecast {
    /// Whether the cap currently binds.
    pub const fn is_capped(&self) -> bool {
        self.lift_date.is_some()
    }

    /// Whole days from the `as_of` date until the lift date.
    pub fn days_until_lift(&self) -> Option<i64> {
        self.lift_date
            .map(|date| date.signed_duration_since(self.as_of.date_naive()).num_days())
    }
}
