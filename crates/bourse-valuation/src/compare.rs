//! Side-by-side regime evaluation for migration auditing.
//!
//! Before a new regime is activated, every entity is priced under both the
//! current and the candidate regime over identical buckets and share
//! counts. [`MigrationAudit`] folds those per-entity reports into the
//! numbers an operator needs to decide whether the switch is acceptable.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bourse_types::{EntityId, RegimeComparisonReport};

use crate::error::ValuationError;
use crate::regime::Regime;
use crate::window::{DailyBuckets, DayWindow};

/// Price one entity under two regimes over the same history.
///
/// # Errors
///
/// Returns [`ValuationError`] if either evaluation fails.
pub fn compare_regimes(
    entity_id: EntityId,
    buckets: &DailyBuckets,
    window: &DayWindow,
    total_shares: u64,
    regime_a: &Regime,
    regime_b: &Regime,
    currency_decimals: u32,
) -> Result<RegimeComparisonReport, ValuationError> {
    let a = regime_a.evaluate(entity_id, buckets, window, total_shares, currency_decimals)?;
    let b = regime_b.evaluate(entity_id, buckets, window, total_shares, currency_decimals)?;
    let delta = b
        .final_price
        .checked_sub(a.final_price)
        .ok_or(ValuationError::Overflow {
            context: "regime delta",
        })?;
    Ok(RegimeComparisonReport {
        entity_id,
        as_of: window.as_of(),
        regime_a: a,
        regime_b: b,
        delta,
    })
}

/// Aggregate outcome of comparing two regimes across many entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationAudit {
    /// Current regime name.
    pub from: String,
    /// Candidate regime name.
    pub to: String,
    /// Number of entities compared.
    pub compared: usize,
    /// Entities whose price would drop.
    pub regressions: Vec<EntityId>,
    /// The most negative delta seen (zero when nobody loses).
    pub worst_delta: Decimal,
    /// The entity with the worst delta, if any regressed.
    pub worst_entity: Option<EntityId>,
    /// Sum of all deltas.
    pub net_delta: Decimal,
}

impl MigrationAudit {
    /// Fold comparison reports into an audit.
    ///
    /// # Errors
    ///
    /// Returns [`ValuationError::Overflow`] if the delta sum is unrepresentable.
    pub fn from_reports<'a, I>(from: &str, to: &str, reports: I) -> Result<Self, ValuationError>
    where
        I: IntoIterator<Item = &'a RegimeComparisonReport>,
    {
        let mut audit = Self {
            from: from.to_owned(),
            to: to.to_owned(),
            compared: 0,
            regressions: Vec::new(),
            worst_delta: Decimal::ZERO,
            worst_entity: None,
            net_delta: Decimal::ZERO,
        };

        for report in reports {
            audit.compared = audit.compared.saturating_add(1);
            audit.net_delta =
                audit
                    .net_delta
                    .checked_add(report.delta)
                    .ok_or(ValuationError::Overflow {
                        context: "audit net delta",
                    })?;
            if report.is_regression() {
                audit.regressions.push(report.entity_id);
                if report.delta < audit.worst_delta {
                    audit.worst_delta = report.delta;
                    audit.worst_entity = Some(report.entity_id);
                }
            }
        }

        Ok(audit)
    }

    /// Whether no entity loses value under the candidate regime.
    pub fn is_monotonic(&self) -> bool {
        self.regressions.is_empty()
    }
}
