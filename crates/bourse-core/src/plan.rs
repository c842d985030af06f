//! The validated, immutable configuration a valuation runs against.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use bourse_types::ActivityKind;
use bourse_valuation::{Regime, ValuationError};

/// Everything one valuation needs from configuration.
///
/// Built by [`BourseConfig::plan`](crate::config::BourseConfig::plan) and
/// shared behind an `Arc` by the [`RegimeRegistry`](crate::registry::RegimeRegistry).
/// A request clones the `Arc` once and uses that plan to completion, so a
/// concurrent reload never changes parameters mid-computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuationPlan {
    /// Rolling window length in calendar days.
    pub window_days: u32,
    /// Decimal places final prices are rounded to.
    pub currency_decimals: u32,
    /// Event kinds that count toward activity.
    pub activity_kinds: BTreeSet<ActivityKind>,
    /// Name of the regime used for published prices.
    pub active_regime: String,
    /// All configured regimes by name.
    pub regimes: BTreeMap<String, Regime>,
    /// Upper bound on one ledger read.
    pub read_timeout: Duration,
    /// Maximum entities valued concurrently in a batch.
    pub max_concurrency: usize,
}

impl ValuationPlan {
    /// Look up a regime by name.
    ///
    /// # Errors
    ///
    /// Returns [`ValuationError::UnknownRegime`] if no regime has that name.
    pub fn regime(&self, name: &str) -> Result<&Regime, ValuationError> {
        self.regimes
            .get(name)
            .ok_or_else(|| ValuationError::UnknownRegime {
                name: name.to_owned(),
            })
    }

    /// The active regime.
    ///
    /// # Errors
    ///
    /// Returns [`ValuationError::UnknownRegime`] if the plan was assembled by
    /// hand with a dangling `active_regime`.
    pub fn active(&self) -> Result<&Regime, ValuationError> {
        self.regime(&self.active_regime)
    }

    /// Regime names in sorted order.
    pub fn regime_names(&self) -> impl Iterator<Item = &str> {
        self.regimes.keys().map(String::as_str)
    }
}
