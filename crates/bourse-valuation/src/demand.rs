//! Demand multiplier derived from total shares outstanding.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValuationError;

/// How share demand scales the price.
///
/// The multiplier is `1 + shares * multiplier_per_share`, with the
/// increment optionally capped. It never drops below 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DemandCurveSpec")]
pub struct DemandCurve {
    multiplier_per_share: Decimal,
    cap: Option<Decimal>,
}

/// Unvalidated wire form of [`DemandCurve`].
#[derive(Debug, Clone, Copy, Deserialize)]
struct DemandCurveSpec {
    multiplier_per_share: Decimal,
    #[serde(default)]
    cap: Option<Decimal>,
}

impl TryFrom<DemandCurveSpec> for DemandCurve {
    type Error = ValuationError;

    fn try_from(spec: DemandCurveSpec) -> Result<Self, Self::Error> {
        Self::new(spec.multiplier_per_share, spec.cap)
    }
}

impl DemandCurve {
    /// Build a demand curve.
    ///
    /// # Errors
    ///
    /// Returns [`ValuationError::InvalidInput`] if the per-share rate or the
    /// cap is negative.
    pub fn new(multiplier_per_share: Decimal, cap: Option<Decimal>) -> Result<Self, ValuationError> {
        if multiplier_per_share.is_sign_negative() && !multiplier_per_share.is_zero() {
            return Err(ValuationError::invalid(format!(
                "demand multiplier_per_share {multiplier_per_share} must not be negative"
            )));
        }
        if let Some(cap) = cap.filter(|c| c.is_sign_negative() && !c.is_zero()) {
            return Err(ValuationError::invalid(format!(
                "demand cap {cap} must not be negative"
            )));
        }
        Ok(Self {
            multiplier_per_share,
            cap,
        })
    }

    /// A curve that always yields exactly 1.
    pub const fn flat() -> Self {
        Self {
            multiplier_per_share: Decimal::ZERO,
            cap: None,
        }
    }

    /// Increment per share held.
    pub const fn multiplier_per_share(&self) -> Decimal {
        self.multiplier_per_share
    }

    /// Upper bound on the multiplier's increment, if any.
    pub const fn cap(&self) -> Option<Decimal> {
        self.cap
    }

    /// Demand multiplier for `total_shares` outstanding.
    ///
    /// # Errors
    ///
    /// Returns [`ValuationError::Overflow`] if the product is unrepresentable.
    pub fn multiplier(&self, total_shares: u64) -> Result<Decimal, ValuationError> {
        if total_shares == 0 {
            return Ok(Decimal::ONE);
        }
        let growth = Decimal::from(total_shares)
            .checked_mul(self.multiplier_per_share)
            .ok_or(ValuationError::Overflow {
                context: "demand growth",
            })?;
        let growth = self.cap.map_or(growth, |cap| growth.min(cap));
        let multiplier = Decimal::ONE
            .checked_add(growth)
            .ok_or(ValuationError::Overflow {
                context: "demand multiplier",
            })?;
        Ok(multiplier.max(Decimal::ONE))
    }
}

impl Default for DemandCurve {
    fn default() -> Self {
        Self::flat()
    }
}
