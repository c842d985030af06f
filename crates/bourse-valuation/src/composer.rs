//! Final price composition.
//!
//! ```text
//! final = base * (1 + activity% / 100) * demand * streak
//! ```
//!
//! Every intermediate stays at full [`Decimal`] precision. Rounding to the
//! currency precision happens once, on the final value.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ValuationError;

/// Default number of decimal places prices are rounded to.
pub const DEFAULT_CURRENCY_DECIMALS: u32 = 2;

/// Largest supported currency precision.
pub const MAX_CURRENCY_DECIMALS: u32 = 8;

/// The factors a price is composed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceInputs {
    /// Regime base price.
    pub base_price: Decimal,
    /// Summed activity contribution, in percent.
    pub activity_percent: Decimal,
    /// Demand multiplier (>= 1).
    pub demand_multiplier: Decimal,
    /// Streak multiplier (1 when no streak rule applies).
    pub streak_multiplier: Decimal,
}

/// Compose the final price and round it to `currency_decimals` places.
///
/// # Errors
///
/// Returns [`ValuationError::InvalidInput`] if `currency_decimals` exceeds
/// [`MAX_CURRENCY_DECIMALS`], or [`ValuationError::Overflow`] if any product
/// is unrepresentable.
pub fn compose(inputs: &PriceInputs, currency_decimals: u32) -> Result<Decimal, ValuationError> {
    if currency_decimals > MAX_CURRENCY_DECIMALS {
        return Err(ValuationError::invalid(format!(
            "currency_decimals {currency_decimals} exceeds {MAX_CURRENCY_DECIMALS}"
        )));
    }

    let activity_factor = inputs
        .activity_percent
        .checked_div(Decimal::ONE_HUNDRED)
        .and_then(|fraction| Decimal::ONE.checked_add(fraction))
        .ok_or(ValuationError::Overflow {
            context: "activity factor",
        })?;

    let unrounded = inputs
        .base_price
        .checked_mul(activity_factor)
        .and_then(|v| v.checked_mul(inputs.demand_multiplier))
        .and_then(|v| v.checked_mul(inputs.streak_multiplier))
        .ok_or(ValuationError::Overflow {
            context: "final price",
        })?;

    Ok(unrounded.round_dp_with_strategy(currency_decimals, RoundingStrategy::MidpointAwayFromZero))
}
