//! Activity-weighted valuation math for the Bourse engine.
//!
//! Everything in this crate is a pure function of its arguments: no I/O,
//! no clocks, no shared state. Callers fetch events and share counts, fix
//! an `as_of` instant, and hand the data in.
//!
//! # Pipeline
//!
//! ```text
//! events --aggregate--> DailyBuckets --TierSchedule--> activity %
//! total shares --DemandCurve--> demand multiplier
//! DailyBuckets --StreakRule--> streak multiplier
//! base * (1 + activity%/100) * demand * streak --compose--> final price
//! ```
//!
//! # Architecture
//!
//! - [`window`] -- [`DayWindow`] and [`DailyBuckets`], the rolling window
//!   and its per-UTC-day event counts.
//! - [`tiers`] -- [`TierSchedule`], the diminishing-returns calculator.
//! - [`demand`] -- [`DemandCurve`], the share-count multiplier.
//! - [`streak`] -- [`StreakRule`], the consecutive-day bonus.
//! - [`composer`] -- Final price composition and rounding.
//! - [`regime`] -- [`Regime`], a named bundle of all of the above.
//! - [`compare`] -- Side-by-side regime reports and [`MigrationAudit`].
//! - [`forecast`] -- Cap-lift date prediction.

pub mod compare;
pub mod composer;
pub mod demand;
pub mod error;
pub mod forecast;
pub mod regime;
pub mod streak;
pub mod tiers;
pub mod window;

// Re-export primary types at crate root.
pub use compare::{MigrationAudit, compare_regimes};
pub use composer::{DEFAULT_CURRENCY_DECIMALS, MAX_CURRENCY_DECIMALS, PriceInputs, compose};
pub use demand::DemandCurve;
pub use error::ValuationError;
pub use forecast::forecast_cap_lift;
pub use regime::Regime;
pub use streak::StreakRule;
pub use tiers::{ScoringBasis, Tier, TierSchedule};
pub use window::{DailyBuckets, DayWindow, aggregate};
