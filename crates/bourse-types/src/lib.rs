//! Shared type definitions for the Bourse valuation workspace.
//!
//! This crate is the single source of truth for the records that cross
//! crate boundaries: ledger events read by the engine, and the snapshots
//! and reports the engine produces.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifiers for entities and events
//! - [`enums`] -- Activity kinds
//! - [`structs`] -- Events, holdings, price snapshots, and analysis reports

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{ActivityKind, UnknownActivityKind};
pub use ids::{EntityId, EventId};
pub use structs::{
    ActivityEvent, CapLiftForecast, PriceSnapshot, RegimeComparisonReport, ShareHolding,
};
