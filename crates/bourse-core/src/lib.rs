//! Configuration, regime registry, and valuation services for Bourse.
//!
//! This crate wires the pure math in `bourse-valuation` to a ledger. It
//! owns everything with state or I/O: loading configuration, holding the
//! active plan, bounding ledger reads, and fanning a revaluation pass out
//! over every tracked entity.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `bourse-config.yaml` into
//!   strongly-typed structs.
//! - [`plan`] -- [`ValuationPlan`], the validated configuration snapshot.
//! - [`registry`] -- [`RegimeRegistry`], hot-swappable plan holder.
//! - [`valuator`] -- [`Valuator`], single-entity pricing, comparison,
//!   audits, and cap-lift forecasts.
//! - [`batch`] -- [`revalue_all`] with [`BatchControl`] cancellation.
//! - [`board`] -- [`SnapshotBoard`], latest published price per entity.
//! - [`error`] -- [`EngineError`].

pub mod batch;
pub mod board;
pub mod config;
pub mod error;
pub mod plan;
pub mod registry;
pub mod valuator;

pub use batch::{BatchControl, BatchReport, EntityFailure, revalue_all};
pub use board::{PublishOutcome, SnapshotBoard};
pub use config::{BourseConfig, ConfigError, LogFormat};
pub use error::EngineError;
pub use plan::ValuationPlan;
pub use registry::RegimeRegistry;
pub use valuator::{EntityHistory, Valuator};
