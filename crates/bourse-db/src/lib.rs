//! `PostgreSQL` data layer for the Bourse valuation engine.
//!
//! The engine never owns the activity ledger; upstream producers write it.
//! This crate provides the read side: a connection pool, the schema
//! migrations the engine expects, and [`PgLedger`], an implementation of
//! the `bourse-ledger` read traits.
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`activity_store`] -- [`PgLedger`], snapshot-consistent ledger reads
//! - [`error`] -- Shared error types

pub mod activity_store;
pub mod error;
pub mod postgres;

// Re-export primary types for convenience.
pub use activity_store::{ActivityEventRow, PgLedger};
pub use error::DbError;
pub use postgres::{PostgresConfig, PostgresPool};
