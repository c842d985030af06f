//! Error types for the data layer.
//!
//! Pool setup and migrations report [`DbError`]. Reads made through the
//! ledger traits report [`LedgerReadError`] instead, so the valuation
//! service sees one error type regardless of backend; [`unavailable`]
//! performs that mapping.

use bourse_ledger::LedgerReadError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A value could not be stored in its column.
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Map a driver error on the read path to a transient ledger failure.
pub fn unavailable(e: sqlx::Error) -> LedgerReadError {
    LedgerReadError::Unavailable {
        message: e.to_string(),
    }
}
