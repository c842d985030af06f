//! Error types for the valuation service layer.

use bourse_ledger::LedgerReadError;
use bourse_types::EntityId;
use bourse_valuation::ValuationError;

use crate::config::ConfigError;

/// Errors returned by [`Valuator`](crate::valuator::Valuator) and batch
/// revaluation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The valuation math rejected its inputs or overflowed.
    #[error("valuation failed: {source}")]
    Valuation {
        /// The underlying valuation error.
        #[from]
        source: ValuationError,
    },

    /// The ledger or holdings read failed.
    #[error("ledger read for entity {entity_id} failed: {source}")]
    LedgerUnavailable {
        /// Entity being valued.
        entity_id: EntityId,
        /// The underlying read error.
        source: LedgerReadError,
    },

    /// Listing tracked entities failed.
    #[error("listing tracked entities failed: {source}")]
    Entities {
        /// The underlying read error.
        source: LedgerReadError,
    },

    /// The ledger read did not finish within the configured timeout.
    #[error("ledger read for entity {entity_id} timed out after {timeout_ms}ms")]
    Timeout {
        /// Entity being valued.
        entity_id: EntityId,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// Listing tracked entities did not finish within the configured timeout.
    #[error("listing tracked entities timed out after {timeout_ms}ms")]
    EntitiesTimeout {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Whether retrying the same request later may succeed.
    ///
    /// Timeouts and transient ledger failures are retryable. Bad inputs,
    /// bad configuration, and corrupt data are not.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::EntitiesTimeout { .. } => true,
            Self::LedgerUnavailable { source, .. } | Self::Entities { source } => {
                source.is_transient()
            }
            Self::Valuation { .. } | Self::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_outages_are_retryable() {
        let timeout = EngineError::Timeout {
            entity_id: EntityId(1),
            timeout_ms: 10,
        };
        assert!(timeout.is_retryable());

        let outage = EngineError::LedgerUnavailable {
            entity_id: EntityId(1),
            source: LedgerReadError::Unavailable {
                message: "connection refused".to_owned(),
            },
        };
        assert!(outage.is_retryable());

        let listing = EngineError::EntitiesTimeout { timeout_ms: 10 };
        assert!(listing.is_retryable());
    }

    #[test]
    fn bad_input_and_corruption_are_not_retryable() {
        let invalid = EngineError::from(ValuationError::invalid("negative"));
        assert!(!invalid.is_retryable());

        let corrupt = EngineError::LedgerUnavailable {
            entity_id: EntityId(1),
            source: LedgerReadError::Corrupt {
                message: "negative shares".to_owned(),
            },
        };
        assert!(!corrupt.is_retryable());
    }
}
