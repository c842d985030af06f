//! Error types for the valuation math.
//!
//! Every variant is a request-local failure: a bad input or a
//! configuration that only turns out to be degenerate when evaluated.
//! None of them carry state that could affect other entities.

/// Errors raised by the pure valuation functions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValuationError {
    /// A caller supplied a value outside the function's contract.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Explanation of what is wrong.
        reason: String,
    },

    /// A tier schedule failed validation.
    ///
    /// This is invalid input scoped to one named schedule; see
    /// [`ValuationError::is_invalid_input`].
    #[error("invalid tier schedule '{schedule}': {reason}")]
    InvalidSchedule {
        /// Name of the offending schedule.
        schedule: String,
        /// Explanation of what is wrong.
        reason: String,
    },

    /// A regime name did not resolve to a configured regime.
    #[error("unknown regime '{name}'")]
    UnknownRegime {
        /// The name that was looked up.
        name: String,
    },

    /// Decimal or integer arithmetic overflowed during evaluation.
    #[error("arithmetic overflow while computing {context}")]
    Overflow {
        /// What was being computed.
        context: &'static str,
    },
}

impl ValuationError {
    /// Shorthand for [`ValuationError::InvalidInput`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
    /// Whether the request was rejected for bad parameters rather than
    /// failing during evaluation.
    ///
    /// Malformed schedules and unknown regime names are invalid input too.
    pub const fn is_invalid_input(&self) -> bool {
        match self {
            Self::InvalidInput { .. }
            | Self::InvalidSchedule { .. }
            | Self::UnknownRegime { .. } => true,
            Self::Overflow { .. } => false,
        }
    }
}
