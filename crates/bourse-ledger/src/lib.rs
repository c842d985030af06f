//! Activity ledger read interfaces for the Bourse valuation engine.
//!
//! The activity ledger is an append-only record of every timestamped action
//! a tracked member performs. It is owned by upstream producers; the
//! valuation engine only ever reads it, together with the holdings book
//! that tells it how many shares of each member are outstanding.
//!
//! # Architecture
//!
//! - [`reader`] -- The [`ActivityLedger`], [`HoldingsReader`], and
//!   [`LedgerSource`] traits plus the [`EventQuery`] they accept.
//! - [`ledger`] -- [`InMemoryLedger`], the embedded implementation used by
//!   tests and by the offline CLI.
//!
//! A `PostgreSQL` implementation lives in `bourse-db`.
//!
//! # Usage
//!
//! ```
//! use std::collections::BTreeSet;
//!
//! use bourse_ledger::{EventQuery, InMemoryLedger, LedgerSource};
//! use bourse_types::{ActivityEvent, ActivityKind, EntityId, EventId};
//! use chrono::{TimeZone, Utc};
//!
//! # tokio::runtime::Builder::new_current_thread().build().map(|rt| rt.block_on(async {
//! let ledger = InMemoryLedger::new();
//! let at = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).single().unwrap_or_default();
//! ledger
//!     .append(ActivityEvent {
//!         id: EventId::new(),
//!         entity_id: EntityId(1),
//!         timestamp: at,
//!         kind: ActivityKind::Message,
//!     })
//!     .await;
//!
//! let view = ledger
//!     .read_view(&EventQuery {
//!         entity_id: EntityId(1),
//!         since: at,
//!         until: at,
//!         kinds: BTreeSet::from([ActivityKind::Message]),
//!     })
//!     .await;
//! assert_eq!(view.map(|v| v.events.len()).ok(), Some(1));
//! # })).ok();
//! ```

pub mod ledger;
pub mod reader;

// Re-export primary types at crate root.
pub use ledger::{InMemoryLedger, LedgerFixture};
pub use reader::{ActivityLedger, EventQuery, HoldingsReader, LedgerSource, LedgerView};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when reading the ledger or holdings.
#[derive(Debug, thiserror::Error)]
pub enum LedgerReadError {
    /// The backing store could not be reached or the query failed.
    #[error("ledger unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// The store returned data that violates a ledger invariant.
    #[error("ledger data is corrupt: {message}")]
    Corrupt {
        /// Description of the violation.
        message: String,
    },

    /// A JSON fixture could not be loaded.
    #[error("failed to load ledger fixture {path}: {message}")]
    Fixture {
        /// Path of the fixture file.
        path: String,
        /// The underlying read or parse error.
        message: String,
    },
}

impl LedgerReadError {
    /// Whether retrying the same read later may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
