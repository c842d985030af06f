//! Read interfaces the valuation engine consumes.
//!
//! The engine never writes to the activity ledger or to holdings. It asks
//! for a bounded slice of an entity's history plus the share count, and it
//! asks for both in a single [`LedgerSource::read_view`] call so that one
//! price is never composed from two different ledger states.

use std::collections::BTreeSet;
use std::future::Future;

use chrono::{DateTime, Utc};

use bourse_types::{ActivityEvent, ActivityKind, EntityId};

use crate::LedgerReadError;

/// A bounded query against one entity's activity history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    /// The entity whose events are requested.
    pub entity_id: EntityId,
    /// Inclusive lower time bound.
    pub since: DateTime<Utc>,
    /// Inclusive upper time bound (the pinned evaluation instant).
    pub until: DateTime<Utc>,
    /// Kinds to return. An empty set returns nothing.
    pub kinds: BTreeSet<ActivityKind>,
}

impl EventQuery {
    /// Whether an event satisfies every predicate of this query.
    pub fn matches(&self, event: &ActivityEvent) -> bool {
        event.entity_id == self.entity_id
            && event.timestamp >= self.since
            && event.timestamp <= self.until
            && self.kinds.contains(&event.kind)
    }
}

/// One consistent read of an entity's history and holdings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerView {
    /// Matching events ordered by timestamp.
    pub events: Vec<ActivityEvent>,
    /// Total shares outstanding across all holders.
    pub total_shares: u64,
}

/// Read access to the append-only activity ledger.
pub trait ActivityLedger: Send + Sync {
    /// List events matching `query`, ordered by timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerReadError`] if the backing store cannot be read.
    fn list_events(
        &self,
        query: &EventQuery,
    ) -> impl Future<Output = Result<Vec<ActivityEvent>, LedgerReadError>> + Send;

    /// List every entity that has activity or outstanding shares.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerReadError`] if the backing store cannot be read.
    fn tracked_entities(
        &self,
    ) -> impl Future<Output = Result<Vec<EntityId>, LedgerReadError>> + Send;
}

/// Read access to share holdings.
pub trait HoldingsReader: Send + Sync {
    /// Sum of shares of `entity_id` across all holders.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerReadError`] if the backing store cannot be read.
    fn total_shares(
        &self,
        entity_id: EntityId,
    ) -> impl Future<Output = Result<u64, LedgerReadError>> + Send;
}

/// A ledger plus holdings that can be read as one consistent view.
///
/// The default [`read_view`](LedgerSource::read_view) issues the two reads
/// back to back. Stores that can mutate concurrently should override it
/// with a snapshot read.
pub trait LedgerSource: ActivityLedger + HoldingsReader {
    /// Read events and total shares for `query.entity_id` together.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerReadError`] if either read fails.
    fn read_view(
        &self,
        query: &EventQuery,
    ) -> impl Future<Output = Result<LedgerView, LedgerReadError>> + Send {
        async move {
            let events = self.list_events(query).await?;
            let total_shares = self.total_shares(query.entity_id).await?;
            Ok(LedgerView {
                events,
                total_shares,
            })
        }
    }
}
