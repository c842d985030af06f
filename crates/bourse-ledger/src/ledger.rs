//! In-memory activity ledger and holdings book.
//!
//! [`InMemoryLedger`] is the embedded implementation of the read
//! interfaces. It backs the offline CLI (loaded from a JSON fixture) and
//! every test that needs a ledger without a database.
//!
//! # Design
//!
//! - **Append-only**: events are never modified or deleted.
//! - **Snapshot reads**: [`LedgerSource::read_view`] takes a single read
//!   lock, so events and share totals always come from the same state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use bourse_types::{ActivityEvent, EntityId, ShareHolding};

use crate::reader::{ActivityLedger, EventQuery, HoldingsReader, LedgerSource, LedgerView};
use crate::LedgerReadError;

/// On-disk JSON layout accepted by [`InMemoryLedger::from_fixture_file`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFixture {
    /// Activity events, in any order.
    #[serde(default)]
    pub events: Vec<ActivityEvent>,
    /// Share holdings. A later row for the same holder replaces an earlier one.
    #[serde(default)]
    pub holdings: Vec<ShareHolding>,
}

#[derive(Debug, Default)]
struct LedgerState {
    /// All events, in insertion order.
    events: Vec<ActivityEvent>,
    /// Shares keyed by (entity, holder).
    holdings: BTreeMap<(EntityId, EntityId), u64>,
}

impl LedgerState {
    fn matching_events(&self, query: &EventQuery) -> Vec<ActivityEvent> {
        let mut events: Vec<ActivityEvent> = self
            .events
            .iter()
            .filter(|event| query.matches(event))
            .cloned()
            .collect();
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        events
    }

    fn total_shares(&self, entity_id: EntityId) -> Result<u64, LedgerReadError> {
        self.holdings
            .range((entity_id, EntityId(0))..=(entity_id, EntityId(u64::MAX)))
            .try_fold(0_u64, |acc, (_, &shares)| acc.checked_add(shares))
            .ok_or(LedgerReadError::Corrupt {
                message: format!("share total overflows u64 for entity {entity_id}"),
            })
    }
}

/// An append-only activity ledger and holdings book held in memory.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    /// Create a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from a parsed fixture.
    pub fn from_fixture(fixture: LedgerFixture) -> Self {
        let holdings = fixture
            .holdings
            .into_iter()
            .map(|h| ((h.entity_id, h.holder_id), h.shares))
            .collect();
        Self {
            state: RwLock::new(LedgerState {
                events: fixture.events,
                holdings,
            }),
        }
    }

    /// Load a JSON fixture from disk.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerReadError::Fixture`] if the file cannot be read or
    /// does not parse.
    pub fn from_fixture_file(path: &Path) -> Result<Self, LedgerReadError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| LedgerReadError::Fixture {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        let fixture: LedgerFixture =
            serde_json::from_str(&contents).map_err(|e| LedgerReadError::Fixture {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        tracing::debug!(
            path = %path.display(),
            events = fixture.events.len(),
            holdings = fixture.holdings.len(),
            "Loaded ledger fixture"
        );
        Ok(Self::from_fixture(fixture))
    }

    /// Append an event produced upstream.
    pub async fn append(&self, event: ActivityEvent) {
        self.state.write().await.events.push(event);
    }

    /// Append many events at once under a single write lock.
    pub async fn extend<I>(&self, events: I)
    where
        I: IntoIterator<Item = ActivityEvent>,
    {
        self.state.write().await.events.extend(events);
    }

    /// Record a holder's current share count, replacing any previous value.
    pub async fn set_holding(&self, holding: ShareHolding) {
        self.state
            .write()
            .await
            .holdings
            .insert((holding.entity_id, holding.holder_id), holding.shares);
    }

    /// Return the number of events in the ledger.
    pub async fn len(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// Return whether the ledger has no events.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.events.is_empty()
    }
}

impl ActivityLedger for InMemoryLedger {
    async fn list_events(&self, query: &EventQuery) -> Result<Vec<ActivityEvent>, LedgerReadError> {
        Ok(self.state.read().await.matching_events(query))
    }

    async fn tracked_entities(&self) -> Result<Vec<EntityId>, LedgerReadError> {
        let state = self.state.read().await;
        let entities: BTreeSet<EntityId> = state
            .events
            .iter()
            .map(|event| event.entity_id)
            .chain(state.holdings.keys().map(|&(entity, _)| entity))
            .collect();
        Ok(entities.into_iter().collect())
    }
}

impl HoldingsReader for InMemoryLedger {
    async fn total_shares(&self, entity_id: EntityId) -> Result<u64, LedgerReadError> {
        self.state.read().await.total_shares(entity_id)
    }
}

impl LedgerSource for InMemoryLedger {
    async fn read_view(&self, query: &EventQuery) -> Result<LedgerView, LedgerReadError> {
        let state = self.state.read().await;
        Ok(LedgerView {
            events: state.matching_events(query),
            total_shares: state.total_shares(query.entity_id)?,
        })
    }
}
