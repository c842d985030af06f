//! Latest published price per entity.
//!
//! The board only ever holds complete snapshots. A publish with an `as_of`
//! older than what is already posted is ignored, so a slow task from an
//! earlier pass can never overwrite a newer price.

use std::collections::BTreeMap;

use tokio::sync::RwLock;
use tracing::debug;

use bourse_types::{EntityId, PriceSnapshot};

/// Outcome of a [`SnapshotBoard::publish`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The entity had no snapshot yet.
    Inserted,
    /// A snapshot with an older or equal `as_of` was replaced.
    Replaced,
    /// The posted snapshot is newer; nothing changed.
    Stale,
}

/// Concurrent map of the most recent snapshot for each entity.
#[derive(Debug, Default)]
pub struct SnapshotBoard {
    snapshots: RwLock<BTreeMap<EntityId, PriceSnapshot>>,
}

impl SnapshotBoard {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a snapshot unless a newer one is already present.
    pub async fn publish(&self, snapshot: PriceSnapshot) -> PublishOutcome {
        let mut snapshots = self.snapshots.write().await;
        let outcome = match snapshots.get(&snapshot.entity_id) {
            None => PublishOutcome::Inserted,
            Some(existing) if existing.as_of > snapshot.as_of => PublishOutcome::Stale,
            Some(_) => PublishOutcome::Replaced,
        };
        if outcome == PublishOutcome::Stale {
            debug!(entity = %snapshot.entity_id, as_of = %snapshot.as_of, "Ignored stale snapshot");
        } else {
            snapshots.insert(snapshot.entity_id, snapshot);
        }
        outcome
    }

    /// The current snapshot for an entity.
    pub async fn get(&self, entity_id: EntityId) -> Option<PriceSnapshot> {
        self.snapshots.read().await.get(&entity_id).cloned()
    }

    /// Every current snapshot, ordered by entity.
    pub async fn all(&self) -> Vec<PriceSnapshot> {
        self.snapshots.read().await.values().cloned().collect()
    }

    /// Number of entities with a snapshot.
    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    /// Whether no snapshot has been published.
    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}
