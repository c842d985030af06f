//! Batch revaluation of every tracked entity.
//!
//! One pass prices all entities under the active regime with a shared
//! `as_of` and plan snapshot. Each entity runs as its own task in a
//! [`JoinSet`], bounded by a [`Semaphore`] sized from
//! `batch.max_concurrency`. Tasks share nothing mutable: each publishes its
//! own finished snapshot to the [`SnapshotBoard`], or reports a failure and
//! leaves the entity's previous snapshot in place.
//!
//! [`BatchControl`] lets an operator cancel a pass. Cancelled tasks never
//! publish; the report lists them as skipped.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use bourse_ledger::LedgerSource;
use bourse_types::EntityId;

use crate::board::{PublishOutcome, SnapshotBoard};
use crate::error::EngineError;
use crate::valuator::Valuator;

/// Cancellation flag shared between a batch pass and its operator.
#[derive(Debug, Default)]
pub struct BatchControl {
    cancelled: AtomicBool,
    notify: Notify,
}

impl BatchControl {
    /// Create a control in the running state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every waiter.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Wait until cancellation is requested.
    ///
    /// Returns immediately if already cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// An entity whose valuation failed during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityFailure {
    /// The entity.
    pub entity_id: EntityId,
    /// Rendered error.
    pub error: String,
    /// Whether the next pass may succeed without intervention.
    pub retryable: bool,
}

/// Summary of one batch pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Instant every entity was valued at.
    pub as_of: DateTime<Utc>,
    /// Regime used.
    pub regime: String,
    /// Entities whose snapshot was posted.
    pub published: Vec<EntityId>,
    /// Entities whose snapshot lost to a newer one already on the board.
    pub stale: Vec<EntityId>,
    /// Entities that failed and kept their previous snapshot.
    pub failed: Vec<EntityFailure>,
    /// Entities not valued because the pass was cancelled.
    pub skipped: Vec<EntityId>,
    /// Whether the pass was cancelled.
    pub cancelled: bool,
}

impl BatchReport {
    fn new(as_of: DateTime<Utc>, regime: String) -> Self {
        Self {
            as_of,
            regime,
            published: Vec::new(),
            stale: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            cancelled: false,
        }
    }

    /// Whether every entity was published.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed.is_empty() && self.skipped.is_empty()
    }

    fn sort(&mut self) {
        self.published.sort_unstable();
        self.stale.sort_unstable();
        self.skipped.sort_unstable();
        self.failed.sort_unstable_by_key(|f| f.entity_id);
    }
}

/// What one entity task ended with.
#[derive(Debug)]
enum TaskOutcome {
    Published(PublishOutcome),
    Failed(EngineError),
    Skipped,
}

/// Value every tracked entity under the active regime and publish results.
///
/// # Errors
///
/// Returns [`EngineError`] if the active regime cannot be resolved or the
/// tracked entity list cannot be read. Per-entity failures are recorded in
/// the report instead.
pub async fn revalue_all<S>(
    valuator: &Valuator<S>,
    board: &Arc<SnapshotBoard>,
    control: &Arc<BatchControl>,
    as_of: DateTime<Utc>,
) -> Result<BatchReport, EngineError>
where
    S: LedgerSource + 'static,
{
    let plan = valuator.registry().snapshot().await;
    let regime = plan.active()?.name().to_owned();

    let entities = valuator.tracked_entities(&plan).await?;

    info!(
        entities = entities.len(),
        regime = %regime,
        %as_of,
        max_concurrency = plan.max_concurrency,
        "Batch revaluation started"
    );

    let mut report = BatchReport::new(as_of, regime.clone());
    let semaphore = Arc::new(Semaphore::new(plan.max_concurrency));
    let mut pending: BTreeSet<EntityId> = BTreeSet::new();
    let mut tasks = JoinSet::new();

    for entity_id in entities {
        if control.is_cancelled() {
            report.skipped.push(entity_id);
            continue;
        }
        pending.insert(entity_id);

        let valuator = valuator.clone();
        let plan = Arc::clone(&plan);
        let board = Arc::clone(board);
        let control = Arc::clone(control);
        let semaphore = Arc::clone(&semaphore);
        let regime = regime.clone();

        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (entity_id, TaskOutcome::Skipped);
            };
            if control.is_cancelled() {
                return (entity_id, TaskOutcome::Skipped);
            }
            let outcome = match valuator
                .price_under(&plan, &regime, entity_id, as_of)
                .await
            {
                Ok(_) if control.is_cancelled() => TaskOutcome::Skipped,
                Ok(snapshot) => TaskOutcome::Published(board.publish(snapshot).await),
                Err(e) => TaskOutcome::Failed(e),
            };
            (entity_id, outcome)
        });
    }

    loop {
        let joined = tokio::select! {
            joined = tasks.join_next() => joined,
            () = control.cancelled(), if !report.cancelled => {
                report.cancelled = true;
                tasks.abort_all();
                continue;
            }
        };
        let Some(joined) = joined else { break };
        match joined {
            Ok((entity_id, outcome)) => {
                pending.remove(&entity_id);
                record(&mut report, entity_id, outcome);
            }
            Err(e) => debug!(error = %e, "Valuation task ended without a result"),
        }
    }

    // Aborted or panicked tasks never reported back.
    for entity_id in pending {
        if report.cancelled {
            report.skipped.push(entity_id);
        } else {
            warn!(entity = %entity_id, "Valuation task ended without a result");
            report.failed.push(EntityFailure {
                entity_id,
                error: "valuation task ended without a result".to_owned(),
                retryable: true,
            });
        }
    }
    report.cancelled |= control.is_cancelled();
    report.sort();

    info!(
        published = report.published.len(),
        stale = report.stale.len(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        cancelled = report.cancelled,
        "Batch revaluation finished"
    );
    Ok(report)
}

fn record(report: &mut BatchReport, entity_id: EntityId, outcome: TaskOutcome) {
    match outcome {
        TaskOutcome::Published(PublishOutcome::Stale) => report.stale.push(entity_id),
        TaskOutcome::Published(_) => report.published.push(entity_id),
        TaskOutcome::Skipped => report.skipped.push(entity_id),
        TaskOutcome::Failed(e) => {
            warn!(
                entity = %entity_id,
                error = %e,
                retryable = e.is_retryable(),
                "Entity revaluation failed; keeping previous snapshot"
            );
            report.failed.push(EntityFailure {
                entity_id,
                error: e.to_string(),
                retryable: e.is_retryable(),
            });
        }
    }
}
