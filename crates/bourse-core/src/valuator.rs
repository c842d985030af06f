//! The valuation service: ledger reads plus regime evaluation.
//!
//! Every request pins three things before it computes anything: one
//! `as_of` instant, one [`ValuationPlan`] snapshot, and one consistent
//! [`LedgerView`](bourse_ledger::LedgerView). The math in
//! `bourse-valuation` is then a pure function of those, which makes two
//! valuations over the same ledger state and `as_of` identical.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use bourse_ledger::{EventQuery, LedgerSource};
use bourse_types::{CapLiftForecast, EntityId, PriceSnapshot, RegimeComparisonReport};
use bourse_valuation::{
    DailyBuckets, DayWindow, MigrationAudit, ValuationError, aggregate, compare_regimes,
    forecast_cap_lift,
};

use crate::error::EngineError;
use crate::plan::ValuationPlan;
use crate::registry::RegimeRegistry;

/// One entity's pinned inputs.
#[derive(Debug, Clone)]
pub struct EntityHistory {
    /// Entity the history belongs to.
    pub entity_id: EntityId,
    /// Window the buckets were aggregated over.
    pub window: DayWindow,
    /// Per-day qualifying event counts.
    pub buckets: DailyBuckets,
    /// Shares outstanding at read time.
    pub total_shares: u64,
}

/// Prices entities against a ledger using the registry's current plan.
#[derive(Debug)]
pub struct Valuator<S> {
    source: Arc<S>,
    registry: Arc<RegimeRegistry>,
}

impl<S> Clone for Valuator<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S: LedgerSource> Valuator<S> {
    /// Create a valuator over `source`.
    pub const fn new(source: Arc<S>, registry: Arc<RegimeRegistry>) -> Self {
        Self { source, registry }
    }

    /// The registry this valuator reads plans from.
    pub const fn registry(&self) -> &Arc<RegimeRegistry> {
        &self.registry
    }

    /// The ledger this valuator reads from.
    pub const fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Read and aggregate one entity's history under `plan`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Timeout`] if the read exceeds the plan's
    /// timeout, [`EngineError::LedgerUnavailable`] if it fails, or
    /// [`EngineError::Valuation`] if the window is invalid.
    pub async fn history(
        &self,
        plan: &ValuationPlan,
        entity_id: EntityId,
        as_of: DateTime<Utc>,
    ) -> Result<EntityHistory, EngineError> {
        let window = DayWindow::new(as_of, plan.window_days)?;
        let query = EventQuery {
            entity_id,
            since: window.start(),
            until: as_of,
            kinds: plan.activity_kinds.clone(),
        };

        let view = tokio::time::timeout(plan.read_timeout, self.source.read_view(&query))
            .await
            .map_err(|_elapsed| EngineError::Timeout {
                entity_id,
                timeout_ms: millis(plan.read_timeout),
            })?
            .map_err(|source| EngineError::LedgerUnavailable { entity_id, source })?;

        let buckets = aggregate(&view.events, entity_id, &window, &plan.activity_kinds);
        debug!(
            entity = %entity_id,
            events = view.events.len(),
            counted = buckets.total(),
            days = buckets.len(),
            total_shares = view.total_shares,
            "Ledger view read"
        );

        Ok(EntityHistory {
            entity_id,
            window,
            buckets,
            total_shares: view.total_shares,
        })
    }

    /// List every tracked entity, bounded by the plan's read timeout.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EntitiesTimeout`] if the listing exceeds the
    /// timeout, or [`EngineError::Entities`] if it fails.
    pub async fn tracked_entities(
        &self,
        plan: &ValuationPlan,
    ) -> Result<Vec<EntityId>, EngineError> {
        tokio::time::timeout(plan.read_timeout, self.source.tracked_entities())
            .await
            .map_err(|_elapsed| EngineError::EntitiesTimeout {
                timeout_ms: millis(plan.read_timeout),
            })?
            .map_err(|source| EngineError::Entities { source })
    }

    /// Price an entity under the active regime.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the read or the evaluation fails.
    pub async fn price(
        &self,
        entity_id: EntityId,
        as_of: DateTime<Utc>,
    ) -> Result<PriceSnapshot, EngineError> {
        let plan = self.registry.snapshot().await;
        self.price_under(&plan, &plan.active_regime, entity_id, as_of)
            .await
    }

    /// Price an entity under a named regime.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Valuation`] with
    /// [`ValuationError::UnknownRegime`] for an unconfigured name, or any
    /// read or evaluation failure.
    pub async fn price_with(
        &self,
        entity_id: EntityId,
        regime: &str,
        as_of: DateTime<Utc>,
    ) -> Result<PriceSnapshot, EngineError> {
        let plan = self.registry.snapshot().await;
        self.price_under(&plan, regime, entity_id, as_of).await
    }

    /// Price an entity under `regime` from an already pinned plan.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the regime is unknown, the read fails, or
    /// the evaluation fails.
    pub async fn price_under(
        &self,
        plan: &ValuationPlan,
        regime: &str,
        entity_id: EntityId,
        as_of: DateTime<Utc>,
    ) -> Result<PriceSnapshot, EngineError> {
        // Resolve before reading so an unknown name costs no I/O.
        let regime = plan.regime(regime)?;
        let history = self.history(plan, entity_id, as_of).await?;
        let snapshot = regime.evaluate(
            entity_id,
            &history.buckets,
            &history.window,
            history.total_shares,
            plan.currency_decimals,
        )?;
        debug!(
            entity = %entity_id,
            regime = %snapshot.regime,
            final_price = %snapshot.final_price,
            "Entity priced"
        );
        Ok(snapshot)
    }

    /// Price an entity under two regimes over one ledger read.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if either regime is unknown or any step fails.
    pub async fn compare(
        &self,
        entity_id: EntityId,
        from: &str,
        to: &str,
        as_of: DateTime<Utc>,
    ) -> Result<RegimeComparisonReport, EngineError> {
        let plan = self.registry.snapshot().await;
        self.compare_under(&plan, entity_id, from, to, as_of).await
    }

    async fn compare_under(
        &self,
        plan: &ValuationPlan,
        entity_id: EntityId,
        from: &str,
        to: &str,
        as_of: DateTime<Utc>,
    ) -> Result<RegimeComparisonReport, EngineError> {
        let regime_a = plan.regime(from)?;
        let regime_b = plan.regime(to)?;
        let history = self.history(plan, entity_id, as_of).await?;
        Ok(compare_regimes(
            entity_id,
            &history.buckets,
            &history.window,
            history.total_shares,
            regime_a,
            regime_b,
            plan.currency_decimals,
        )?)
    }

    /// Compare two regimes across every tracked entity.
    ///
    /// All entities are compared under one plan snapshot and one `as_of`.
    /// The first failure aborts the audit, since a partial audit would
    /// understate regressions.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if listing entities or any comparison fails.
    pub async fn audit(
        &self,
        from: &str,
        to: &str,
        as_of: DateTime<Utc>,
    ) -> Result<MigrationAudit, EngineError> {
        let plan = self.registry.snapshot().await;
        plan.regime(from)?;
        plan.regime(to)?;

        let entities = self.tracked_entities(&plan).await?;

        let mut reports = Vec::with_capacity(entities.len());
        for entity_id in entities {
            reports.push(
                self.compare_under(&plan, entity_id, from, to, as_of)
                    .await?,
            );
        }

        let audit = MigrationAudit::from_reports(from, to, &reports)?;
        info!(
            from,
            to,
            compared = audit.compared,
            regressions = audit.regressions.len(),
            net_delta = %audit.net_delta,
            "Migration audit complete"
        );
        Ok(audit)
    }

    /// Forecast when a hard-capped regime stops binding for an entity.
    ///
    /// Uses the active regime when `regime` is `None`. The threshold is the
    /// regime's saturation point.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Valuation`] with
    /// [`ValuationError::InvalidInput`] if the regime has no hard cap.
    pub async fn forecast(
        &self,
        entity_id: EntityId,
        regime: Option<&str>,
        as_of: DateTime<Utc>,
    ) -> Result<CapLiftForecast, EngineError> {
        let plan = self.registry.snapshot().await;
        let regime = plan.regime(regime.unwrap_or(&plan.active_regime))?;
        let threshold = regime.schedule().saturation_threshold().ok_or_else(|| {
            ValuationError::invalid(format!(
                "regime '{}' has no hard cap to forecast against",
                regime.name()
            ))
        })?;
        self.forecast_under(&plan, entity_id, threshold, as_of).await
    }

    /// Forecast against an explicit cap threshold.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the read fails or `threshold` is zero.
    pub async fn forecast_with_threshold(
        &self,
        entity_id: EntityId,
        threshold: u64,
        as_of: DateTime<Utc>,
    ) -> Result<CapLiftForecast, EngineError> {
        let plan = self.registry.snapshot().await;
        self.forecast_under(&plan, entity_id, threshold, as_of)
            .await
    }

    async fn forecast_under(
        &self,
        plan: &ValuationPlan,
        entity_id: EntityId,
        threshold: u64,
        as_of: DateTime<Utc>,
    ) -> Result<CapLiftForecast, EngineError> {
        let history = self.history(plan, entity_id, as_of).await?;
        Ok(forecast_cap_lift(
            entity_id,
            &history.buckets,
            &history.window,
            threshold,
        )?)
    }
}

fn millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}
