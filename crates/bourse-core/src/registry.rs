//! Hot-swappable holder for the active [`ValuationPlan`].
//!
//! Readers take a cheap `Arc` clone of the current plan and keep it for the
//! whole request. [`RegimeRegistry::reload`] builds and validates a new plan
//! first and only swaps it in on success, so a bad config file leaves the
//! previous plan serving.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::{BourseConfig, ConfigError};
use crate::plan::ValuationPlan;

/// Shared, swappable valuation configuration.
#[derive(Debug)]
pub struct RegimeRegistry {
    current: RwLock<Arc<ValuationPlan>>,
    generation: AtomicU64,
}

impl RegimeRegistry {
    /// Create a registry serving `plan` as generation 0.
    pub fn new(plan: ValuationPlan) -> Self {
        Self {
            current: RwLock::new(Arc::new(plan)),
            generation: AtomicU64::new(0),
        }
    }

    /// Build a registry from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration does not validate.
    pub fn from_config(config: &BourseConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.plan()?))
    }

    /// The plan currently in force.
    pub async fn snapshot(&self) -> Arc<ValuationPlan> {
        Arc::clone(&*self.current.read().await)
    }

    /// Number of successful swaps since creation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Validate `config` and swap it in.
    ///
    /// Returns the new generation number. Requests already holding the old
    /// plan finish with it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation fails; the previous plan stays
    /// active.
    pub async fn reload(&self, config: &BourseConfig) -> Result<u64, ConfigError> {
        let plan = match config.plan() {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "Rejected configuration reload; keeping previous plan");
                return Err(e);
            }
        };
        Ok(self.replace(plan).await)
    }

    /// Swap in an already validated plan and return the new generation.
    pub async fn replace(&self, plan: ValuationPlan) -> u64 {
        let active = plan.active_regime.clone();
        let mut guard = self.current.write().await;
        *guard = Arc::new(plan);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        drop(guard);
        info!(generation, active_regime = %active, "Valuation plan swapped");
        generation
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reload_swaps_plan_and_bumps_generation() {
        let registry = RegimeRegistry::from_config(&BourseConfig::default()).unwrap();
        assert_eq!(registry.generation(), 0);

        let mut config = BourseConfig::default();
        config.valuation.active_regime = "legacy".to_owned();
        let generation = registry.reload(&config).await.unwrap();

        assert_eq!(generation, 1);
        assert_eq!(registry.snapshot().await.active_regime, "legacy");
    }

    #[tokio::test]
    async fn invalid_reload_keeps_previous_plan() {
        let registry = RegimeRegistry::from_config(&BourseConfig::default()).unwrap();
        let before = registry.snapshot().await;

        let mut config = BourseConfig::default();
        config.valuation.window_days = 0;
        assert!(registry.reload(&config).await.is_err());

        assert_eq!(registry.generation(), 0);
        assert!(Arc::ptr_eq(&before, &registry.snapshot().await));
    }

    #[tokio::test]
    async fn held_snapshot_survives_a_swap() {
        let registry = RegimeRegistry::from_config(&BourseConfig::default()).unwrap();
        let pinned = registry.snapshot().await;

        let mut config = BourseConfig::default();
        config.valuation.window_days = 7;
        registry.reload(&config).await.unwrap();

        assert_eq!(pinned.window_days, 30);
        assert_eq!(registry.snapshot().await.window_days, 7);
    }
}
