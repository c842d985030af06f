//! End-to-end valuation tests against in-memory and misbehaving ledgers.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::arithmetic_side_effects)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use rust_decimal_macros::dec;

use bourse_core::{BourseConfig, EngineError, RegimeRegistry, Valuator};
use bourse_ledger::{
    ActivityLedger, EventQuery, HoldingsReader, InMemoryLedger, LedgerReadError, LedgerSource,
};
use bourse_types::{ActivityEvent, ActivityKind, EntityId, EventId, ShareHolding};
use bourse_valuation::ValuationError;

fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, month, day, hour, 0, 0)
        .single()
        .unwrap()
}

fn burst(entity: u64, start: DateTime<Utc>, count: usize) -> Vec<ActivityEvent> {
    (0..count)
        .map(|i| ActivityEvent {
            id: EventId::new(),
            entity_id: EntityId(entity),
            timestamp: start + TimeDelta::seconds(i64::try_from(i).unwrap()),
            kind: ActivityKind::Message,
        })
        .collect()
}

async fn holders(ledger: &InMemoryLedger, entity: u64, shares: u64) {
    ledger
        .set_holding(ShareHolding {
            entity_id: EntityId(entity),
            holder_id: EntityId(1_000),
            shares,
        })
        .await;
}

fn registry() -> Arc<RegimeRegistry> {
    Arc::new(RegimeRegistry::from_config(&BourseConfig::default()).unwrap())
}

async fn sixty_message_ledger() -> Arc<InMemoryLedger> {
    let ledger = InMemoryLedger::new();
    ledger.extend(burst(1, at(6, 19, 9), 60)).await;
    holders(&ledger, 1, 100).await;
    Arc::new(ledger)
}

/// Delays every read by a fixed amount.
struct SlowLedger {
    inner: InMemoryLedger,
    delay: Duration,
}

impl ActivityLedger for SlowLedger {
    async fn list_events(&self, query: &EventQuery) -> Result<Vec<ActivityEvent>, LedgerReadError> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_events(query).await
    }

    async fn tracked_entities(&self) -> Result<Vec<EntityId>, LedgerReadError> {
        self.inner.tracked_entities().await
    }
}

impl HoldingsReader for SlowLedger {
    async fn total_shares(&self, entity_id: EntityId) -> Result<u64, LedgerReadError> {
        self.inner.total_shares(entity_id).await
    }
}

impl LedgerSource for SlowLedger {}

/// Fails every holdings read.
struct DownLedger;

impl ActivityLedger for DownLedger {
    async fn list_events(&self, _query: &EventQuery) -> Result<Vec<ActivityEvent>, LedgerReadError> {
        Ok(Vec::new())
    }

    async fn tracked_entities(&self) -> Result<Vec<EntityId>, LedgerReadError> {
        Ok(vec![EntityId(1)])
    }
}

impl HoldingsReader for DownLedger {
    async fn total_shares(&self, _entity_id: EntityId) -> Result<u64, LedgerReadError> {
        Err(LedgerReadError::Unavailable {
            message: "holdings service unreachable".to_owned(),
        })
    }
}

impl LedgerSource for DownLedger {}

/// Answers reads promptly but never finishes listing entities.
struct StalledListing {
    inner: InMemoryLedger,
}

impl ActivityLedger for StalledListing {
    async fn list_events(&self, query: &EventQuery) -> Result<Vec<ActivityEvent>, LedgerReadError> {
        self.inner.list_events(query).await
    }

    async fn tracked_entities(&self) -> Result<Vec<EntityId>, LedgerReadError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        self.inner.tracked_entities().await
    }
}

impl HoldingsReader for StalledListing {
    async fn total_shares(&self, entity_id: EntityId) -> Result<u64, LedgerReadError> {
        self.inner.total_shares(entity_id).await
    }
}

impl LedgerSource for StalledListing {}

#[tokio::test]
async fn active_regime_prices_sixty_messages_at_154_70() {
    let valuator = Valuator::new(sixty_message_ledger().await, registry());
    let snapshot = valuator.price(EntityId(1), at(6, 20, 12)).await.unwrap();

    assert_eq!(snapshot.regime, "tiered");
    assert_eq!(snapshot.activity_contribution_percent, dec!(19.0));
    assert_eq!(snapshot.demand_multiplier, dec!(1.30));
    assert_eq!(snapshot.final_price, dec!(154.70));
    assert_eq!(snapshot.as_of, at(6, 20, 12));
}

#[tokio::test]
async fn repeated_valuations_are_identical() {
    let valuator = Valuator::new(sixty_message_ledger().await, registry());
    let first = valuator.price(EntityId(1), at(6, 20, 12)).await.unwrap();
    let second = valuator.price(EntityId(1), at(6, 20, 12)).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn events_after_as_of_do_not_count() {
    let ledger = sixty_message_ledger().await;
    ledger.extend(burst(1, at(6, 20, 15), 40)).await;
    let valuator = Valuator::new(ledger, registry());

    let snapshot = valuator.price(EntityId(1), at(6, 20, 12)).await.unwrap();
    assert_eq!(snapshot.final_price, dec!(154.70));
}

#[tokio::test]
async fn events_expire_after_the_window() {
    let valuator = Valuator::new(sixty_message_ledger().await, registry());
    // The 06-19 bucket leaves a 30-day window on 07-19.
    let inside = valuator.price(EntityId(1), at(7, 18, 23)).await.unwrap();
    let outside = valuator.price(EntityId(1), at(7, 19, 0)).await.unwrap();
    assert_eq!(inside.activity_contribution_percent, dec!(19.0));
    assert_eq!(outside.activity_contribution_percent, dec!(0));
    assert_eq!(outside.final_price, dec!(130.00));
}

#[tokio::test]
async fn named_regime_is_used_when_requested() {
    let valuator = Valuator::new(sixty_message_ledger().await, registry());
    let snapshot = valuator
        .price_with(EntityId(1), "legacy", at(6, 20, 12))
        .await
        .unwrap();
    assert_eq!(snapshot.regime, "legacy");
    assert_eq!(snapshot.final_price, dec!(145.60));
}

#[tokio::test]
async fn unknown_regime_is_rejected() {
    let valuator = Valuator::new(sixty_message_ledger().await, registry());
    let result = valuator
        .price_with(EntityId(1), "experimental", at(6, 20, 12))
        .await;
    assert!(matches!(
        result,
        Err(EngineError::Valuation {
            source: ValuationError::UnknownRegime { .. }
        })
    ));
}

#[tokio::test]
async fn comparison_reports_delta_between_regimes() {
    let valuator = Valuator::new(sixty_message_ledger().await, registry());
    let report = valuator
        .compare(EntityId(1), "legacy", "tiered", at(6, 20, 12))
        .await
        .unwrap();
    assert_eq!(report.delta, dec!(9.10));
    assert!(!report.is_regression());
}

#[tokio::test]
async fn audit_covers_every_tracked_entity() {
    let ledger = sixty_message_ledger().await;
    ledger.extend(burst(2, at(6, 20, 1), 300)).await;
    holders(&ledger, 3, 10).await;
    let valuator = Valuator::new(ledger, registry());

    let audit = valuator
        .audit("legacy", "tiered", at(6, 20, 12))
        .await
        .unwrap();
    assert_eq!(audit.compared, 3);
    assert_eq!(audit.regressions, vec![EntityId(2)]);
    assert_eq!(audit.worst_entity, Some(EntityId(2)));
    assert!(!audit.is_monotonic());
}

#[tokio::test]
async fn capped_entity_forecasts_a_lift_date() {
    let ledger = InMemoryLedger::new();
    ledger.extend(burst(5, at(6, 2, 8), 100)).await;
    ledger.extend(burst(5, at(6, 15, 8), 150)).await;
    ledger.extend(burst(5, at(6, 29, 8), 150)).await;
    let valuator = Valuator::new(Arc::new(ledger), registry());

    let forecast = valuator
        .forecast(EntityId(5), Some("legacy"), at(6, 30, 12))
        .await
        .unwrap();
    assert_eq!(forecast.current_count, 400);
    assert_eq!(forecast.threshold, 300);
    assert_eq!(forecast.lift_date, NaiveDate::from_ymd_opt(2025, 7, 2));
    assert_eq!(forecast.days_until_lift(), Some(2));
}

#[tokio::test]
async fn forecasting_an_uncapped_regime_is_invalid() {
    let valuator = Valuator::new(sixty_message_ledger().await, registry());
    let result = valuator.forecast(EntityId(1), None, at(6, 20, 12)).await;
    assert!(matches!(
        result,
        Err(EngineError::Valuation {
            source: ValuationError::InvalidInput { .. }
        })
    ));
}

#[tokio::test]
async fn explicit_threshold_forecast() {
    let valuator = Valuator::new(sixty_message_ledger().await, registry());
    let forecast = valuator
        .forecast_with_threshold(EntityId(1), 50, at(6, 20, 12))
        .await
        .unwrap();
    // 06-19 + 30 days.
    assert_eq!(forecast.lift_date, NaiveDate::from_ymd_opt(2025, 7, 19));
}

#[tokio::test]
async fn slow_reads_time_out_as_retryable() {
    let mut config = BourseConfig::default();
    config.ledger.read_timeout_ms = 20;
    let registry = Arc::new(RegimeRegistry::from_config(&config).unwrap());
    let ledger = Arc::new(SlowLedger {
        inner: InMemoryLedger::new(),
        delay: Duration::from_secs(5),
    });

    let err = Valuator::new(ledger, registry)
        .price(EntityId(1), at(6, 20, 12))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Timeout { timeout_ms: 20, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn ledger_outage_is_retryable() {
    let err = Valuator::new(Arc::new(DownLedger), registry())
        .price(EntityId(1), at(6, 20, 12))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LedgerUnavailable { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn reload_applies_to_the_next_request() {
    let registry = registry();
    let valuator = Valuator::new(sixty_message_ledger().await, Arc::clone(&registry));

    let mut config = BourseConfig::default();
    config.valuation.active_regime = "legacy".to_owned();
    registry.reload(&config).await.unwrap();

    let snapshot = valuator.price(EntityId(1), at(6, 20, 12)).await.unwrap();
    assert_eq!(snapshot.regime, "legacy");
}

#[tokio::test]
async fn audit_times_out_when_entity_listing_stalls() {
    let mut config = BourseConfig::default();
    config.ledger.read_timeout_ms = 20;
    let registry = Arc::new(RegimeRegistry::from_config(&config).unwrap());
    let ledger = Arc::new(StalledListing {
        inner: InMemoryLedger::new(),
    });

    let err = tokio::time::timeout(
        Duration::from_secs(1),
        Valuator::new(ledger, registry).audit("legacy", "tiered", at(6, 20, 12)),
    )
    .await
    .expect("listing must be bounded by the read timeout")
    .unwrap_err();

    assert!(matches!(err, EngineError::EntitiesTimeout { timeout_ms: 20 }));
    assert!(err.is_retryable());
}
