//! Command execution, generic over the ledger backend.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use bourse_core::{
    BatchControl, BatchReport, BourseConfig, RegimeRegistry, SnapshotBoard, Valuator, revalue_all,
};
use bourse_ledger::LedgerSource;

use crate::cli::Command;

/// Run a single command at `as_of` and return its JSON output.
///
/// `revalue` runs exactly one pass here; watch mode goes through [`watch`].
pub async fn execute<S>(
    valuator: &Valuator<S>,
    board: &Arc<SnapshotBoard>,
    control: &Arc<BatchControl>,
    command: &Command,
    as_of: DateTime<Utc>,
) -> anyhow::Result<Value>
where
    S: LedgerSource + 'static,
{
    let output = match command {
        Command::Price { entity, regime } => {
            let snapshot = match regime {
                Some(name) => valuator.price_with(*entity, name, as_of).await,
                None => valuator.price(*entity, as_of).await,
            }
            .with_context(|| format!("pricing entity {entity}"))?;
            serde_json::to_value(snapshot)?
        }
        Command::Compare { entity, from, to } => {
            let report = valuator
                .compare(*entity, from, to, as_of)
                .await
                .with_context(|| format!("comparing {from} against {to} for entity {entity}"))?;
            serde_json::to_value(report)?
        }
        Command::Audit { from, to } => {
            let audit = valuator
                .audit(from, to, as_of)
                .await
                .with_context(|| format!("auditing {from} against {to}"))?;
            serde_json::to_value(audit)?
        }
        Command::Forecast {
            entity,
            regime,
            threshold,
        } => {
            let forecast = match threshold {
                Some(threshold) => {
                    valuator
                        .forecast_with_threshold(*entity, *threshold, as_of)
                        .await
                }
                None => valuator.forecast(*entity, regime.as_deref(), as_of).await,
            }
            .with_context(|| format!("forecasting cap lift for entity {entity}"))?;
            serde_json::to_value(forecast)?
        }
        Command::Revalue { .. } => {
            let report = revalue_all(valuator, board, control, as_of)
                .await
                .context("batch revaluation")?;
            serde_json::to_value(report)?
        }
    };
    Ok(output)
}

/// Repeat batch passes until cancelled.
///
/// Before each pass the configuration at `config_path` is re-read and
/// swapped into the registry; a missing or invalid file keeps the previous
/// plan. Each pass is valued at `fixed_as_of` when set, otherwise at the
/// current time. Retryable pass-level failures are logged and retried on the
/// next tick. Returns the number of completed passes.
pub async fn watch<S, F>(
    valuator: &Valuator<S>,
    board: &Arc<SnapshotBoard>,
    control: &Arc<BatchControl>,
    config_path: &Path,
    fixed_as_of: Option<DateTime<Utc>>,
    mut interval: Duration,
    mut emit: F,
) -> anyhow::Result<u64>
where
    S: LedgerSource + 'static,
    F: FnMut(&BatchReport) -> anyhow::Result<()>,
{
    let mut passes: u64 = 0;
    loop {
        if let Some(config) = reload_config(valuator.registry(), config_path).await {
            interval = Duration::from_secs(config.batch.interval_secs);
        }

        let as_of = fixed_as_of.unwrap_or_else(Utc::now);
        match revalue_all(valuator, board, control, as_of).await {
            Ok(report) => {
                passes = passes.saturating_add(1);
                emit(&report)?;
            }
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "Batch pass failed; retrying next interval");
            }
            Err(e) => return Err(e).context("batch revaluation"),
        }

        if control.is_cancelled() {
            break;
        }
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            () = control.cancelled() => break,
        }
    }
    info!(passes, "Watch loop stopped");
    Ok(passes)
}

async fn reload_config(registry: &RegimeRegistry, path: &Path) -> Option<BourseConfig> {
    if !path.exists() {
        return None;
    }
    let config = match BourseConfig::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read configuration; keeping previous plan");
            return None;
        }
    };
    // The registry logs rejected plans itself.
    registry.reload(&config).await.ok().map(|_| config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use bourse_ledger::InMemoryLedger;
    use bourse_types::{ActivityEvent, ActivityKind, EntityId, EventId, ShareHolding};

    use super::*;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 20, 12, 0, 0).single().unwrap()
    }

    async fn valuator() -> Valuator<InMemoryLedger> {
        let ledger = InMemoryLedger::new();
        let start = Utc.with_ymd_and_hms(2025, 6, 19, 9, 0, 0).single().unwrap();
        for i in 0..60 {
            ledger
                .append(ActivityEvent {
                    id: EventId::new(),
                    entity_id: EntityId(1),
                    timestamp: start.checked_add_signed(TimeDelta::seconds(i)).unwrap(),
                    kind: ActivityKind::Message,
                })
                .await;
        }
        ledger
            .set_holding(ShareHolding {
                entity_id: EntityId(1),
                holder_id: EntityId(2),
                shares: 100,
            })
            .await;
        let registry = RegimeRegistry::from_config(&BourseConfig::default()).unwrap();
        Valuator::new(Arc::new(ledger), Arc::new(registry))
    }

    async fn run(command: Command) -> anyhow::Result<Value> {
        let board = Arc::new(SnapshotBoard::new());
        let control = Arc::new(BatchControl::new());
        execute(&valuator().await, &board, &control, &command, as_of()).await
    }

    #[tokio::test]
    async fn price_outputs_the_snapshot() {
        let output = run(Command::Price {
            entity: EntityId(1),
            regime: None,
        })
        .await
        .unwrap();
        assert_eq!(output["final_price"], "154.70");
        assert_eq!(output["regime"], "tiered");
    }

    #[tokio::test]
    async fn compare_outputs_the_delta() {
        let output = run(Command::Compare {
            entity: EntityId(1),
            from: "legacy".to_owned(),
            to: "tiered".to_owned(),
        })
        .await
        .unwrap();
        assert_eq!(output["delta"], "9.10");
    }

    #[tokio::test]
    async fn unknown_regime_carries_context() {
        let err = run(Command::Price {
            entity: EntityId(1),
            regime: Some("nope".to_owned()),
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("pricing entity 1"));
    }

    #[tokio::test]
    async fn single_revalue_pass_publishes() {
        let output = run(Command::Revalue { watch: false }).await.unwrap();
        assert_eq!(output["published"], serde_json::json!([1]));
        assert_eq!(output["cancelled"], false);
    }

    #[tokio::test]
    async fn watch_stops_once_cancelled() {
        let valuator = valuator().await;
        let board = Arc::new(SnapshotBoard::new());
        let control = Arc::new(BatchControl::new());
        let mut reports = Vec::new();

        let passes = watch(
            &valuator,
            &board,
            &control,
            Path::new("/nonexistent/bourse-config.yaml"),
            Some(as_of()),
            Duration::from_secs(3_600),
            |report| {
                reports.push(report.clone());
                control.cancel();
                Ok(())
            },
        )
        .await
        .unwrap();

        assert_eq!(passes, 1);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_complete());
        assert_eq!(board.len().await, 1);
    }

    #[tokio::test]
    async fn watch_reloads_configuration_before_a_pass() {
        let path = std::env::temp_dir().join(format!(
            "bourse-watch-{}-{}.yaml",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        std::fs::write(&path, "valuation:\n  active_regime: legacy\n").unwrap();

        let valuator = valuator().await;
        let board = Arc::new(SnapshotBoard::new());
        let control = Arc::new(BatchControl::new());
        let mut regimes = Vec::new();

        watch(
            &valuator,
            &board,
            &control,
            &path,
            Some(as_of()),
            Duration::from_secs(3_600),
            |report| {
                regimes.push(report.regime.clone());
                control.cancel();
                Ok(())
            },
        )
        .await
        .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(regimes, vec!["legacy".to_owned()]);
        assert_eq!(
            board.get(EntityId(1)).await.unwrap().final_price.to_string(),
            "145.60"
        );
    }
}
