//! `bourse` command-line entry point.
//!
//! Wires configuration, logging, and a ledger backend to the valuation
//! services in `bourse-core`, then runs one command and prints its result
//! as JSON on stdout. Logs go to stderr.
//!
//! # Startup Sequence
//!
//! 1. Parse arguments
//! 2. Load configuration from `--config` (defaults when the file is missing)
//! 3. Initialize structured logging (tracing)
//! 4. Validate the configuration into the regime registry
//! 5. Open the ledger: a JSON fixture with `--fixture`, otherwise `PostgreSQL`
//! 6. Run the command

mod cli;
mod commands;

use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::Utc;
use clap::Parser as _;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bourse_core::config::LoggingConfig;
use bourse_core::{BatchControl, BourseConfig, LogFormat, RegimeRegistry, SnapshotBoard, Valuator};
use bourse_db::{PostgresConfig, PostgresPool};
use bourse_ledger::{InMemoryLedger, LedgerSource};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, loaded) = load_config(&cli.config)?;
    init_tracing(&config.logging);
    if !loaded {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    let registry = Arc::new(
        RegimeRegistry::from_config(&config).context("configuration failed validation")?,
    );
    {
        let plan = registry.snapshot().await;
        info!(
            active_regime = %plan.active_regime,
            regimes = plan.regime_names().count(),
            window_days = plan.window_days,
            currency_decimals = plan.currency_decimals,
            "Configuration loaded"
        );
    }

    if let Some(path) = &cli.fixture {
        if cli.migrate {
            warn!("--migrate has no effect with --fixture");
        }
        let ledger = InMemoryLedger::from_fixture_file(path)
            .with_context(|| format!("loading fixture {}", path.display()))?;
        return run(Arc::new(ledger), registry, &cli, &config).await;
    }

    let pg_config = PostgresConfig::new(&config.infrastructure.postgres_url)
        .with_max_connections(config.infrastructure.max_connections);
    let pool = PostgresPool::connect(&pg_config)
        .await
        .context("connecting to the ledger database")?;
    if cli.migrate {
        pool.run_migrations().await.context("running migrations")?;
    }

    let result = run(Arc::new(pool.ledger()), registry, &cli, &config).await;
    pool.close().await;
    result
}

/// Load the configuration file, falling back to defaults when it is absent.
///
/// Returns whether the file was found.
fn load_config(path: &Path) -> anyhow::Result<(BourseConfig, bool)> {
    if path.exists() {
        let config = BourseConfig::from_file(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((BourseConfig::parse("")?, false))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn run<S>(
    source: Arc<S>,
    registry: Arc<RegimeRegistry>,
    cli: &Cli,
    config: &BourseConfig,
) -> anyhow::Result<()>
where
    S: LedgerSource + 'static,
{
    let valuator = Valuator::new(source, registry);
    let board = Arc::new(SnapshotBoard::new());
    let control = Arc::new(BatchControl::new());

    if matches!(cli.command, Command::Revalue { .. }) {
        cancel_on_interrupt(Arc::clone(&control));
    }

    if cli.command == (Command::Revalue { watch: true }) {
        commands::watch(
            &valuator,
            &board,
            &control,
            &cli.config,
            cli.as_of,
            Duration::from_secs(config.batch.interval_secs),
            |report| print_json(&serde_json::to_value(report)?),
        )
        .await?;
        return Ok(());
    }

    let as_of = cli.as_of.unwrap_or_else(Utc::now);
    let output = commands::execute(&valuator, &board, &control, &cli.command, as_of).await?;
    print_json(&output)
}

/// Cancel batch work on Ctrl-C. Only installed for `revalue`, so other
/// commands keep the default interrupt behavior.
fn cancel_on_interrupt(control: Arc<BatchControl>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, cancelling batch");
                control.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to install interrupt handler"),
        }
    });
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
