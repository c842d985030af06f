//! Command-line arguments.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use bourse_types::EntityId;

/// Activity-weighted valuation engine.
#[derive(Debug, Parser)]
#[command(name = "bourse", version, about = "Activity-weighted valuation engine")]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(
        long,
        env = "BOURSE_CONFIG",
        default_value = "bourse-config.yaml",
        global = true
    )]
    pub config: PathBuf,

    /// Read the ledger from a JSON fixture instead of `PostgreSQL`.
    #[arg(long, global = true)]
    pub fixture: Option<PathBuf>,

    /// Valuation instant as RFC 3339. Defaults to the current time.
    #[arg(long, global = true, value_parser = parse_as_of)]
    pub as_of: Option<DateTime<Utc>>,

    /// Apply pending database migrations before running the command.
    #[arg(long, global = true)]
    pub migrate: bool,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands. Every command prints one JSON document per result to stdout.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Price one entity.
    Price {
        /// Entity id.
        entity: EntityId,
        /// Regime to price under. Defaults to the active regime.
        #[arg(long)]
        regime: Option<String>,
    },
    /// Price one entity under two regimes and report the delta.
    Compare {
        /// Entity id.
        entity: EntityId,
        /// Current regime.
        #[arg(long)]
        from: String,
        /// Candidate regime.
        #[arg(long)]
        to: String,
    },
    /// Compare two regimes across every tracked entity.
    Audit {
        /// Current regime.
        #[arg(long)]
        from: String,
        /// Candidate regime.
        #[arg(long)]
        to: String,
    },
    /// Forecast when a capped entity drops back under the cap.
    Forecast {
        /// Entity id.
        entity: EntityId,
        /// Regime whose cap to forecast against. Defaults to the active regime.
        #[arg(long)]
        regime: Option<String>,
        /// Explicit cap threshold in events.
        #[arg(long, conflicts_with = "regime")]
        threshold: Option<u64>,
    },
    /// Revalue every tracked entity under the active regime.
    Revalue {
        /// Repeat every `batch.interval_secs`, reloading the config before each pass.
        #[arg(long)]
        watch: bool,
    },
}

fn parse_as_of(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|at| at.with_timezone(&Utc))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "bourse",
            "price",
            "42",
            "--regime",
            "legacy",
            "--as-of",
            "2025-06-20T14:00:00+02:00",
            "--fixture",
            "ledger.json",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Command::Price {
                entity: EntityId(42),
                regime: Some("legacy".to_owned()),
            }
        );
        assert_eq!(
            cli.as_of,
            Utc.with_ymd_and_hms(2025, 6, 20, 12, 0, 0).single()
        );
        assert_eq!(cli.fixture, Some(PathBuf::from("ledger.json")));
        assert!(!cli.migrate);
    }

    #[test]
    fn malformed_as_of_is_rejected() {
        assert!(Cli::try_parse_from(["bourse", "--as-of", "yesterday", "revalue"]).is_err());
    }

    #[test]
    fn threshold_conflicts_with_regime() {
        assert!(
            Cli::try_parse_from([
                "bourse",
                "forecast",
                "7",
                "--regime",
                "legacy",
                "--threshold",
                "300",
            ])
            .is_err()
        );
    }

    #[test]
    fn revalue_watch_flag() {
        let cli = Cli::try_parse_from(["bourse", "revalue", "--watch"]).unwrap();
        assert_eq!(cli.command, Command::Revalue { watch: true });
    }
}
