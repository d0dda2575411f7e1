//! `run_backtest` — replay the YBI small-cap strategy over a date range.
//!
//! Exit codes:
//!   0  success
//!   2  configuration / usage / provider-auth error
//!   3  data unavailable for the entire range
//!   4  invariant violation or reconciliation failure

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;
use ybi_core::config::Config;
use ybi_core::data::{FixtureStore, MarketData, PolygonClient};
use ybi_runner::reporting::summary::{write_run_metadata, write_summary};
use ybi_runner::reporting::{write_run_artifacts, RunMetadata, Summary};
use ybi_runner::{run_backtest, RunError};

const EXIT_CONFIG: u8 = 2;
const EXIT_DATA_UNAVAILABLE: u8 = 3;
const EXIT_INVARIANT: u8 = 4;

#[derive(Parser, Debug)]
#[command(
    name = "run_backtest",
    about = "Reproducible intraday backtest for the YBI small-cap scalping strategy",
    version
)]
struct Cli {
    /// First day of the range, YYYY-MM-DD.
    #[arg(long)]
    start: NaiveDate,

    /// Last day of the range (inclusive), YYYY-MM-DD.
    #[arg(long)]
    end: NaiveDate,

    /// Path to the YAML configuration.
    #[arg(long)]
    config: PathBuf,

    /// Output directory for artifacts.
    #[arg(long, default_value = "results")]
    out: PathBuf,

    /// Run against a JSON fixture file instead of the live provider.
    #[arg(long)]
    offline_fixtures: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    if cli.start > cli.end {
        error!("--start must not be after --end");
        return ExitCode::from(EXIT_CONFIG);
    }

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let data: Box<dyn MarketData> = if let Some(path) = &cli.offline_fixtures {
        match FixtureStore::from_file(path) {
            Ok(store) => Box::new(store),
            Err(e) => {
                error!("{e}");
                return ExitCode::from(EXIT_CONFIG);
            }
        }
    } else {
        match PolygonClient::from_env() {
            Ok(client) => Box::new(client),
            Err(e) => {
                error!("{e}");
                return ExitCode::from(EXIT_CONFIG);
            }
        }
    };

    let run = match run_backtest(&config, data.as_ref(), cli.start, cli.end) {
        Ok(run) => run,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(match e {
                RunError::Config(_) | RunError::Auth(_) => EXIT_CONFIG,
                RunError::DataUnavailableAllDays => EXIT_DATA_UNAVAILABLE,
                RunError::Invariant(_)
                | RunError::LeakageFailure(_)
                | RunError::ReconciliationFailure(..) => EXIT_INVARIANT,
            });
        }
    };

    let export = write_run_artifacts(&cli.out, &run)
        .and_then(|()| write_summary(&cli.out.join("summary.json"), &Summary::from_run(&run)))
        .and_then(|()| {
            write_run_metadata(&cli.out.join("run_metadata.json"), &RunMetadata::from_run(&run))
        });
    if let Err(e) = export {
        error!("artifact export failed: {e:#}");
        return ExitCode::from(EXIT_CONFIG);
    }

    println!(
        "{} eligible days, {} trades, total P&L {:.2} (p = {:.4} HAC); artifacts in {}",
        run.daily.len(),
        run.trades.len(),
        run.metrics.total_pnl,
        run.hac.p_value,
        cli.out.display()
    );
    ExitCode::SUCCESS
}
