//! YBI backtest runner: multi-day orchestration, inference and artifacts.
//!
//! Consumes the ledgers produced by `ybi-core`'s per-day simulator and
//! turns them into the daily P&L series, performance metrics, HAC and
//! bootstrap inference, the leakage and reconciliation audits, stress
//! probes and the on-disk artifact set.

pub mod bootstrap;
pub mod daily;
pub mod inference;
pub mod leakage;
pub mod metrics;
pub mod reconcile;
pub mod reporting;
pub mod runner;
pub mod stress;

pub use runner::{run_backtest, BacktestRun, RunError};
