//! Multi-day run orchestration.
//!
//! Walks the calendar, builds each day's watchlist, fetches that day's
//! bars, replays the day through the simulator, and finishes with the
//! inference and audit layer. Per-day `Unavailable` failures downgrade the
//! day to `status=error`; invariant violations and reconciliation
//! failures abort the run with no partial results trusted.

use crate::bootstrap::{block_bootstrap_test, BootstrapResult};
use crate::daily::DailySeries;
use crate::inference::{daily_series_inference, HacInference};
use crate::leakage::{leakage_audit, LeakageAudit};
use crate::metrics::PerformanceMetrics;
use crate::reconcile::{reconcile_trades_and_fills, Reconciliation};
use crate::stress::{date_shuffle_stress, time_shift_stress, StressTestResult};
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{info, warn};
use ybi_core::calendar::{self, SessionClock};
use ybi_core::config::{Config, ConfigError};
use ybi_core::data::{DataError, MarketData};
use ybi_core::domain::{
    DailyBar, DayAudit, DayStatus, FillRecord, RejectedIntent, TradeRecord, WatchlistItem,
};
use ybi_core::engine::{simulate_day, DayInput, EngineError};
use ybi_core::universe::build_watchlist;

const STRESS_SIMULATIONS: usize = 1_000;
const STRESS_SHIFT_MINUTES: u32 = 5;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("provider authentication failed: {0}")]
    Auth(String),

    #[error("data unavailable for the entire range")]
    DataUnavailableAllDays,

    #[error(transparent)]
    Invariant(#[from] EngineError),

    #[error("leakage audit failed: {0} ordering violations")]
    LeakageFailure(usize),

    #[error("reconciliation failed: {0} trades off, global difference ${1:.4}")]
    ReconciliationFailure(usize, f64),
}

/// Everything a finished run produced, ready for reporting.
#[derive(Debug)]
pub struct BacktestRun {
    pub config: Config,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub watchlist: Vec<WatchlistItem>,
    pub trades: Vec<TradeRecord>,
    pub fills: Vec<FillRecord>,
    pub rejected: Vec<RejectedIntent>,
    pub audits: Vec<DayAudit>,
    pub daily: DailySeries,
    pub days_with_errors: usize,
    pub metrics: PerformanceMetrics,
    pub hac: HacInference,
    pub bootstrap: BootstrapResult,
    pub leakage: LeakageAudit,
    pub reconciliation: Reconciliation,
    pub stress_time_shift: StressTestResult,
    pub stress_date_shuffle: StressTestResult,
}

pub fn run_backtest(
    config: &Config,
    data: &dyn MarketData,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BacktestRun, RunError> {
    let clock = config.session_clock()?;

    let mut watchlist = Vec::new();
    let mut trades = Vec::new();
    let mut fills = Vec::new();
    let mut rejected = Vec::new();
    let mut audits = Vec::new();
    let mut days_with_errors = 0usize;
    let mut trading_days_seen = 0usize;

    let mut date = start;
    while date <= end {
        if calendar::is_weekend(date) {
            date += Duration::days(1);
            continue;
        }
        if !calendar::is_trading_day(date) {
            audits.push(DayAudit {
                date,
                status: DayStatus::HolidayClosed,
                reason: "market holiday".into(),
            });
            date += Duration::days(1);
            continue;
        }
        trading_days_seen += 1;

        match run_day(config, &clock, data, date) {
            Ok(outcome) => {
                let status = match &outcome.result {
                    None => DayStatus::NoWatchlist,
                    Some(result) if result.trades.is_empty() => DayStatus::NoTrades,
                    Some(_) => DayStatus::Ok,
                };
                audits.push(DayAudit { date, status, reason: outcome.reason });
                watchlist.extend(outcome.items);
                if let Some(result) = outcome.result {
                    trades.extend(result.trades);
                    fills.extend(result.fills);
                    rejected.extend(result.rejected);
                }
            }
            Err(DayFailure::Unavailable(message)) => {
                warn!(%date, message, "day downgraded to error");
                days_with_errors += 1;
                audits.push(DayAudit { date, status: DayStatus::Error, reason: message });
            }
            Err(DayFailure::Auth(message)) => return Err(RunError::Auth(message)),
            Err(DayFailure::Engine(e)) => return Err(RunError::Invariant(e)),
        }
        date += Duration::days(1);
    }

    if trading_days_seen > 0 && days_with_errors == trading_days_seen {
        return Err(RunError::DataUnavailableAllDays);
    }

    let daily = DailySeries::build(&audits, &trades);
    let daily_pnl = daily.pnl();
    let trade_pnl: Vec<f64> = trades.iter().map(|t| t.pnl_total).collect();

    let metrics = PerformanceMetrics::compute(&trades, &daily);
    let hac = daily_series_inference(&daily_pnl);
    let bootstrap = block_bootstrap_test(
        &daily_pnl,
        config.inference.bootstrap_block_len,
        config.inference.n_bootstrap,
        config.inference.random_seed,
    );
    let leakage = leakage_audit(&trades);
    if !leakage.is_valid {
        return Err(RunError::LeakageFailure(
            leakage.signal_after_entry_violations + leakage.signal_after_exit_violations,
        ));
    }
    let reconciliation = reconcile_trades_and_fills(&trades, &fills);
    if !reconciliation.is_consistent {
        return Err(RunError::ReconciliationFailure(
            reconciliation.trades_with_discrepancy,
            reconciliation.global_difference,
        ));
    }

    let seed = config.inference.random_seed;
    let stress_time_shift =
        time_shift_stress(&trade_pnl, STRESS_SHIFT_MINUTES, STRESS_SIMULATIONS, seed.wrapping_add(1));
    let stress_date_shuffle =
        date_shuffle_stress(&daily_pnl, STRESS_SIMULATIONS, seed.wrapping_add(2));

    info!(
        eligible_days = daily.len(),
        error_days = days_with_errors,
        trades = trades.len(),
        "run complete"
    );

    Ok(BacktestRun {
        config: config.clone(),
        start,
        end,
        watchlist,
        trades,
        fills,
        rejected,
        audits,
        daily,
        days_with_errors,
        metrics,
        hac,
        bootstrap,
        leakage,
        reconciliation,
        stress_time_shift,
        stress_date_shuffle,
    })
}

struct DayOutcome {
    items: Vec<WatchlistItem>,
    result: Option<ybi_core::engine::DayResult>,
    reason: String,
}

enum DayFailure {
    Unavailable(String),
    Auth(String),
    Engine(EngineError),
}

impl From<DataError> for DayFailure {
    fn from(e: DataError) -> Self {
        match e {
            DataError::Auth(message) => DayFailure::Auth(message),
            other => DayFailure::Unavailable(other.to_string()),
        }
    }
}

fn run_day(
    config: &Config,
    clock: &SessionClock,
    data: &dyn MarketData,
    date: NaiveDate,
) -> Result<DayOutcome, DayFailure> {
    let items = build_watchlist(data, clock, &config.universe, &config.watchlist, date)?;
    if items.is_empty() {
        return Ok(DayOutcome {
            items,
            result: None,
            reason: "no candidates passed selection".into(),
        });
    }

    let mut bars = BTreeMap::new();
    for item in &items {
        match data.minute_bars(&item.ticker, date, true) {
            Ok(minute_bars) if !minute_bars.is_empty() => {
                bars.insert(item.ticker.clone(), minute_bars);
            }
            Ok(_) => {}
            Err(DataError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    let prev_daily = prev_session_daily(data, date, &items);
    let input = DayInput { date, bars, prev_daily };
    let result = simulate_day(config, clock, &input).map_err(DayFailure::Engine)?;

    let reason = format!("{} trades across {} tickers", result.trades.len(), items.len());
    Ok(DayOutcome { items, result: Some(result), reason })
}

/// Previous-session daily bars for PDH/PDL. Best effort: a miss only
/// removes one level from the ladder, so failures degrade to empty.
fn prev_session_daily(
    data: &dyn MarketData,
    date: NaiveDate,
    items: &[WatchlistItem],
) -> HashMap<String, DailyBar> {
    let mut rows = HashMap::new();
    let prev = calendar::prev_trading_day_with_data(date, |candidate| {
        matches!(data.grouped_daily(candidate), Ok(map) if !map.is_empty())
    });
    if let Some(prev_date) = prev {
        if let Ok(map) = data.grouped_daily(prev_date) {
            for item in items {
                if let Some(daily) = map.get(&item.ticker) {
                    rows.insert(item.ticker.clone(), daily.clone());
                }
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use ybi_core::data::FixtureStore;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn daily(date: NaiveDate, open: f64, close: f64, volume: f64) -> DailyBar {
        DailyBar { date, open, high: close.max(open), low: close.min(open), close, volume }
    }

    fn fixture_with_watchlist_day(day: NaiveDate, prev: NaiveDate) -> FixtureStore {
        let mut store = FixtureStore::new();
        let mut prev_rows = BTreeMap::new();
        prev_rows.insert("GAPR".to_string(), daily(prev, 5.0, 5.0, 2_000_000.0));
        store.insert_grouped(prev, prev_rows);

        let mut day_rows = BTreeMap::new();
        day_rows.insert("GAPR".to_string(), daily(day, 6.0, 6.1, 400_000.0));
        store.insert_grouped(day, day_rows);
        store
    }

    #[test]
    fn tradeless_watchlist_day_is_no_trades() {
        // Watchlist selects GAPR but there are no minute bars, so the day
        // simulates to zero trades.
        let store = fixture_with_watchlist_day(d(2025, 3, 3), d(2025, 2, 28));
        let config = Config::default();
        let run = run_backtest(&config, &store, d(2025, 3, 3), d(2025, 3, 3)).unwrap();

        assert_eq!(run.audits.len(), 1);
        assert_eq!(run.audits[0].status, DayStatus::NoTrades);
        assert_eq!(run.daily.len(), 1);
        assert_eq!(run.daily.rows[0].pnl, 0.0);
        assert_eq!(run.watchlist.len(), 1);
    }

    #[test]
    fn error_day_is_excluded_from_daily_series() {
        let mut store = fixture_with_watchlist_day(d(2025, 3, 4), d(2025, 3, 3));
        // 2025-03-03 exists as the prior session; 03-05 is an outage.
        let mut rows = BTreeMap::new();
        rows.insert("GAPR".to_string(), daily(d(2025, 3, 4), 6.0, 6.0, 500_000.0));
        store.insert_grouped(d(2025, 3, 4), rows);
        store.mark_error_day(d(2025, 3, 5));

        let config = Config::default();
        let run = run_backtest(&config, &store, d(2025, 3, 4), d(2025, 3, 5)).unwrap();

        assert_eq!(run.days_with_errors, 1);
        let error_audit = run.audits.iter().find(|a| a.date == d(2025, 3, 5)).unwrap();
        assert_eq!(error_audit.status, DayStatus::Error);
        // The error day is absent from the eligible series.
        assert!(!run.daily.dates().contains(&d(2025, 3, 5)));
        assert_eq!(run.hac.n_days, run.daily.len());
        assert_eq!(run.bootstrap.n_days, run.daily.len());
    }

    #[test]
    fn holiday_is_audited_and_skipped() {
        let store = FixtureStore::new();
        let config = Config::default();
        // 2025-07-04 (Friday) is Independence Day.
        let run = run_backtest(&config, &store, d(2025, 7, 4), d(2025, 7, 4)).unwrap();
        assert_eq!(run.audits.len(), 1);
        assert_eq!(run.audits[0].status, DayStatus::HolidayClosed);
        assert!(run.daily.is_empty());
    }

    #[test]
    fn all_error_range_fails_with_data_unavailable() {
        let mut store = FixtureStore::new();
        // A healthy prior session so the outage is hit on the target days.
        let mut prev_rows = BTreeMap::new();
        prev_rows.insert("GAPR".to_string(), daily(d(2025, 2, 28), 5.0, 5.0, 2_000_000.0));
        store.insert_grouped(d(2025, 2, 28), prev_rows);
        store.mark_error_day(d(2025, 3, 3));
        store.mark_error_day(d(2025, 3, 4));
        let config = Config::default();
        let result = run_backtest(&config, &store, d(2025, 3, 3), d(2025, 3, 4));
        assert!(matches!(result, Err(RunError::DataUnavailableAllDays)));
    }

    #[test]
    fn empty_market_is_no_watchlist_not_error() {
        let store = FixtureStore::new();
        let config = Config::default();
        let run = run_backtest(&config, &store, d(2025, 3, 3), d(2025, 3, 3)).unwrap();
        assert_eq!(run.audits[0].status, DayStatus::NoWatchlist);
        assert_eq!(run.daily.len(), 1);
        assert_eq!(run.metrics.trading_days_in_sample, 1);
    }

    #[test]
    fn bootstrap_observed_mean_matches_metrics() {
        let store = fixture_with_watchlist_day(d(2025, 3, 3), d(2025, 2, 28));
        let config = Config::default();
        let run = run_backtest(&config, &store, d(2025, 3, 3), d(2025, 3, 3)).unwrap();
        assert_eq!(run.bootstrap.observed_mean_daily_pnl, run.metrics.mean_daily_pnl);
        assert_eq!(run.hac.mean_daily_pnl, run.metrics.mean_daily_pnl);
    }
}
