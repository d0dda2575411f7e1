//! End-to-end scenarios through the full stack: watchlist selection,
//! feature pipeline, strategy, simulator, inference and artifact export,
//! all driven from an in-memory fixture store.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;
use ybi_core::calendar::SessionClock;
use ybi_core::config::Config;
use ybi_core::data::FixtureStore;
use ybi_core::domain::{Bar, DailyBar, DayStatus, ExitReason, ReferenceRecord, Side};
use ybi_runner::reporting::summary::{write_run_metadata, write_summary};
use ybi_runner::reporting::{write_run_artifacts, RunMetadata, Summary};
use ybi_runner::run_backtest;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn daily(date: NaiveDate, open: f64, close: f64, volume: f64) -> DailyBar {
    DailyBar { date, open, high: close.max(open), low: close.min(open), close, volume }
}

fn flat_bar(ts: DateTime<Utc>, px: f64) -> Bar {
    Bar::new(ts, px, px + 0.02, px - 0.02, px, 10_000.0)
}

/// Config with frictionless fills and a wide notional cap so the hand
/// built tapes control the arithmetic exactly.
fn test_config() -> Config {
    let mut config = Config::default();
    config.fills.slippage_bps = 0.0;
    config.fills.spread_cents = 0.0;
    config.fills.fees_per_trade = 1.0;
    config.strategy.stop_buffer_pct = 0.0;
    config.risk.max_position_notional_pct = 1.0;
    config
}

/// Premarket ramp that warms every indicator, then an RTH tape whose
/// second bar crosses the premarket high (signal) so the third bar fills
/// the entry, and whose fourth bar gaps down through the stop.
fn gap_through_tape(date: NaiveDate) -> Vec<Bar> {
    let clock = SessionClock::default();
    let pm_start = clock.premarket_start_instant(date);
    let open_ts = clock.rth_open_instant(date);

    let mut bars = Vec::new();
    for i in 0..240 {
        bars.push(flat_bar(pm_start + Duration::minutes(i), 9.0 + 0.002 * i as f64));
    }
    bars.push(flat_bar(open_ts, 9.40));
    bars.push(Bar::new(open_ts + Duration::minutes(1), 9.45, 9.60, 9.42, 9.55, 20_000.0));
    bars.push(Bar::new(open_ts + Duration::minutes(2), 9.58, 9.59, 9.50, 9.58, 20_000.0));
    bars.push(Bar::new(open_ts + Duration::minutes(3), 9.30, 9.35, 9.20, 9.25, 30_000.0));
    bars.push(flat_bar(open_ts + Duration::minutes(4), 9.30));
    bars
}

/// Fixture: GAPR gaps 88% and trades; SNOW (no reference record) gaps 8%;
/// ABCP gaps 40% but reference data marks it preferred.
fn base_fixture() -> FixtureStore {
    let mut store = FixtureStore::new();
    let prev = d(2025, 2, 28);
    let day = d(2025, 3, 3);

    let mut prev_rows = BTreeMap::new();
    prev_rows.insert("GAPR".to_string(), daily(prev, 5.0, 5.0, 2_000_000.0));
    prev_rows.insert("SNOW".to_string(), daily(prev, 10.0, 10.0, 5_000_000.0));
    prev_rows.insert("ABCP".to_string(), daily(prev, 5.0, 5.0, 3_000_000.0));
    store.insert_grouped(prev, prev_rows);

    let mut day_rows = BTreeMap::new();
    day_rows.insert("GAPR".to_string(), daily(day, 9.40, 9.30, 900_000.0));
    day_rows.insert("SNOW".to_string(), daily(day, 10.8, 10.9, 2_000_000.0));
    day_rows.insert("ABCP".to_string(), daily(day, 7.0, 7.0, 800_000.0));
    store.insert_grouped(day, day_rows);

    store.insert_reference(ReferenceRecord {
        ticker: "GAPR".into(),
        asset_type: "CS".into(),
        is_common_stock: true,
        active: true,
    });
    store.insert_reference(ReferenceRecord {
        ticker: "ABCP".into(),
        asset_type: "PFD".into(),
        is_common_stock: false,
        active: true,
    });

    store.insert_minute_bars("GAPR", day, gap_through_tape(day));
    store
}

/// Base fixture plus a provider outage on 2025-03-04.
fn scenario_fixture() -> FixtureStore {
    let mut store = base_fixture();
    store.mark_error_day(d(2025, 3, 4));
    store
}

#[test]
fn gap_through_stop_round_trip_end_to_end() {
    let store = scenario_fixture();
    let config = test_config();
    let run = run_backtest(&config, &store, d(2025, 3, 3), d(2025, 3, 3)).unwrap();

    assert_eq!(run.trades.len(), 1, "trades: {:?}", run.trades);
    let trade = &run.trades[0];
    assert_eq!(trade.ticker, "GAPR");
    assert_eq!(trade.exit_reason, ExitReason::StopHitGapThrough);
    assert!((trade.entry_px - 9.58).abs() < 1e-9);
    assert!((trade.avg_exit_px - 9.30).abs() < 1e-9);
    assert!(trade.stop_px_initial < trade.entry_px);
    assert!(trade.signal_ts < trade.entry_ts);
    assert!(trade.signal_ts < trade.exit_ts);

    // Fee charged exactly once, on the final exit.
    let fees: f64 = run.fills.iter().map(|f| f.fee).sum();
    assert!((fees - 1.0).abs() < 1e-9);
    let expected = (9.30 - 9.58) * f64::from(trade.original_qty) - 1.0;
    assert!((trade.pnl_total - expected).abs() < 1e-6);

    // run_backtest returning Ok already implies the leakage audit and the
    // reconciliation both passed.
    assert!(run.leakage.is_valid);
    assert!(run.reconciliation.is_consistent);
}

#[test]
fn watchlist_excludes_preferred_but_keeps_ambiguous_common() {
    let store = scenario_fixture();
    let config = test_config();
    let run = run_backtest(&config, &store, d(2025, 3, 3), d(2025, 3, 3)).unwrap();

    let tickers: Vec<&str> = run.watchlist.iter().map(|w| w.ticker.as_str()).collect();
    // Reference data is authoritative: ABCP (preferred) is out despite the
    // larger gap. SNOW has no reference record and the ambiguous trailing-W
    // pattern does not apply to 4-letter symbols.
    assert!(tickers.contains(&"GAPR"));
    assert!(tickers.contains(&"SNOW"));
    assert!(!tickers.contains(&"ABCP"));
    // Ranked by gap: GAPR 88% before SNOW 8%.
    assert_eq!(run.watchlist[0].ticker, "GAPR");
    assert_eq!(run.watchlist[0].rank, 1);
}

#[test]
fn error_day_is_excluded_and_counted() {
    let store = scenario_fixture();
    let config = test_config();
    let run = run_backtest(&config, &store, d(2025, 3, 3), d(2025, 3, 4)).unwrap();

    assert_eq!(run.days_with_errors, 1);
    let audit = run.audits.iter().find(|a| a.date == d(2025, 3, 4)).unwrap();
    assert_eq!(audit.status, DayStatus::Error);

    // The inference denominators see only the eligible day.
    assert_eq!(run.daily.len(), 1);
    assert_eq!(run.hac.n_days, 1);
    assert_eq!(run.bootstrap.n_days, 1);
    assert!(!run.daily.dates().contains(&d(2025, 3, 4)));
}

#[test]
fn eligible_no_trade_day_counts_as_zero() {
    let mut store = base_fixture();
    // A later trading day with a watchlist but no minute bars: no setup
    // can fire, so the day is eligible with zero P&L. 03-04 has no grouped
    // data at all, which is a no-watchlist day, also eligible.
    let mut rows = BTreeMap::new();
    rows.insert("GAPR".to_string(), daily(d(2025, 3, 5), 10.2, 10.2, 700_000.0));
    store.insert_grouped(d(2025, 3, 5), rows);

    let config = test_config();
    let run = run_backtest(&config, &store, d(2025, 3, 3), d(2025, 3, 5)).unwrap();

    let audit = run.audits.iter().find(|a| a.date == d(2025, 3, 5)).unwrap();
    assert_eq!(audit.status, DayStatus::NoTrades);
    let row = run.daily.rows.iter().find(|r| r.date == d(2025, 3, 5)).unwrap();
    assert_eq!(row.pnl, 0.0);
    assert_eq!(row.trades, 0);
    // All three days are eligible: traded, no-watchlist, no-trades.
    let empty_audit = run.audits.iter().find(|a| a.date == d(2025, 3, 4)).unwrap();
    assert_eq!(empty_audit.status, DayStatus::NoWatchlist);
    assert_eq!(run.daily.len(), 3);
    assert_eq!(run.metrics.trading_days_in_sample, 3);
}

#[test]
fn artifacts_round_trip_and_daily_metrics_omit_error_days() {
    let store = scenario_fixture();
    let config = test_config();
    let run = run_backtest(&config, &store, d(2025, 3, 3), d(2025, 3, 4)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    write_run_artifacts(dir.path(), &run).unwrap();
    write_summary(&dir.path().join("summary.json"), &Summary::from_run(&run)).unwrap();
    write_run_metadata(&dir.path().join("run_metadata.json"), &RunMetadata::from_run(&run))
        .unwrap();

    for name in [
        "watchlist.csv",
        "fills.csv",
        "trades.csv",
        "day_audit.csv",
        "daily_metrics.csv",
        "summary.json",
        "run_metadata.json",
    ] {
        assert!(dir.path().join(name).exists(), "missing artifact {name}");
    }

    let daily_csv = std::fs::read_to_string(dir.path().join("daily_metrics.csv")).unwrap();
    assert!(daily_csv.contains("2025-03-03"));
    assert!(!daily_csv.contains("2025-03-04"), "error day must be absent:\n{daily_csv}");

    let audit_csv = std::fs::read_to_string(dir.path().join("day_audit.csv")).unwrap();
    assert!(audit_csv.contains("2025-03-04,error"));

    let summary = std::fs::read_to_string(dir.path().join("summary.json")).unwrap();
    assert!(summary.contains("\"days_with_errors\": 1"));

    let metadata = std::fs::read_to_string(dir.path().join("run_metadata.json")).unwrap();
    assert!(metadata.contains("\"selection_method\": \"gap_open\""));
    assert!(metadata.contains("\"max_candidates_to_scan\""));
    assert!(metadata.contains("\"random_seed\""));
}

#[test]
fn identical_inputs_give_byte_identical_watchlists() {
    let store = scenario_fixture();
    let config = test_config();

    let dir = tempfile::tempdir().unwrap();
    let run_a = run_backtest(&config, &store, d(2025, 3, 3), d(2025, 3, 3)).unwrap();
    let run_b = run_backtest(&config, &store, d(2025, 3, 3), d(2025, 3, 3)).unwrap();
    write_run_artifacts(&dir.path().join("a"), &run_a).unwrap();
    write_run_artifacts(&dir.path().join("b"), &run_b).unwrap();

    for name in ["watchlist.csv", "fills.csv", "trades.csv", "daily_metrics.csv"] {
        let a = std::fs::read(dir.path().join("a").join(name)).unwrap();
        let b = std::fs::read(dir.path().join("b").join(name)).unwrap();
        assert_eq!(a, b, "{name} differs between identical runs");
    }
}

#[test]
fn trade_counter_and_cooldown_laws_hold_on_the_ledger() {
    let store = scenario_fixture();
    let config = test_config();
    let run = run_backtest(&config, &store, d(2025, 3, 3), d(2025, 3, 3)).unwrap();

    // Counter law: BUY fills per (date, ticker) never exceed the cap.
    let mut buys: BTreeMap<(&str, NaiveDate), u32> = BTreeMap::new();
    for fill in run.fills.iter().filter(|f| f.side == Side::Buy) {
        *buys.entry((fill.ticker.as_str(), fill.ts.date_naive())).or_insert(0) += 1;
    }
    for count in buys.values() {
        assert!(*count <= config.risk.max_trades_per_day);
    }

    // Cooldown law: no entry within cooldown_minutes of a stop-out exit.
    let cooldown = Duration::minutes(config.strategy.cooldown_minutes);
    for trade in &run.trades {
        if trade.exit_reason == ExitReason::StopHit
            || trade.exit_reason == ExitReason::StopHitGapThrough
            || trade.exit_reason == ExitReason::FailedBreakout
        {
            for fill in run.fills.iter().filter(|f| {
                f.side == Side::Buy
                    && f.ticker == trade.ticker
                    && f.ts > trade.exit_ts
                    && f.ts < trade.exit_ts + cooldown
            }) {
                panic!("entry at {} inside cooldown after stop at {}", fill.ts, trade.exit_ts);
            }
        }
    }

    // Integer-share and stop-validity laws.
    for trade in &run.trades {
        assert!(trade.original_qty >= 1);
        assert!(trade.stop_px_initial < trade.entry_px);
    }
}

#[test]
fn halted_ticker_force_flats_on_its_own_last_bar() {
    let mut store = scenario_fixture();
    let date = d(2025, 3, 3);
    let clock = SessionClock::default();
    let open_ts = clock.rth_open_instant(date);

    // Rebuild GAPR's tape so the position survives, then the feed halts at
    // 09:33 while SNOW keeps printing until 09:40.
    let mut halted = Vec::new();
    let pm_start = clock.premarket_start_instant(date);
    for i in 0..240 {
        halted.push(flat_bar(pm_start + Duration::minutes(i), 9.0 + 0.002 * i as f64));
    }
    halted.push(flat_bar(open_ts, 9.40));
    halted.push(Bar::new(open_ts + Duration::minutes(1), 9.45, 9.60, 9.42, 9.55, 20_000.0));
    halted.push(Bar::new(open_ts + Duration::minutes(3), 9.58, 9.59, 9.55, 9.58, 20_000.0));
    store.insert_minute_bars("GAPR", date, halted);

    let snow: Vec<Bar> = (0..11).map(|i| flat_bar(open_ts + Duration::minutes(i), 10.8)).collect();
    store.insert_minute_bars("SNOW", date, snow);

    let config = test_config();
    let run = run_backtest(&config, &store, date, date).unwrap();

    let trade = run
        .trades
        .iter()
        .find(|t| t.ticker == "GAPR")
        .expect("halted ticker still round-trips");
    assert_eq!(trade.exit_reason, ExitReason::ForceFlat);
    assert_eq!(trade.exit_ts, open_ts + Duration::minutes(3));
    assert!((trade.avg_exit_px - 9.58).abs() < 1e-9);
}
