//! Daily watchlist construction.
//!
//! Both selection methods use only data with timestamps strictly before
//! the decision point: previous-session grouped aggregates, today's opens
//! (known at 09:30) for `gap_open`, and premarket minute bars up to 09:29
//! for `premarket_gap`. Candidate pre-selection for the premarket scan is
//! deterministic: filter, sort by previous-day volume descending (ticker
//! ascending on ties), truncate to `max_candidates_to_scan`.

use crate::calendar::{prev_trading_day_with_data, SessionClock};
use crate::config::{UniverseConfig, WatchlistConfig};
use crate::data::{DataError, MarketData};
use crate::domain::{DailyBar, SelectionMethod, WatchlistItem};
use crate::universe::hygiene;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Build the ordered watchlist for day `date`, capped at `top_n`.
///
/// Returns an empty list when no candidate passes (a `no_watchlist` day).
/// `Unavailable` errors propagate so the caller can flag the whole day.
pub fn build_watchlist(
    data: &dyn MarketData,
    clock: &SessionClock,
    universe: &UniverseConfig,
    watchlist: &WatchlistConfig,
    date: NaiveDate,
) -> Result<Vec<WatchlistItem>, DataError> {
    let Some(prev) = fetch_prev_session(data, date)? else {
        debug!(%date, "no prior session with data");
        return Ok(Vec::new());
    };
    let (prev_date, prev_rows) = prev;
    debug!(%date, %prev_date, candidates = prev_rows.len(), "previous session loaded");

    match watchlist.method {
        SelectionMethod::GapOpen => {
            gap_open_watchlist(data, universe, watchlist, date, &prev_rows)
        }
        SelectionMethod::PremarketGap => {
            premarket_gap_watchlist(data, clock, universe, watchlist, date, &prev_rows)
        }
    }
}

/// Walk back from `date` to the most recent trading day whose grouped
/// aggregates actually exist. Transport failures abort the walk and flag
/// the day.
fn fetch_prev_session(
    data: &dyn MarketData,
    date: NaiveDate,
) -> Result<Option<(NaiveDate, BTreeMap<String, DailyBar>)>, DataError> {
    let mut found: Option<(NaiveDate, BTreeMap<String, DailyBar>)> = None;
    let mut failure: Option<DataError> = None;

    prev_trading_day_with_data(date, |candidate| match data.grouped_daily(candidate) {
        Ok(rows) if !rows.is_empty() => {
            found = Some((candidate, rows));
            true
        }
        Ok(_) => false,
        Err(e) => {
            failure = Some(e);
            true // stop walking; the error propagates below
        }
    });

    if let Some(e) = failure {
        return Err(e);
    }
    Ok(found)
}

fn passes_universe(
    data: &dyn MarketData,
    universe: &UniverseConfig,
    ticker: &str,
    prev_close: f64,
) -> bool {
    if prev_close < universe.price_min || prev_close > universe.price_max {
        return false;
    }
    let reference = if universe.use_reference_data {
        data.reference(ticker).ok().flatten()
    } else {
        None
    };
    hygiene::is_clean(ticker, reference.as_ref())
}

fn gap_open_watchlist(
    data: &dyn MarketData,
    universe: &UniverseConfig,
    watchlist: &WatchlistConfig,
    date: NaiveDate,
    prev_rows: &BTreeMap<String, DailyBar>,
) -> Result<Vec<WatchlistItem>, DataError> {
    let today = data.grouped_daily(date)?;
    if today.is_empty() {
        return Ok(Vec::new());
    }

    let mut ranked: Vec<(String, f64, f64)> = Vec::new();
    for (ticker, daily) in &today {
        let Some(prev) = prev_rows.get(ticker) else {
            continue;
        };
        if prev.close <= 0.0 || daily.open <= 0.0 {
            continue;
        }
        if !passes_universe(data, universe, ticker, prev.close) {
            continue;
        }
        let gap = daily.open / prev.close - 1.0;
        if gap < watchlist.min_gap_pct {
            continue;
        }
        ranked.push((ticker.clone(), gap, prev.close));
    }

    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    ranked.truncate(watchlist.top_n);

    Ok(ranked
        .into_iter()
        .enumerate()
        .map(|(i, (ticker, gap, prev_close))| WatchlistItem {
            date,
            ticker,
            prev_close,
            premarket_high: None,
            premarket_low: None,
            premarket_volume: 0.0,
            premarket_dollar_volume: 0.0,
            premarket_pct: None,
            gap_open_pct: Some(gap),
            selection_method: SelectionMethod::GapOpen,
            rank: i + 1,
        })
        .collect())
}

fn premarket_gap_watchlist(
    data: &dyn MarketData,
    clock: &SessionClock,
    universe: &UniverseConfig,
    watchlist: &WatchlistConfig,
    date: NaiveDate,
    prev_rows: &BTreeMap<String, DailyBar>,
) -> Result<Vec<WatchlistItem>, DataError> {
    // Deterministic candidate pool: hygiene + price filter, then previous
    // day's volume descending, truncated before any premarket fetch.
    let mut candidates: Vec<(&String, &DailyBar)> = prev_rows
        .iter()
        .filter(|(ticker, prev)| {
            prev.close > 0.0 && passes_universe(data, universe, ticker, prev.close)
        })
        .collect();
    candidates.sort_by(|a, b| {
        b.1.volume
            .partial_cmp(&a.1.volume)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(b.0))
    });
    candidates.truncate(universe.max_candidates_to_scan);

    let pm_start = clock.premarket_start_instant(date);
    let pm_end = clock.premarket_end_instant(date);

    let mut ranked: Vec<WatchlistItem> = Vec::new();
    for (ticker, prev) in candidates {
        // A ticker missing from the minute feed is normal; only transport
        // failures flag the day.
        let bars = match data.minute_bars(ticker, date, true) {
            Ok(bars) => bars,
            Err(DataError::NotFound(_)) => continue,
            Err(e) => return Err(e),
        };
        let premarket: Vec<_> = bars
            .iter()
            .filter(|b| b.ts >= pm_start && b.ts <= pm_end)
            .collect();
        let Some(last) = premarket.last() else {
            continue;
        };

        let pmh = premarket.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let pml = premarket.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let volume: f64 = premarket.iter().map(|b| b.volume).sum();
        let dollar_volume: f64 = premarket.iter().map(|b| b.close * b.volume).sum();
        let pct = last.close / prev.close - 1.0;

        if pct < watchlist.min_premarket_pct
            || volume < watchlist.min_premarket_volume
            || dollar_volume < watchlist.min_premarket_dollar_volume
        {
            continue;
        }

        ranked.push(WatchlistItem {
            date,
            ticker: ticker.clone(),
            prev_close: prev.close,
            premarket_high: Some(pmh),
            premarket_low: Some(pml),
            premarket_volume: volume,
            premarket_dollar_volume: dollar_volume,
            premarket_pct: Some(pct),
            gap_open_pct: None,
            selection_method: SelectionMethod::PremarketGap,
            rank: 0,
        });
    }

    ranked.sort_by(|a, b| {
        b.premarket_pct
            .partial_cmp(&a.premarket_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.ticker.cmp(&b.ticker))
    });
    ranked.truncate(watchlist.top_n);
    for (i, item) in ranked.iter_mut().enumerate() {
        item.rank = i + 1;
    }
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FixtureStore;
    use crate::domain::{Bar, ReferenceRecord};
    use chrono::{TimeZone, Utc};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn daily(date: NaiveDate, open: f64, close: f64, volume: f64) -> DailyBar {
        DailyBar { date, open, high: close.max(open), low: close.min(open), close, volume }
    }

    fn store_with_gap_day() -> FixtureStore {
        let mut store = FixtureStore::new();
        let prev = d(2025, 2, 28);
        let day = d(2025, 3, 3);

        let mut prev_rows = BTreeMap::new();
        prev_rows.insert("GAPR".to_string(), daily(prev, 5.0, 5.0, 2_000_000.0));
        prev_rows.insert("FLAT".to_string(), daily(prev, 5.0, 5.0, 1_000_000.0));
        prev_rows.insert("ABCP".to_string(), daily(prev, 5.0, 5.0, 3_000_000.0));
        store.insert_grouped(prev, prev_rows);

        let mut day_rows = BTreeMap::new();
        day_rows.insert("GAPR".to_string(), daily(day, 6.0, 6.2, 500_000.0)); // +20% gap
        day_rows.insert("FLAT".to_string(), daily(day, 5.05, 5.0, 100_000.0)); // +1%
        day_rows.insert("ABCP".to_string(), daily(day, 7.0, 7.0, 900_000.0)); // +40% but preferred
        store.insert_grouped(day, day_rows);

        store.insert_reference(ReferenceRecord {
            ticker: "ABCP".into(),
            asset_type: "PFD".into(),
            is_common_stock: false,
            active: true,
        });
        store.insert_reference(ReferenceRecord {
            ticker: "GAPR".into(),
            asset_type: "CS".into(),
            is_common_stock: true,
            active: true,
        });
        store
    }

    #[test]
    fn gap_open_ranks_and_filters() {
        let store = store_with_gap_day();
        let clock = SessionClock::default();
        let universe = UniverseConfig::default();
        let config = WatchlistConfig::default();

        let items =
            build_watchlist(&store, &clock, &universe, &config, d(2025, 3, 3)).unwrap();
        // ABCP excluded by reference data despite the larger gap; FLAT is
        // below min_gap_pct.
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].ticker, "GAPR");
        assert_eq!(items[0].rank, 1);
        assert!((items[0].gap_open_pct.unwrap() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn empty_prev_session_yields_empty_watchlist() {
        let store = FixtureStore::new();
        let clock = SessionClock::default();
        let items = build_watchlist(
            &store,
            &clock,
            &UniverseConfig::default(),
            &WatchlistConfig::default(),
            d(2025, 3, 3),
        )
        .unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn outage_on_prev_session_propagates() {
        let mut store = store_with_gap_day();
        store.mark_error_day(d(2025, 2, 28));
        let clock = SessionClock::default();
        let result = build_watchlist(
            &store,
            &clock,
            &UniverseConfig::default(),
            &WatchlistConfig::default(),
            d(2025, 3, 3),
        );
        assert!(matches!(result, Err(DataError::Unavailable(_))));
    }

    #[test]
    fn premarket_gap_uses_premarket_stats() {
        let mut store = store_with_gap_day();
        let day = d(2025, 3, 3);
        // Premarket bars for GAPR: 09:00 ET == 14:00 UTC in March (EST).
        let bars: Vec<Bar> = (0..30)
            .map(|i| {
                Bar::new(
                    Utc.with_ymd_and_hms(2025, 3, 3, 14, i, 0).unwrap(),
                    5.8,
                    6.0,
                    5.7,
                    5.9,
                    40_000.0,
                )
            })
            .collect();
        store.insert_minute_bars("GAPR", day, bars);

        let clock = SessionClock::default();
        let universe = UniverseConfig::default();
        let config = WatchlistConfig {
            method: SelectionMethod::PremarketGap,
            ..WatchlistConfig::default()
        };

        let items = build_watchlist(&store, &clock, &universe, &config, day).unwrap();
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.ticker, "GAPR");
        assert!((item.premarket_high.unwrap() - 6.0).abs() < 1e-9);
        assert!((item.premarket_volume - 1_200_000.0).abs() < 1e-6);
        // 5.9 / 5.0 - 1 = 18%
        assert!((item.premarket_pct.unwrap() - 0.18).abs() < 1e-9);
    }

    #[test]
    fn watchlist_is_deterministic() {
        let store = store_with_gap_day();
        let clock = SessionClock::default();
        let universe = UniverseConfig::default();
        let config = WatchlistConfig::default();
        let a = build_watchlist(&store, &clock, &universe, &config, d(2025, 3, 3)).unwrap();
        let b = build_watchlist(&store, &clock, &universe, &config, d(2025, 3, 3)).unwrap();
        let fmt = |items: &[WatchlistItem]| {
            items
                .iter()
                .map(|i| format!("{}:{}:{:?}", i.rank, i.ticker, i.ranking_metric()))
                .collect::<Vec<_>>()
                .join("|")
        };
        assert_eq!(fmt(&a), fmt(&b));
    }
}
