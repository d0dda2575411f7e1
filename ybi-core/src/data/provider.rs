//! The `MarketData` trait and its error taxonomy.

use crate::domain::{Bar, DailyBar, ReferenceRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use thiserror::Error;

/// Structured errors for data operations.
///
/// `Unavailable` is transport-level (timeout, 5xx, provider ERROR status)
/// and downgrades the affected day to `status=error`; `NotFound` is normal
/// missing data and is not an error condition for the run.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("data unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("provider authentication failed: {0}")]
    Auth(String),

    #[error("cache error: {0}")]
    Cache(String),
}

impl DataError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DataError::Unavailable(_))
    }
}

/// Typed read access to historical market data.
///
/// Implementations: `PolygonClient` (HTTP + cache) and `FixtureStore`
/// (in-memory, used by tests and offline runs).
pub trait MarketData {
    /// 1-minute bars for a (ticker, day), ascending in `ts`. With
    /// `include_premarket` false, only bars at or after 09:30 ET.
    fn minute_bars(
        &self,
        ticker: &str,
        date: NaiveDate,
        include_premarket: bool,
    ) -> Result<Vec<Bar>, DataError>;

    /// Single daily OHLCV for a ticker, `Ok(None)` when the session has no
    /// data for it.
    fn daily_bar(&self, ticker: &str, date: NaiveDate) -> Result<Option<DailyBar>, DataError>;

    /// Whole-market daily aggregates for one session, keyed by ticker.
    /// Empty map means the session has no data (e.g. a holiday).
    fn grouped_daily(&self, date: NaiveDate) -> Result<BTreeMap<String, DailyBar>, DataError>;

    /// Reference data for hygiene filtering; `Ok(None)` when the provider
    /// has no record, in which case pattern heuristics take over.
    fn reference(&self, ticker: &str) -> Result<Option<ReferenceRecord>, DataError>;
}

/// 09:30 ET on `date` as a UTC instant, the boundary used when callers ask
/// for RTH-only minute bars.
pub fn rth_open_utc(date: NaiveDate) -> chrono::DateTime<chrono::Utc> {
    use chrono::TimeZone;
    chrono_tz::America::New_York
        .from_local_datetime(&date.and_time(chrono::NaiveTime::from_hms_opt(9, 30, 0).unwrap()))
        .single()
        .expect("09:30 ET is never in a DST transition")
        .with_timezone(&chrono::Utc)
}

/// Drop bars before the RTH open from an ascending sequence.
pub fn strip_premarket(bars: Vec<Bar>, rth_open: chrono::DateTime<chrono::Utc>) -> Vec<Bar> {
    bars.into_iter().filter(|b| b.ts >= rth_open).collect()
}
