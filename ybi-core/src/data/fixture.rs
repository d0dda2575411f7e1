//! In-memory `MarketData` backed by fixtures.
//!
//! Used by the simulator tests and by offline runs driven from a JSON
//! fixture file. Days listed in `error_days` return `Unavailable`, which
//! lets tests exercise the error-day exclusion path end to end.

use super::provider::{rth_open_utc, strip_premarket, DataError, MarketData};
use crate::domain::{Bar, DailyBar, ReferenceRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FixtureStore {
    #[serde(default)]
    minute: HashMap<String, Vec<Bar>>,
    #[serde(default)]
    grouped: HashMap<NaiveDate, BTreeMap<String, DailyBar>>,
    #[serde(default)]
    reference: HashMap<String, ReferenceRecord>,
    #[serde(default)]
    error_days: BTreeSet<NaiveDate>,
}

fn minute_key(ticker: &str, date: NaiveDate) -> String {
    format!("{ticker}:{date}")
}

impl FixtureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DataError::Cache(format!("read fixtures {}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| DataError::Cache(format!("parse fixtures: {e}")))
    }

    pub fn insert_minute_bars(&mut self, ticker: &str, date: NaiveDate, bars: Vec<Bar>) {
        self.minute.insert(minute_key(ticker, date), bars);
    }

    pub fn insert_grouped(&mut self, date: NaiveDate, rows: BTreeMap<String, DailyBar>) {
        self.grouped.insert(date, rows);
    }

    pub fn insert_reference(&mut self, record: ReferenceRecord) {
        self.reference.insert(record.ticker.clone(), record);
    }

    /// Mark a whole day as a provider outage.
    pub fn mark_error_day(&mut self, date: NaiveDate) {
        self.error_days.insert(date);
    }

    fn check_outage(&self, date: NaiveDate) -> Result<(), DataError> {
        if self.error_days.contains(&date) {
            return Err(DataError::Unavailable(format!("fixture outage on {date}")));
        }
        Ok(())
    }
}

impl MarketData for FixtureStore {
    fn minute_bars(
        &self,
        ticker: &str,
        date: NaiveDate,
        include_premarket: bool,
    ) -> Result<Vec<Bar>, DataError> {
        self.check_outage(date)?;
        let mut bars = self
            .minute
            .get(&minute_key(ticker, date))
            .cloned()
            .unwrap_or_default();
        if !include_premarket {
            bars = strip_premarket(bars, rth_open_utc(date));
        }
        Ok(bars)
    }

    fn daily_bar(&self, ticker: &str, date: NaiveDate) -> Result<Option<DailyBar>, DataError> {
        self.check_outage(date)?;
        Ok(self.grouped.get(&date).and_then(|rows| rows.get(ticker)).cloned())
    }

    fn grouped_daily(&self, date: NaiveDate) -> Result<BTreeMap<String, DailyBar>, DataError> {
        self.check_outage(date)?;
        Ok(self.grouped.get(&date).cloned().unwrap_or_default())
    }

    fn reference(&self, ticker: &str) -> Result<Option<ReferenceRecord>, DataError> {
        Ok(self.reference.get(ticker).cloned())
    }
}
