use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which watchlist selection method produced an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    GapOpen,
    PremarketGap,
}

impl SelectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMethod::GapOpen => "gap_open",
            SelectionMethod::PremarketGap => "premarket_gap",
        }
    }
}

/// One candidate on the day's watchlist. Immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub date: NaiveDate,
    pub ticker: String,
    pub prev_close: f64,
    pub premarket_high: Option<f64>,
    pub premarket_low: Option<f64>,
    pub premarket_volume: f64,
    pub premarket_dollar_volume: f64,
    /// last premarket price / prev_close − 1 (premarket_gap method only).
    pub premarket_pct: Option<f64>,
    /// open / prev_close − 1 (gap_open method only).
    pub gap_open_pct: Option<f64>,
    pub selection_method: SelectionMethod,
    /// 1-based position after ranking by the selection metric.
    pub rank: usize,
}

impl WatchlistItem {
    /// The metric the list is ranked by, depending on the method.
    pub fn ranking_metric(&self) -> f64 {
        match self.selection_method {
            SelectionMethod::GapOpen => self.gap_open_pct.unwrap_or(0.0),
            SelectionMethod::PremarketGap => self.premarket_pct.unwrap_or(0.0),
        }
    }
}

/// Reference-data record for a ticker, used for universe hygiene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub ticker: String,
    /// Provider asset type code, e.g. "CS", "ETF", "WARRANT", "PFD".
    pub asset_type: String,
    pub is_common_stock: bool,
    pub active: bool,
}

impl ReferenceRecord {
    /// Tradeable for this strategy: an active common stock.
    pub fn is_eligible(&self) -> bool {
        self.is_common_stock && self.active
    }
}
