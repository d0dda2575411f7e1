use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Single 1-minute OHLCV bar.
///
/// Timestamps are UTC instants; session logic converts to US/Eastern via
/// the calendar. Within a (ticker, day) bars are strictly increasing in `ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(ts: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self { ts, open, high, low, close, volume }
    }

    /// Validate OHLC invariants.
    pub fn validate(&self) -> Result<(), BarError> {
        if self.high < self.low {
            return Err(BarError::InvalidRange { high: self.high, low: self.low });
        }
        if self.open < 0.0 || self.high < 0.0 || self.low < 0.0 || self.close < 0.0 {
            return Err(BarError::NegativePrice);
        }
        if self.volume < 0.0 {
            return Err(BarError::NegativeVolume);
        }
        Ok(())
    }

    /// Typical price (H+L+C)/3, the VWAP numerator input.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// Prior-session daily OHLCV, used for previous close and PDH/PDL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Error)]
pub enum BarError {
    #[error("invalid bar range: high={high}, low={low}")]
    InvalidRange { high: f64, low: f64 },

    #[error("negative price not allowed")]
    NegativePrice,

    #[error("negative volume not allowed")]
    NegativeVolume,

    #[error("bars not strictly increasing at index {index}")]
    NonMonotonic { index: usize },
}

/// Check strict `ts` monotonicity over a bar sequence.
pub fn check_monotonic(bars: &[Bar]) -> Result<(), BarError> {
    for (i, pair) in bars.windows(2).enumerate() {
        if pair[1].ts <= pair[0].ts {
            return Err(BarError::NonMonotonic { index: i + 1 });
        }
    }
    Ok(())
}
