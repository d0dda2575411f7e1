//! Per-day audit record and the rejected-intent log.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one calendar day in the run.
///
/// `Error` days are excluded from statistics as missing data, never coerced
/// to zero P&L. `Ok`, `NoTrades` and `NoWatchlist` are all eligible days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Ok,
    NoTrades,
    NoWatchlist,
    Error,
    HolidayClosed,
}

impl DayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayStatus::Ok => "ok",
            DayStatus::NoTrades => "no_trades",
            DayStatus::NoWatchlist => "no_watchlist",
            DayStatus::Error => "error",
            DayStatus::HolidayClosed => "holiday_closed",
        }
    }

    /// Eligible days enter the daily P&L series (with 0 when tradeless).
    pub fn is_eligible(&self) -> bool {
        matches!(self, DayStatus::Ok | DayStatus::NoTrades | DayStatus::NoWatchlist)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAudit {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub reason: String,
}

/// Why a pending entry was dropped instead of filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCode {
    /// Stop at or above the would-be fill price (gap-down through stop).
    InvalidStop,
    /// Risk-based size rounded below one share.
    ZeroQuantity,
    /// Position notional above the per-position cap.
    NotionalCap,
    /// Per-ticker trade count exhausted.
    MaxTradesPerDay,
    /// Portfolio hit the daily loss limit.
    DailyLossLimit,
    /// Ticker still cooling down after a stop-out or failed breakout.
    CooldownActive,
}

impl RejectionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionCode::InvalidStop => "invalid_stop",
            RejectionCode::ZeroQuantity => "zero_quantity",
            RejectionCode::NotionalCap => "notional_cap",
            RejectionCode::MaxTradesPerDay => "max_trades_per_day",
            RejectionCode::DailyLossLimit => "daily_loss_limit",
            RejectionCode::CooldownActive => "cooldown_active",
        }
    }
}

/// Rejected intents are not errors; they are recorded and skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedIntent {
    pub ts: DateTime<Utc>,
    pub ticker: String,
    pub code: RejectionCode,
}
