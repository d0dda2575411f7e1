//! The daily P&L series.
//!
//! Eligible days are `ok`, `no_trades` and `no_watchlist`; they enter the
//! series with zero P&L when tradeless. Days with `status=error` are
//! missing data and are excluded entirely, never coerced to zero, so
//! they cannot dilute the inference denominators.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ybi_core::domain::{DayAudit, TradeRecord};

/// One row of `daily_metrics.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRow {
    pub date: NaiveDate,
    pub pnl: f64,
    pub trades: usize,
    pub fees: f64,
}

/// Daily P&L over exactly the eligible days, in date order.
#[derive(Debug, Clone, Default)]
pub struct DailySeries {
    pub rows: Vec<DailyRow>,
}

impl DailySeries {
    /// Assemble from the run's audits and trades. Trades on ineligible
    /// days are a bookkeeping error and must not exist; they are ignored
    /// here and caught by reconciliation.
    pub fn build(audits: &[DayAudit], trades: &[TradeRecord]) -> Self {
        let mut by_day: BTreeMap<NaiveDate, DailyRow> = BTreeMap::new();
        for audit in audits {
            if audit.status.is_eligible() {
                by_day.insert(
                    audit.date,
                    DailyRow { date: audit.date, pnl: 0.0, trades: 0, fees: 0.0 },
                );
            }
        }
        for trade in trades {
            if let Some(row) = by_day.get_mut(&trade.date) {
                row.pnl += trade.pnl_total;
                row.trades += 1;
                row.fees += trade.fees;
            }
        }
        Self { rows: by_day.into_values().collect() }
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    pub fn pnl(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.pnl).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
