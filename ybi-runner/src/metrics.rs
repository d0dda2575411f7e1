//! Performance metrics — pure functions over the trade list and the daily
//! P&L series. No dependencies on the runner or the simulator.

use crate::daily::DailySeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ybi_core::domain::TradeRecord;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Aggregate metrics for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_pnl_per_trade: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub expectancy: f64,
    pub profit_factor: f64,
    pub mean_daily_pnl: f64,
    pub std_daily_pnl: f64,
    pub sharpe: f64,
    pub trading_days_in_sample: usize,
    pub max_drawdown: f64,
    pub drawdown_peak_date: Option<NaiveDate>,
    pub drawdown_trough_date: Option<NaiveDate>,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub win_rate_by_setup: BTreeMap<String, f64>,
    pub trade_count_by_setup: BTreeMap<String, usize>,
}

impl PerformanceMetrics {
    pub fn compute(trades: &[TradeRecord], daily: &DailySeries) -> Self {
        let pnl: Vec<f64> = trades.iter().map(|t| t.pnl_total).collect();
        let wins: Vec<f64> = pnl.iter().copied().filter(|&p| p > 0.0).collect();
        let losses: Vec<f64> = pnl.iter().copied().filter(|&p| p < 0.0).collect();
        let n = pnl.len();

        let win_rate = if n > 0 { wins.len() as f64 / n as f64 } else { 0.0 };
        let loss_rate = if n > 0 { losses.len() as f64 / n as f64 } else { 0.0 };
        let avg_win = mean(&wins);
        let avg_loss = mean(&losses);

        let daily_pnl = daily.pnl();
        let mean_daily = mean(&daily_pnl);
        let std_daily = sample_std(&daily_pnl);

        let (max_drawdown, peak_idx, trough_idx) = max_drawdown_on_cumsum(&daily_pnl);
        let dates = daily.dates();

        let gross_profit: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().map(|l| l.abs()).sum();
        let profit_factor = if gross_loss > 1e-12 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let (max_wins, max_losses) = streaks(&pnl);
        let (win_rate_by_setup, trade_count_by_setup) = by_setup(trades);

        Self {
            total_trades: n,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            breakeven_trades: n - wins.len() - losses.len(),
            win_rate,
            total_pnl: pnl.iter().sum(),
            avg_pnl_per_trade: mean(&pnl),
            avg_win,
            avg_loss,
            largest_win: wins.iter().copied().fold(0.0, f64::max),
            largest_loss: losses.iter().copied().fold(0.0, f64::min),
            expectancy: win_rate * avg_win + loss_rate * avg_loss,
            profit_factor,
            mean_daily_pnl: mean_daily,
            std_daily_pnl: std_daily,
            sharpe: sharpe(mean_daily, std_daily),
            trading_days_in_sample: daily.len(),
            max_drawdown,
            drawdown_peak_date: peak_idx.map(|i| dates[i]),
            drawdown_trough_date: trough_idx.map(|i| dates[i]),
            max_consecutive_wins: max_wins,
            max_consecutive_losses: max_losses,
            win_rate_by_setup,
            trade_count_by_setup,
        }
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (ddof = 1).
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Annualised Sharpe on the daily P&L series (zero risk-free rate).
pub fn sharpe(mean_daily: f64, std_daily: f64) -> f64 {
    if std_daily < 1e-15 {
        return 0.0;
    }
    mean_daily / std_daily * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Max drawdown in dollars on the running cumulative P&L curve, with the
/// peak and trough indices. Returns a non-positive drawdown.
fn max_drawdown_on_cumsum(daily_pnl: &[f64]) -> (f64, Option<usize>, Option<usize>) {
    let mut equity = 0.0;
    let mut peak = 0.0;
    let mut peak_idx: Option<usize> = None;
    let mut best = 0.0;
    let mut best_peak = None;
    let mut best_trough = None;

    for (i, pnl) in daily_pnl.iter().enumerate() {
        equity += pnl;
        if equity > peak {
            peak = equity;
            peak_idx = Some(i);
        }
        let dd = equity - peak;
        if dd < best {
            best = dd;
            best_peak = peak_idx;
            best_trough = Some(i);
        }
    }
    (best, best_peak, best_trough)
}

fn streaks(pnl: &[f64]) -> (usize, usize) {
    let mut max_wins = 0;
    let mut max_losses = 0;
    let mut wins = 0;
    let mut losses = 0;
    for &p in pnl {
        if p > 0.0 {
            wins += 1;
            losses = 0;
            max_wins = max_wins.max(wins);
        } else if p < 0.0 {
            losses += 1;
            wins = 0;
            max_losses = max_losses.max(losses);
        } else {
            wins = 0;
            losses = 0;
        }
    }
    (max_wins, max_losses)
}

fn by_setup(trades: &[TradeRecord]) -> (BTreeMap<String, f64>, BTreeMap<String, usize>) {
    let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for trade in trades {
        let entry = counts.entry(trade.setup_tag.as_str().to_string()).or_insert((0, 0));
        entry.0 += 1;
        if trade.is_winner() {
            entry.1 += 1;
        }
    }
    let mut win_rates = BTreeMap::new();
    let mut totals = BTreeMap::new();
    for (setup, (count, winners)) in counts {
        win_rates.insert(setup.clone(), winners as f64 / count as f64);
        totals.insert(setup, count);
    }
    (win_rates, totals)
}
