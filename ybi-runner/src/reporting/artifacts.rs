//! CSV artifact writers.
//!
//! One writer per ledger, fixed headers, timestamps as RFC 3339 UTC.
//! Writers are deterministic: given identical inputs the bytes on disk
//! are identical across runs.

use crate::daily::DailyRow;
use crate::runner::BacktestRun;
use anyhow::{Context, Result};
use std::path::Path;
use ybi_core::domain::{DayAudit, FillRecord, TradeRecord, WatchlistItem};

pub fn write_run_artifacts(out_dir: &Path, run: &BacktestRun) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create output dir {}", out_dir.display()))?;

    write_watchlist_csv(&out_dir.join("watchlist.csv"), &run.watchlist)?;
    write_fills_csv(&out_dir.join("fills.csv"), &run.fills)?;
    write_trades_csv(&out_dir.join("trades.csv"), &run.trades)?;
    write_day_audit_csv(&out_dir.join("day_audit.csv"), &run.audits)?;
    write_daily_metrics_csv(&out_dir.join("daily_metrics.csv"), &run.daily.rows)?;
    Ok(())
}

pub fn write_watchlist_csv(path: &Path, items: &[WatchlistItem]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    writer.write_record([
        "date",
        "ticker",
        "rank",
        "selection_method",
        "prev_close",
        "gap_open_pct",
        "premarket_pct",
        "premarket_high",
        "premarket_low",
        "premarket_volume",
        "premarket_dollar_volume",
    ])?;
    for item in items {
        writer.write_record([
            item.date.to_string(),
            item.ticker.clone(),
            item.rank.to_string(),
            item.selection_method.as_str().to_string(),
            format!("{:.4}", item.prev_close),
            opt_pct(item.gap_open_pct),
            opt_pct(item.premarket_pct),
            opt_px(item.premarket_high),
            opt_px(item.premarket_low),
            format!("{:.0}", item.premarket_volume),
            format!("{:.2}", item.premarket_dollar_volume),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_fills_csv(path: &Path, fills: &[FillRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    writer.write_record([
        "ts",
        "ticker",
        "side",
        "qty",
        "price",
        "fee",
        "intent_kind",
        "reason",
        "linked_trade_id",
    ])?;
    for fill in fills {
        writer.write_record([
            fill.ts.to_rfc3339(),
            fill.ticker.clone(),
            fill.side.as_str().to_string(),
            fill.qty.to_string(),
            format!("{:.4}", fill.price),
            format!("{:.2}", fill.fee),
            fill.intent_kind.as_str().to_string(),
            fill.reason.clone(),
            fill.linked_trade_id.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_trades_csv(path: &Path, trades: &[TradeRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    writer.write_record([
        "trade_id",
        "date",
        "ticker",
        "setup_tag",
        "signal_ts",
        "entry_ts",
        "exit_ts",
        "entry_px",
        "avg_exit_px",
        "original_qty",
        "scale_pnl",
        "final_exit_pnl",
        "fees",
        "pnl_total",
        "exit_reason",
        "stop_px_initial",
        "bars_held",
    ])?;
    for trade in trades {
        writer.write_record([
            trade.trade_id.clone(),
            trade.date.to_string(),
            trade.ticker.clone(),
            trade.setup_tag.as_str().to_string(),
            trade.signal_ts.to_rfc3339(),
            trade.entry_ts.to_rfc3339(),
            trade.exit_ts.to_rfc3339(),
            format!("{:.4}", trade.entry_px),
            format!("{:.4}", trade.avg_exit_px),
            trade.original_qty.to_string(),
            format!("{:.4}", trade.scale_pnl),
            format!("{:.4}", trade.final_exit_pnl),
            format!("{:.2}", trade.fees),
            format!("{:.4}", trade.pnl_total),
            trade.exit_reason.as_str().to_string(),
            format!("{:.4}", trade.stop_px_initial),
            trade.bars_held.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_day_audit_csv(path: &Path, audits: &[DayAudit]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    writer.write_record(["date", "status", "reason"])?;
    for audit in audits {
        writer.write_record([
            audit.date.to_string(),
            audit.status.as_str().to_string(),
            audit.reason.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Eligible days only: error days must be absent, not zero.
pub fn write_daily_metrics_csv(path: &Path, rows: &[DailyRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    writer.write_record(["date", "pnl", "trades", "fees"])?;
    for row in rows {
        writer.write_record([
            row.date.to_string(),
            format!("{:.4}", row.pnl),
            row.trades.to_string(),
            format!("{:.2}", row.fees),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn opt_pct(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

fn opt_px(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}
