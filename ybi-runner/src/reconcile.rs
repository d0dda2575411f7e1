//! Trade ↔ fill reconciliation.
//!
//! For every round trip: the sum of SELL notional minus BUY notional
//! across its linked fills, minus the round-trip fee, must equal the
//! recorded `pnl_total` within a cent. The same must hold globally. Any
//! discrepancy is a hard failure upstream, not a warning.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ybi_core::domain::{FillRecord, Side, TradeRecord};

pub const TOLERANCE: f64 = 0.01;

const DESCRIPTION: &str = "Proof that the trade ledger and the fill ledger agree: per \
    trade, SELL notional - BUY notional - fee must equal pnl_total to within $0.01, \
    and the totals must match globally. A mismatch means an accounting bug (missing \
    scale-out P&L, double-counted fees, quantity drift) and fails the run.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reconciliation {
    pub description: String,
    pub total_trades: usize,
    pub total_fills: usize,
    pub trades_with_discrepancy: usize,
    pub max_discrepancy: f64,
    pub trades_total_pnl: f64,
    pub fills_reconstructed_pnl: f64,
    pub global_difference: f64,
    pub discrepancies: Vec<TradeDiscrepancy>,
    pub is_consistent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeDiscrepancy {
    pub trade_id: String,
    pub ticker: String,
    pub trade_pnl: f64,
    pub fills_pnl: f64,
    pub difference: f64,
}

pub fn reconcile_trades_and_fills(trades: &[TradeRecord], fills: &[FillRecord]) -> Reconciliation {
    let mut per_trade: BTreeMap<&str, (f64, f64, f64)> = BTreeMap::new(); // (buys, sells, fees)
    for fill in fills {
        let entry = per_trade.entry(fill.linked_trade_id.as_str()).or_insert((0.0, 0.0, 0.0));
        let notional = fill.price * f64::from(fill.qty);
        match fill.side {
            Side::Buy => entry.0 += notional,
            Side::Sell => entry.1 += notional,
        }
        entry.2 += fill.fee;
    }

    let mut result = Reconciliation {
        description: DESCRIPTION.into(),
        total_trades: trades.len(),
        total_fills: fills.len(),
        trades_with_discrepancy: 0,
        max_discrepancy: 0.0,
        trades_total_pnl: trades.iter().map(|t| t.pnl_total).sum(),
        fills_reconstructed_pnl: per_trade.values().map(|(b, s, f)| s - b - f).sum(),
        global_difference: 0.0,
        discrepancies: Vec::new(),
        is_consistent: true,
    };

    for trade in trades {
        let (buys, sells, fees) = per_trade
            .get(trade.trade_id.as_str())
            .copied()
            .unwrap_or((0.0, 0.0, 0.0));
        let fills_pnl = sells - buys - fees;
        let difference = (fills_pnl - trade.pnl_total).abs();
        if difference > TOLERANCE {
            result.trades_with_discrepancy += 1;
            result.max_discrepancy = result.max_discrepancy.max(difference);
            result.discrepancies.push(TradeDiscrepancy {
                trade_id: trade.trade_id.clone(),
                ticker: trade.ticker.clone(),
                trade_pnl: trade.pnl_total,
                fills_pnl,
                difference,
            });
        }
    }

    // Orphan fills: a linked_trade_id with no trade record breaks the
    // global sum even if every trade matched.
    result.global_difference =
        (result.trades_total_pnl - result.fills_reconstructed_pnl).abs();
    result.discrepancies.truncate(10);
    result.is_consistent =
        result.trades_with_discrepancy == 0 && result.global_difference <= TOLERANCE;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use ybi_core::domain::{ExitReason, IntentKind, SetupTag};

    fn base_ts() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 14, 41, 0).unwrap()
    }

    fn fill(trade_id: &str, side: Side, qty: u32, price: f64, fee: f64) -> FillRecord {
        FillRecord {
            ts: base_ts(),
            ticker: "TEST".into(),
            side,
            qty,
            price,
            fee,
            intent_kind: match side {
                Side::Buy => IntentKind::Enter,
                Side::Sell => IntentKind::Exit,
            },
            reason: String::new(),
            linked_trade_id: trade_id.into(),
        }
    }

    fn trade(trade_id: &str, pnl_total: f64, scale_pnl: f64, fees: f64) -> TradeRecord {
        TradeRecord {
            trade_id: trade_id.into(),
            date: base_ts().date_naive(),
            ticker: "TEST".into(),
            setup_tag: SetupTag::PmhBreakoutHold,
            signal_ts: base_ts() - Duration::minutes(1),
            entry_ts: base_ts(),
            exit_ts: base_ts() + Duration::minutes(4),
            entry_px: 10.0,
            avg_exit_px: 10.2,
            original_qty: 100,
            scale_pnl,
            final_exit_pnl: pnl_total - scale_pnl + fees,
            fees,
            pnl_total,
            exit_reason: ExitReason::CloseBelowEma8,
            stop_px_initial: 9.5,
            bars_held: 4,
        }
    }

    #[test]
    fn matched_round_trip_reconciles() {
        // 100 @ 10.00 in, 50 @ 10.50 scale, 50 @ 10.10 out, $1 fee.
        let fills = vec![
            fill("t1", Side::Buy, 100, 10.0, 0.0),
            fill("t1", Side::Sell, 50, 10.5, 0.0),
            fill("t1", Side::Sell, 50, 10.1, 1.0),
        ];
        // pnl = 525 + 505 - 1000 - 1 = 29
        let trades = vec![trade("t1", 29.0, 25.0, 1.0)];
        let result = reconcile_trades_and_fills(&trades, &fills);
        assert!(result.is_consistent, "{result:?}");
        assert_eq!(result.trades_with_discrepancy, 0);
        assert!(result.global_difference <= TOLERANCE);
    }

    #[test]
    fn missing_scale_pnl_is_caught() {
        let fills = vec![
            fill("t1", Side::Buy, 100, 10.0, 0.0),
            fill("t1", Side::Sell, 50, 10.5, 0.0),
            fill("t1", Side::Sell, 50, 10.1, 1.0),
        ];
        // Trade claims only the final leg: the scale-out P&L is missing.
        let trades = vec![trade("t1", 4.0, 0.0, 1.0)];
        let result = reconcile_trades_and_fills(&trades, &fills);
        assert!(!result.is_consistent);
        assert_eq!(result.trades_with_discrepancy, 1);
        assert!((result.discrepancies[0].difference - 25.0).abs() < 1e-9);
    }

    #[test]
    fn double_counted_fee_is_caught() {
        let fills = vec![
            fill("t1", Side::Buy, 100, 10.0, 1.0), // fee wrongly on entry too
            fill("t1", Side::Sell, 100, 10.1, 1.0),
        ];
        let trades = vec![trade("t1", 9.0, 0.0, 1.0)];
        let result = reconcile_trades_and_fills(&trades, &fills);
        assert!(!result.is_consistent);
    }

    #[test]
    fn orphan_fill_breaks_global_sum() {
        let fills = vec![
            fill("t1", Side::Buy, 100, 10.0, 0.0),
            fill("t1", Side::Sell, 100, 10.1, 1.0),
            fill("ghost", Side::Sell, 10, 50.0, 0.0),
        ];
        let trades = vec![trade("t1", 9.0, 0.0, 1.0)];
        let result = reconcile_trades_and_fills(&trades, &fills);
        assert!(!result.is_consistent);
        assert!(result.global_difference > TOLERANCE);
    }

    #[test]
    fn empty_ledgers_are_consistent() {
        let result = reconcile_trades_and_fills(&[], &[]);
        assert!(result.is_consistent);
    }
}
