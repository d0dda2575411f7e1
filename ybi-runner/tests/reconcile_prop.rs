//! Property test for the reconciliation law: a ledger whose trade records
//! are derived from its fills always reconciles, and corrupting any fill
//! by more than the tolerance breaks it.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use ybi_core::domain::{ExitReason, FillRecord, IntentKind, SetupTag, Side, TradeRecord};
use ybi_runner::reconcile::reconcile_trades_and_fills;

#[derive(Debug, Clone)]
struct TradeSpec {
    qty: u32,
    entry_px: f64,
    scale_px: Option<f64>,
    exit_px: f64,
    fee: f64,
}

fn trade_spec() -> impl Strategy<Value = TradeSpec> {
    (
        2u32..500,
        1.0f64..50.0,
        proptest::option::of(1.0f64..60.0),
        1.0f64..60.0,
        0.0f64..5.0,
    )
        .prop_map(|(qty, entry_px, scale_px, exit_px, fee)| TradeSpec {
            qty,
            entry_px: (entry_px * 100.0).round() / 100.0,
            scale_px: scale_px.map(|p| (p * 100.0).round() / 100.0),
            exit_px: (exit_px * 100.0).round() / 100.0,
            fee: (fee * 100.0).round() / 100.0,
        })
}

/// Build a (trades, fills) pair where the trade P&L is derived from the
/// fills exactly the way the simulator does it.
fn build_ledger(specs: &[TradeSpec]) -> (Vec<TradeRecord>, Vec<FillRecord>) {
    let base = Utc.with_ymd_and_hms(2025, 3, 3, 14, 40, 0).unwrap();
    let mut trades = Vec::new();
    let mut fills = Vec::new();

    for (i, spec) in specs.iter().enumerate() {
        let trade_id = format!("2025-03-03-T{i}-{}", i + 1);
        let entry_ts = base + Duration::minutes(3 * i as i64);
        let scale_qty = spec.scale_px.map(|_| spec.qty / 2).filter(|&q| q >= 1);
        let final_qty = spec.qty - scale_qty.unwrap_or(0);

        fills.push(FillRecord {
            ts: entry_ts,
            ticker: format!("T{i}"),
            side: Side::Buy,
            qty: spec.qty,
            price: spec.entry_px,
            fee: 0.0,
            intent_kind: IntentKind::Enter,
            reason: "pmh_breakout_hold".into(),
            linked_trade_id: trade_id.clone(),
        });

        let mut scale_pnl = 0.0;
        if let (Some(scale_px), Some(qty)) = (spec.scale_px, scale_qty) {
            scale_pnl = (scale_px - spec.entry_px) * f64::from(qty);
            fills.push(FillRecord {
                ts: entry_ts + Duration::minutes(1),
                ticker: format!("T{i}"),
                side: Side::Sell,
                qty,
                price: scale_px,
                fee: 0.0,
                intent_kind: IntentKind::ScaleOut,
                reason: "scale_out_target".into(),
                linked_trade_id: trade_id.clone(),
            });
        }

        let final_exit_pnl = (spec.exit_px - spec.entry_px) * f64::from(final_qty);
        fills.push(FillRecord {
            ts: entry_ts + Duration::minutes(2),
            ticker: format!("T{i}"),
            side: Side::Sell,
            qty: final_qty,
            price: spec.exit_px,
            fee: spec.fee,
            intent_kind: IntentKind::Exit,
            reason: "close_below_ema8".into(),
            linked_trade_id: trade_id.clone(),
        });

        trades.push(TradeRecord {
            trade_id,
            date: entry_ts.date_naive(),
            ticker: format!("T{i}"),
            setup_tag: SetupTag::PmhBreakoutHold,
            signal_ts: entry_ts - Duration::minutes(1),
            entry_ts,
            exit_ts: entry_ts + Duration::minutes(2),
            entry_px: spec.entry_px,
            avg_exit_px: spec.exit_px,
            original_qty: spec.qty,
            scale_pnl,
            final_exit_pnl,
            fees: spec.fee,
            pnl_total: scale_pnl + final_exit_pnl - spec.fee,
            exit_reason: ExitReason::CloseBelowEma8,
            stop_px_initial: spec.entry_px * 0.95,
            bars_held: 3,
        });
    }
    (trades, fills)
}

proptest! {
    #[test]
    fn derived_ledgers_always_reconcile(specs in proptest::collection::vec(trade_spec(), 1..12)) {
        let (trades, fills) = build_ledger(&specs);
        let result = reconcile_trades_and_fills(&trades, &fills);
        prop_assert!(result.is_consistent, "derived ledger failed: {result:?}");
    }

    #[test]
    fn corrupted_fill_price_breaks_reconciliation(
        specs in proptest::collection::vec(trade_spec(), 1..8),
        bump in 1.0f64..10.0,
    ) {
        let (trades, mut fills) = build_ledger(&specs);
        // Shift one BUY by whole dollars: with qty >= 2 the notional moves
        // by at least $2, far past the $0.01 tolerance.
        let target = fills.iter_mut().find(|f| f.side == Side::Buy).unwrap();
        target.price += bump.round().max(1.0);
        let result = reconcile_trades_and_fills(&trades, &fills);
        prop_assert!(!result.is_consistent);
    }
}
