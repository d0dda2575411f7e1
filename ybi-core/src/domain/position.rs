use super::trade::SetupTag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An open long position in a single ticker. Created on a successful BUY
/// fill, mutated only by scale-outs, destroyed on the final SELL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    /// Remaining shares; strictly positive while the position is open.
    pub qty: u32,
    pub original_qty: u32,
    pub avg_entry: f64,
    pub stop: f64,
    pub stop_initial: f64,
    pub entry_ts: DateTime<Utc>,
    /// Close timestamp of the bar that generated the entry signal.
    pub signal_ts: DateTime<Utc>,
    pub setup_tag: SetupTag,
    pub starter: bool,
    /// First resistance above entry from the level ladder at signal time.
    pub scale_target: Option<f64>,
    pub scaled: bool,
    /// Realized P&L from scale-outs, fee-free until the final exit.
    pub scale_pnl: f64,
    /// Shares and notional already sold, for the average exit price.
    pub sold_qty: u32,
    pub sold_notional: f64,
    /// Bars of this ticker seen since entry, counting the entry bar.
    pub bars_held: usize,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        ticker: &str,
        qty: u32,
        entry_px: f64,
        stop: f64,
        entry_ts: DateTime<Utc>,
        signal_ts: DateTime<Utc>,
        setup_tag: SetupTag,
        starter: bool,
        scale_target: Option<f64>,
    ) -> Self {
        Self {
            ticker: ticker.to_string(),
            qty,
            original_qty: qty,
            avg_entry: entry_px,
            stop,
            stop_initial: stop,
            entry_ts,
            signal_ts,
            setup_tag,
            starter,
            scale_target,
            scaled: false,
            scale_pnl: 0.0,
            sold_qty: 0,
            sold_notional: 0.0,
            bars_held: 0,
        }
    }

    /// Record a partial sale and ratchet the stop to breakeven.
    pub fn apply_scale_out(&mut self, qty: u32, px: f64) {
        debug_assert!(qty < self.qty, "scale-out must leave a runner");
        self.scale_pnl += (px - self.avg_entry) * f64::from(qty);
        self.sold_qty += qty;
        self.sold_notional += px * f64::from(qty);
        self.qty -= qty;
        self.scaled = true;
        self.stop = self.stop.max(self.avg_entry);
    }

    /// Average exit price across scale-outs plus a final sale at `px`.
    pub fn avg_exit_px(&self, final_qty: u32, px: f64) -> f64 {
        let total_qty = self.sold_qty + final_qty;
        if total_qty == 0 {
            return px;
        }
        (self.sold_notional + px * f64::from(final_qty)) / f64::from(total_qty)
    }

    pub fn tick_bar(&mut self) {
        self.bars_held += 1;
    }

    pub fn market_value(&self, price: f64) -> f64 {
        f64::from(self.qty) * price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pos() -> Position {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 3, 14, 40, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 3, 3, 14, 41, 0).unwrap();
        Position::open("TEST", 100, 10.0, 9.5, t1, t0, SetupTag::PmhBreakoutHold, false, Some(10.5))
    }

    #[test]
    fn scale_out_moves_stop_to_breakeven() {
        let mut p = pos();
        p.apply_scale_out(50, 10.5);
        assert_eq!(p.qty, 50);
        assert!(p.scaled);
        assert!((p.stop - 10.0).abs() < 1e-12);
        assert!((p.scale_pnl - 25.0).abs() < 1e-9);
    }

    #[test]
    fn scale_out_never_lowers_stop() {
        let mut p = pos();
        p.stop = 10.25; // already ratcheted above entry
        p.apply_scale_out(50, 10.5);
        assert!((p.stop - 10.25).abs() < 1e-12);
    }

    #[test]
    fn avg_exit_blends_scale_and_final() {
        let mut p = pos();
        p.apply_scale_out(50, 10.5);
        // 50 @ 10.5 + 50 @ 11.0 → 10.75
        assert!((p.avg_exit_px(50, 11.0) - 10.75).abs() < 1e-12);
    }
}
