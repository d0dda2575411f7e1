use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Entry setups, in priority order (A highest). When several fire on the
/// same bar the lowest-priority-index setup wins the tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupTag {
    /// A: bar closes above the premarket high and holds.
    PmhBreakoutHold,
    /// B: reclaim of VWAP / EMA21 / EMA8 after a breakout leg.
    PullbackHold,
    /// C: double pivot bottom followed by an EMA8 reclaim.
    DoubleBottomReclaim,
    /// D: starter probe at a held level with TTM slightly bearish.
    StarterProbe,
    /// E: HOD breakout after a measurable pullback.
    HodBreakout,
}

impl SetupTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetupTag::PmhBreakoutHold => "pmh_breakout_hold",
            SetupTag::PullbackHold => "pullback_hold",
            SetupTag::DoubleBottomReclaim => "double_bottom_reclaim",
            SetupTag::StarterProbe => "starter_probe",
            SetupTag::HodBreakout => "hod_breakout",
        }
    }

    pub fn priority(&self) -> u8 {
        match self {
            SetupTag::PmhBreakoutHold => 0,
            SetupTag::PullbackHold => 1,
            SetupTag::DoubleBottomReclaim => 2,
            SetupTag::StarterProbe => 3,
            SetupTag::HodBreakout => 4,
        }
    }
}

/// Why a position (or part of one) was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopHit,
    StopHitGapThrough,
    ScaleOutTarget,
    CloseBelowEma8,
    TtmMomentumBear,
    FailedBreakout,
    ExtensionRejection,
    ForceFlat,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopHit => "stop_hit",
            ExitReason::StopHitGapThrough => "stop_hit_gap_through",
            ExitReason::ScaleOutTarget => "scale_out_target",
            ExitReason::CloseBelowEma8 => "close_below_ema8",
            ExitReason::TtmMomentumBear => "ttm_momentum_bear",
            ExitReason::FailedBreakout => "failed_breakout",
            ExitReason::ExtensionRejection => "extension_rejection",
            ExitReason::ForceFlat => "force_flat",
        }
    }

    /// Exits that arm the per-ticker cooldown.
    pub fn arms_cooldown(&self) -> bool {
        matches!(
            self,
            ExitReason::StopHit | ExitReason::StopHitGapThrough | ExitReason::FailedBreakout
        )
    }
}

/// Closed round trip. Created on the final SELL of a position.
///
/// `pnl_total = scale_pnl + final_exit_pnl − fees`, with the round-trip fee
/// charged exactly once, on the final exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_id: String,
    pub date: NaiveDate,
    pub ticker: String,
    pub setup_tag: SetupTag,
    pub signal_ts: DateTime<Utc>,
    pub entry_ts: DateTime<Utc>,
    pub exit_ts: DateTime<Utc>,
    pub entry_px: f64,
    pub avg_exit_px: f64,
    pub original_qty: u32,
    pub scale_pnl: f64,
    pub final_exit_pnl: f64,
    pub fees: f64,
    pub pnl_total: f64,
    pub exit_reason: ExitReason,
    pub stop_px_initial: f64,
    pub bars_held: usize,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.pnl_total > 0.0
    }
}
