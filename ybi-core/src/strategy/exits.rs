//! Close-based exit signals, evaluated each bar while a position is open.
//!
//! Stops and scale-out touches are intrabar events and belong to the
//! simulator; everything here looks only at the bar close and emits a
//! next-bar-open exit intent.

use crate::config::StrategyConfig;
use crate::domain::{Bar, ExitReason, Position};
use crate::features::{FeatureSnapshot, MomentumSign};

/// A failed breakout counts when the close lands back within this distance
/// below the violated level.
const FAILED_BREAKOUT_PROXIMITY: f64 = 0.02;

/// A rejection candle counts as "at resistance" when its high is within
/// this distance above the level it tagged.
const REJECTION_PROXIMITY: f64 = 0.01;

pub fn exit_signal(
    cfg: &StrategyConfig,
    max_extension_for_exit: f64,
    bar: &Bar,
    snap: &FeatureSnapshot,
    position: &Position,
) -> Option<ExitReason> {
    // Close below the fast EMA after the move has had time to work.
    if let Some(ema8) = snap.ema8 {
        if bar.close < ema8 && position.bars_held >= cfg.ema8_exit_min_bars_held {
            return Some(ExitReason::CloseBelowEma8);
        }
    }

    // Squeeze flips bearish with momentum confirming.
    if snap.ttm_state.is_bearish() && snap.momentum_sign == MomentumSign::Bear {
        return Some(ExitReason::TtmMomentumBear);
    }

    // Printed above a level intrabar but closed back below it.
    for &level in &snap.levels {
        if bar.high >= level
            && bar.close < level
            && (level - bar.close) / level <= FAILED_BREAKOUT_PROXIMITY
        {
            return Some(ExitReason::FailedBreakout);
        }
    }

    // Too far above EMA8 with a bearish rejection candle at resistance.
    if let Some(ext) = snap.extension_from_ema8 {
        if ext > max_extension_for_exit && bar.close < bar.open {
            let at_resistance = snap
                .levels
                .iter()
                .any(|&l| bar.high >= l && (bar.high - l) / l <= REJECTION_PROXIMITY);
            if at_resistance {
                return Some(ExitReason::ExtensionRejection);
            }
        }
    }

    None
}
