//! Entry setups A–E, evaluated in priority order.

use crate::config::StrategyConfig;
use crate::domain::{Bar, SetupTag};
use crate::features::levels::nearest_support_below;
use crate::features::{FeatureSnapshot, MomentumSign};

/// Rolling per-ticker context the setups need from earlier bars.
#[derive(Debug, Clone, Default)]
pub struct SetupContext {
    pub prev_close: Option<f64>,
    pub prev_ema8: Option<f64>,
    pub prev_ema21: Option<f64>,
    pub prev_vwap: Option<f64>,
    /// A close above PMH has been seen earlier today.
    pub breakout_seen: bool,
    /// A pullback of at least `hod_pullback_pct` from HOD has formed and no
    /// new high has been made since.
    pub hod_pullback_armed: bool,
}

/// A setup that fired: tag, raw stop level, starter sizing flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntrySignal {
    pub setup: SetupTag,
    pub stop_base: f64,
    pub starter: bool,
}

/// Price above the slow EMAs (and baseline when required).
fn macro_filter(cfg: &StrategyConfig, close: f64, snap: &FeatureSnapshot) -> bool {
    let (Some(ema34), Some(ema55)) = (snap.ema34, snap.ema55) else {
        return false;
    };
    if close <= ema34 || close <= ema55 {
        return false;
    }
    if cfg.require_baseline {
        match snap.baseline {
            Some(baseline) if close > baseline => {}
            _ => return false,
        }
    }
    true
}

/// Price above the fast EMAs with a bullish squeeze read.
fn micro_filter(close: f64, snap: &FeatureSnapshot) -> bool {
    let (Some(ema8), Some(ema21)) = (snap.ema8, snap.ema21) else {
        return false;
    };
    close > ema8 && close > ema21 && snap.ttm_state.is_bullish()
}

/// Evaluate the enabled setups against this bar close. First hit wins;
/// the order A→E is the tie-break.
pub fn entry_signal(
    cfg: &StrategyConfig,
    max_extension_for_entry: f64,
    level_tolerance: f64,
    ctx: &SetupContext,
    bar: &Bar,
    snap: &FeatureSnapshot,
) -> Option<EntrySignal> {
    let close = bar.close;

    if !macro_filter(cfg, close, snap) {
        return None;
    }
    if snap.momentum_sign != MomentumSign::Bull {
        return None;
    }
    // Over-extension gate: no chasing, starter probes included.
    match snap.extension_from_ema8 {
        Some(ext) if ext <= max_extension_for_entry => {}
        _ => return None,
    }

    let micro_ok = micro_filter(close, snap);

    // A: PMH breakout hold.
    if cfg.enable_pmh_breakout && micro_ok {
        if let (Some(pmh), Some(prev_close)) = (snap.pmh, ctx.prev_close) {
            if prev_close <= pmh && close > pmh {
                return Some(EntrySignal {
                    setup: SetupTag::PmhBreakoutHold,
                    stop_base: pmh.min(bar.low),
                    starter: false,
                });
            }
        }
    }

    // B: pullback hold: reclaim of VWAP, EMA21 or EMA8 after a breakout leg.
    if cfg.enable_pullback_hold && micro_ok && ctx.breakout_seen {
        let refs = [
            (ctx.prev_vwap, snap.vwap_rth),
            (ctx.prev_ema21, snap.ema21),
            (ctx.prev_ema8, snap.ema8),
        ];
        for (prev_ref, cur_ref) in refs {
            if let (Some(prev_close), Some(prev_ref), Some(cur_ref)) =
                (ctx.prev_close, prev_ref, cur_ref)
            {
                if prev_close <= prev_ref && close > cur_ref {
                    return Some(EntrySignal {
                        setup: SetupTag::PullbackHold,
                        stop_base: cur_ref,
                        starter: false,
                    });
                }
            }
        }
    }

    // C: double bottom plus EMA8 reclaim.
    if cfg.enable_double_bottom && micro_ok && snap.pivot_lows.len() >= 2 {
        let l1 = snap.pivot_lows[snap.pivot_lows.len() - 2];
        let l2 = snap.pivot_lows[snap.pivot_lows.len() - 1];
        let within = (l1 - l2).abs() / l1.min(l2) <= level_tolerance;
        let reclaimed = matches!(
            (ctx.prev_close, ctx.prev_ema8),
            (Some(prev_close), Some(prev_ema8)) if prev_close <= prev_ema8
        );
        if within && reclaimed {
            return Some(EntrySignal {
                setup: SetupTag::DoubleBottomReclaim,
                stop_base: l1.min(l2),
                starter: false,
            });
        }
    }

    // D: starter probe: TTM slightly bearish, price holding a level.
    if cfg.enable_starter_probe
        && snap.ttm_state == crate::features::TtmState::WeakBear
        && snap.ema8.is_some_and(|e| close > e)
        && snap.ema21.is_some_and(|e| close > e)
    {
        if let Some(level) = nearest_support_below(&snap.levels, close) {
            let holds = (close - level) / level <= cfg.starter_level_tolerance
                && bar.low >= level;
            if holds {
                return Some(EntrySignal {
                    setup: SetupTag::StarterProbe,
                    stop_base: level,
                    starter: true,
                });
            }
        }
    }

    // E: HOD breakout after room: EMA21 reclaim on rising fast support.
    if cfg.enable_hod_breakout && micro_ok && ctx.hod_pullback_armed {
        let reclaimed = matches!(
            (ctx.prev_close, ctx.prev_ema21),
            (Some(prev_close), Some(prev_ema21)) if prev_close <= prev_ema21
        );
        let support_rising = matches!(
            (snap.ema8, ctx.prev_ema8),
            (Some(cur), Some(prev)) if cur >= prev
        );
        if reclaimed && support_rising {
            if let Some(ema21) = snap.ema21 {
                return Some(EntrySignal {
                    setup: SetupTag::HodBreakout,
                    stop_base: ema21,
                    starter: false,
                });
            }
        }
    }

    None
}
