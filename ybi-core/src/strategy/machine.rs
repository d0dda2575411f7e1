//! Per-ticker strategy driver.
//!
//! States: flat → entered → scaled → exited, with re-entry allowed while
//! the daily gates permit. The machine consumes bar closes with their
//! snapshots, tracks the small amount of cross-bar context the setups
//! need, and emits pending intents for the next bar's open.

use crate::config::{FeaturesConfig, StrategyConfig};
use crate::domain::{Bar, PendingIntent, Position};
use crate::features::levels::next_resistance_above;
use crate::features::FeatureSnapshot;
use crate::strategy::exits::exit_signal;
use crate::strategy::setups::{entry_signal, SetupContext};
use tracing::trace;

pub struct TickerStrategy {
    ticker: String,
    cfg: StrategyConfig,
    max_extension_for_entry: f64,
    max_extension_for_exit: f64,
    level_tolerance: f64,
    ctx: SetupContext,
}

impl TickerStrategy {
    pub fn new(ticker: &str, strategy: &StrategyConfig, features: &FeaturesConfig) -> Self {
        Self {
            ticker: ticker.to_string(),
            cfg: strategy.clone(),
            max_extension_for_entry: features.max_extension_for_entry,
            max_extension_for_exit: features.max_extension_for_exit,
            level_tolerance: features.level_cluster_tolerance,
            ctx: SetupContext::default(),
        }
    }

    /// Process one bar close. Entry evaluation is gated by the entry
    /// window; exit evaluation runs until the session close.
    pub fn on_bar_close(
        &mut self,
        bar: &Bar,
        snap: &FeatureSnapshot,
        position: Option<&Position>,
        in_entry_window: bool,
    ) -> Option<PendingIntent> {
        self.track_breakout(bar, snap);
        self.track_hod_pullback(bar, snap);

        let intent = match position {
            Some(position) => exit_signal(
                &self.cfg,
                self.max_extension_for_exit,
                bar,
                snap,
                position,
            )
            .map(|reason| {
                trace!(ticker = %self.ticker, reason = reason.as_str(), "exit signal");
                PendingIntent::exit(&self.ticker, bar.ts, reason)
            }),
            None if in_entry_window => entry_signal(
                &self.cfg,
                self.max_extension_for_entry,
                self.level_tolerance,
                &self.ctx,
                bar,
                snap,
            )
            .map(|signal| {
                trace!(ticker = %self.ticker, setup = signal.setup.as_str(), "entry signal");
                let mut intent = PendingIntent::enter(
                    &self.ticker,
                    bar.ts,
                    signal.setup,
                    signal.stop_base,
                    signal.starter,
                );
                intent.scale_target = next_resistance_above(&snap.levels, bar.close);
                intent
            }),
            None => None,
        };

        self.update_prevs(bar, snap);
        intent
    }

    fn track_breakout(&mut self, bar: &Bar, snap: &FeatureSnapshot) {
        if let Some(pmh) = snap.pmh {
            if bar.close > pmh {
                self.ctx.breakout_seen = true;
            }
        }
    }

    /// Setup E arming: a new HOD disarms, a deep-enough pullback arms.
    fn track_hod_pullback(&mut self, bar: &Bar, snap: &FeatureSnapshot) {
        let Some(hod) = snap.hod_so_far else {
            return;
        };
        if bar.high >= hod {
            self.ctx.hod_pullback_armed = false;
        } else if (hod - bar.close) / hod >= self.cfg.hod_pullback_pct {
            self.ctx.hod_pullback_armed = true;
        }
    }

    fn update_prevs(&mut self, bar: &Bar, snap: &FeatureSnapshot) {
        self.ctx.prev_close = Some(bar.close);
        if snap.ema8.is_some() {
            self.ctx.prev_ema8 = snap.ema8;
        }
        if snap.ema21.is_some() {
            self.ctx.prev_ema21 = snap.ema21;
        }
        if snap.vwap_rth.is_some() {
            self.ctx.prev_vwap = snap.vwap_rth;
        }
    }
}
