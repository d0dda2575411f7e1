//! Per-(ticker, day) feature engine.
//!
//! Consumes the day's chronological bar stream (premarket included) and
//! emits one `FeatureSnapshot` per bar close. Premarket bars warm the EMAs
//! and accumulate PMH/PML but produce no tradeable snapshots; the strategy
//! only consumes snapshots inside the entry window.

use crate::config::{BaselineKind, FeaturesConfig};
use crate::domain::{Bar, DailyBar};
use crate::features::ema::{StreamingEma, StreamingSma, StreamingVwap};
use crate::features::levels::{cluster_levels, round_levels, PivotTracker};
use crate::features::squeeze::{MomentumSign, SqueezeEngine, TtmState};
use chrono::{DateTime, Utc};

/// Causal view of one ticker at one bar close. Prior snapshots are
/// read-only; nothing here depends on a bar after `ts`.
#[derive(Debug, Clone)]
pub struct FeatureSnapshot {
    pub ts: DateTime<Utc>,
    pub ema8: Option<f64>,
    pub ema21: Option<f64>,
    pub ema34: Option<f64>,
    pub ema55: Option<f64>,
    /// 200-period SMA or EMA, per configuration.
    pub baseline: Option<f64>,
    pub vwap_rth: Option<f64>,
    pub ttm_state: TtmState,
    pub momentum_sign: MomentumSign,
    pub momentum: Option<f64>,
    /// (high − ema8) / ema8.
    pub extension_from_ema8: Option<f64>,
    pub pmh: Option<f64>,
    pub pml: Option<f64>,
    pub pdh: Option<f64>,
    pub pdl: Option<f64>,
    pub open_px: Option<f64>,
    pub hod_so_far: Option<f64>,
    pub lod_so_far: Option<f64>,
    pub pivot_highs: Vec<f64>,
    pub pivot_lows: Vec<f64>,
    /// Whole and half dollars within ±5% of the latest close.
    pub round_levels: Vec<f64>,
    /// Clustered ladder of every known level, ascending.
    pub levels: Vec<f64>,
}

enum Baseline {
    Sma(StreamingSma),
    Ema(StreamingEma),
}

impl Baseline {
    fn update(&mut self, x: f64) -> Option<f64> {
        match self {
            Baseline::Sma(sma) => sma.update(x),
            Baseline::Ema(ema) => ema.update(x),
        }
    }
}

pub struct FeatureEngine {
    cluster_tolerance: f64,
    rth_open: DateTime<Utc>,
    premarket_end: DateTime<Utc>,

    ema8: StreamingEma,
    ema21: StreamingEma,
    ema34: StreamingEma,
    ema55: StreamingEma,
    baseline: Baseline,
    vwap: StreamingVwap,
    squeeze: SqueezeEngine,
    pivots: PivotTracker,

    pmh: Option<f64>,
    pml: Option<f64>,
    pdh: Option<f64>,
    pdl: Option<f64>,
    open_px: Option<f64>,
    hod: Option<f64>,
    lod: Option<f64>,
}

impl FeatureEngine {
    pub fn new(
        config: &FeaturesConfig,
        prev_daily: Option<&DailyBar>,
        rth_open: DateTime<Utc>,
        premarket_end: DateTime<Utc>,
    ) -> Self {
        let [p8, p21, p34, p55] = config.ema_periods;
        let baseline = match config.baseline_kind {
            BaselineKind::Sma => Baseline::Sma(StreamingSma::new(config.baseline_period)),
            BaselineKind::Ema => Baseline::Ema(StreamingEma::new(config.baseline_period)),
        };
        Self {
            cluster_tolerance: config.level_cluster_tolerance,
            rth_open,
            premarket_end,
            ema8: StreamingEma::new(p8),
            ema21: StreamingEma::new(p21),
            ema34: StreamingEma::new(p34),
            ema55: StreamingEma::new(p55),
            baseline,
            vwap: StreamingVwap::new(),
            squeeze: SqueezeEngine::new(config.squeeze_length),
            pivots: PivotTracker::new(config.pivot_window),
            pmh: None,
            pml: None,
            pdh: prev_daily.map(|d| d.high),
            pdl: prev_daily.map(|d| d.low),
            open_px: None,
            hod: None,
            lod: None,
        }
    }

    /// Ingest the next bar and produce its close-aligned snapshot.
    pub fn update(&mut self, bar: &Bar) -> FeatureSnapshot {
        let ema8 = self.ema8.update(bar.close);
        let ema21 = self.ema21.update(bar.close);
        let ema34 = self.ema34.update(bar.close);
        let ema55 = self.ema55.update(bar.close);
        let baseline = self.baseline.update(bar.close);
        let reading = self.squeeze.update(bar);
        self.pivots.update(bar.high, bar.low);

        if bar.ts <= self.premarket_end {
            self.pmh = Some(self.pmh.map_or(bar.high, |h| h.max(bar.high)));
            self.pml = Some(self.pml.map_or(bar.low, |l| l.min(bar.low)));
        }

        let mut vwap_rth = self.vwap.value();
        if bar.ts >= self.rth_open {
            vwap_rth = self.vwap.update(bar.typical_price(), bar.volume);
            if self.open_px.is_none() {
                self.open_px = Some(bar.open);
            }
            self.hod = Some(self.hod.map_or(bar.high, |h| h.max(bar.high)));
            self.lod = Some(self.lod.map_or(bar.low, |l| l.min(bar.low)));
        }

        let extension = ema8.map(|e| (bar.high - e) / e);

        FeatureSnapshot {
            ts: bar.ts,
            ema8,
            ema21,
            ema34,
            ema55,
            baseline,
            vwap_rth,
            ttm_state: reading.state,
            momentum_sign: reading.sign,
            momentum: reading.momentum,
            extension_from_ema8: extension,
            pmh: self.pmh,
            pml: self.pml,
            pdh: self.pdh,
            pdl: self.pdl,
            open_px: self.open_px,
            hod_so_far: self.hod,
            lod_so_far: self.lod,
            pivot_highs: self.pivots.highs().to_vec(),
            pivot_lows: self.pivots.lows().to_vec(),
            round_levels: round_levels(bar.close),
            levels: self.ladder(bar.close),
        }
    }

    /// Assemble and cluster the level ladder around the latest close.
    fn ladder(&self, close: f64) -> Vec<f64> {
        let mut levels = Vec::new();
        levels.extend(self.pmh);
        levels.extend(self.pml);
        levels.extend(self.pdh);
        levels.extend(self.pdl);
        levels.extend(self.open_px);
        levels.extend(self.hod);
        levels.extend(self.lod);
        levels.extend_from_slice(self.pivots.highs());
        levels.extend_from_slice(self.pivots.lows());
        levels.extend(round_levels(close));
        cluster_levels(levels, self.cluster_tolerance)
    }
}
