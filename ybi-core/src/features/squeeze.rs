//! TTM Squeeze proxy.
//!
//! Bollinger Bands (SMA ± 2σ) against Keltner Channels (EMA ± 1.5·ATR);
//! the squeeze is on when both Bollinger bands sit inside the Keltner
//! channel. The momentum histogram is the LazyBear construction (close
//! minus the midpoint of the Donchian mid and the SMA) smoothed by the
//! fitted value of a rolling OLS line. This is an approximation of the
//! proprietary indicator and is labelled as such in reports.

use crate::domain::Bar;
use crate::features::ema::StreamingEma;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtmState {
    StrongBull,
    WeakBull,
    WeakBear,
    StrongBear,
    None,
}

impl TtmState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtmState::StrongBull => "strong_bull",
            TtmState::WeakBull => "weak_bull",
            TtmState::WeakBear => "weak_bear",
            TtmState::StrongBear => "strong_bear",
            TtmState::None => "none",
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, TtmState::StrongBull | TtmState::WeakBull)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, TtmState::StrongBear | TtmState::WeakBear)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumSign {
    Bull,
    Bear,
    None,
}

/// Output of one squeeze update.
#[derive(Debug, Clone, Copy)]
pub struct SqueezeReading {
    pub squeeze_on: Option<bool>,
    pub momentum: Option<f64>,
    pub state: TtmState,
    pub sign: MomentumSign,
}

#[derive(Debug, Clone)]
pub struct SqueezeEngine {
    length: usize,
    bb_mult: f64,
    kc_mult: f64,
    closes: VecDeque<f64>,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
    true_ranges: VecDeque<f64>,
    kc_mid: StreamingEma,
    momentum_raw: VecDeque<f64>,
    prev_close: Option<f64>,
    prev_momentum: Option<f64>,
}

impl SqueezeEngine {
    pub fn new(length: usize) -> Self {
        assert!(length >= 2, "squeeze length must be >= 2");
        Self {
            length,
            bb_mult: 2.0,
            kc_mult: 1.5,
            closes: VecDeque::with_capacity(length),
            highs: VecDeque::with_capacity(length),
            lows: VecDeque::with_capacity(length),
            true_ranges: VecDeque::with_capacity(length),
            kc_mid: StreamingEma::new(length),
            momentum_raw: VecDeque::with_capacity(length),
            prev_close: None,
            prev_momentum: None,
        }
    }

    pub fn update(&mut self, bar: &Bar) -> SqueezeReading {
        let tr = match self.prev_close {
            Some(prev) => (bar.high - bar.low)
                .max((bar.high - prev).abs())
                .max((bar.low - prev).abs()),
            None => bar.high - bar.low,
        };
        self.prev_close = Some(bar.close);

        push_window(&mut self.closes, bar.close, self.length);
        push_window(&mut self.highs, bar.high, self.length);
        push_window(&mut self.lows, bar.low, self.length);
        push_window(&mut self.true_ranges, tr, self.length);
        let kc_mid = self.kc_mid.update(bar.close);

        if self.closes.len() < self.length {
            return SqueezeReading {
                squeeze_on: None,
                momentum: None,
                state: TtmState::None,
                sign: MomentumSign::None,
            };
        }

        let sma = mean(&self.closes);
        let std = population_std(&self.closes, sma);
        let atr = mean(&self.true_ranges);
        let kc_mid = kc_mid.expect("EMA warm once the window is full");

        let bb_upper = sma + self.bb_mult * std;
        let bb_lower = sma - self.bb_mult * std;
        let kc_upper = kc_mid + self.kc_mult * atr;
        let kc_lower = kc_mid - self.kc_mult * atr;
        let squeeze_on = bb_lower > kc_lower && bb_upper < kc_upper;

        let highest = self.highs.iter().copied().fold(f64::MIN, f64::max);
        let lowest = self.lows.iter().copied().fold(f64::MAX, f64::min);
        let midline = ((highest + lowest) / 2.0 + sma) / 2.0;
        push_window(&mut self.momentum_raw, bar.close - midline, self.length);

        if self.momentum_raw.len() < self.length {
            return SqueezeReading {
                squeeze_on: Some(squeeze_on),
                momentum: None,
                state: TtmState::None,
                sign: MomentumSign::None,
            };
        }

        let momentum = linreg_fitted_last(&self.momentum_raw);
        let delta = self.prev_momentum.map(|prev| momentum - prev);
        self.prev_momentum = Some(momentum);

        let state = classify(squeeze_on, momentum, delta);
        let sign = if momentum > 0.0 {
            MomentumSign::Bull
        } else if momentum < 0.0 {
            MomentumSign::Bear
        } else {
            MomentumSign::None
        };

        SqueezeReading { squeeze_on: Some(squeeze_on), momentum: Some(momentum), state, sign }
    }
}

/// Four-state colour map: strong states need the squeeze released and the
/// histogram moving with the trend; everything else inside the sign is weak.
fn classify(squeeze_on: bool, momentum: f64, delta: Option<f64>) -> TtmState {
    if momentum > 0.0 {
        match delta {
            Some(d) if !squeeze_on && d >= 0.0 => TtmState::StrongBull,
            _ => TtmState::WeakBull,
        }
    } else if momentum < 0.0 {
        match delta {
            Some(d) if !squeeze_on && d < 0.0 => TtmState::StrongBear,
            _ => TtmState::WeakBear,
        }
    } else {
        TtmState::None
    }
}

fn push_window(window: &mut VecDeque<f64>, value: f64, cap: usize) {
    window.push_back(value);
    if window.len() > cap {
        window.pop_front();
    }
}

fn mean(values: &VecDeque<f64>) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &VecDeque<f64>, mean: f64) -> f64 {
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// OLS over x = 0..n-1, returning the fitted value at the last x.
fn linreg_fitted_last(values: &VecDeque<f64>) -> f64 {
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = mean(values);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    if sxx == 0.0 {
        return y_mean;
    }
    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    intercept + slope * (n - 1.0)
}
