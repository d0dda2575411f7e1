//! Streaming moving averages.
//!
//! EMA: `e_t = alpha * x_t + (1 - alpha) * e_{t-1}`, seeded with the SMA of
//! the first `period` values. Valid only once `count >= period`.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct StreamingEma {
    period: usize,
    alpha: f64,
    count: usize,
    seed_sum: f64,
    value: Option<f64>,
}

impl StreamingEma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            count: 0,
            seed_sum: 0.0,
            value: None,
        }
    }

    pub fn update(&mut self, x: f64) -> Option<f64> {
        self.count += 1;
        match self.value {
            None => {
                self.seed_sum += x;
                if self.count >= self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
            Some(prev) => {
                self.value = Some(self.alpha * x + (1.0 - self.alpha) * prev);
            }
        }
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

#[derive(Debug, Clone)]
pub struct StreamingSma {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl StreamingSma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self { period, window: VecDeque::with_capacity(period), sum: 0.0 }
    }

    pub fn update(&mut self, x: f64) -> Option<f64> {
        self.window.push_back(x);
        self.sum += x;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        (self.window.len() == self.period).then(|| self.sum / self.period as f64)
    }
}

/// Cumulative session VWAP over typical price.
#[derive(Debug, Clone, Default)]
pub struct StreamingVwap {
    cum_pv: f64,
    cum_v: f64,
}

impl StreamingVwap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, typical_price: f64, volume: f64) -> Option<f64> {
        self.cum_pv += typical_price * volume;
        self.cum_v += volume;
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        (self.cum_v > 0.0).then(|| self.cum_pv / self.cum_v)
    }
}
