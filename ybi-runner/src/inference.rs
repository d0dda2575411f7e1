//! Daily-series inference with Newey–West HAC standard errors.
//!
//! The primary significance test for the run: H0: E[daily P&L] = 0,
//! two-sided, with a Bartlett-kernel HAC estimator so autocorrelated daily
//! P&L does not understate the standard error.

use crate::metrics::{mean, sample_std};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

const MIN_DAYS: usize = 5;
const INSUFFICIENT_DAYS: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HacInference {
    pub method: String,
    pub description: String,
    pub n_days: usize,
    pub mean_daily_pnl: f64,
    pub std_daily_pnl: f64,
    pub total_pnl: f64,
    pub hac_std_error: f64,
    /// Newey–West lag truncation actually used.
    pub hac_bandwidth: usize,
    pub t_stat: f64,
    pub p_value: f64,
    pub ci_lower_95: f64,
    pub ci_upper_95: f64,
    pub is_significant_5pct: bool,
    pub insufficient_sample: bool,
    pub sample_size_warning: String,
}

impl HacInference {
    fn empty(n_days: usize, warning: &str) -> Self {
        Self {
            method: "hac_newey_west".into(),
            description: DESCRIPTION.into(),
            n_days,
            mean_daily_pnl: 0.0,
            std_daily_pnl: 0.0,
            total_pnl: 0.0,
            hac_std_error: 0.0,
            hac_bandwidth: 0,
            t_stat: 0.0,
            p_value: 1.0,
            ci_lower_95: 0.0,
            ci_upper_95: 0.0,
            is_significant_5pct: false,
            insufficient_sample: true,
            sample_size_warning: warning.into(),
        }
    }
}

const DESCRIPTION: &str = "Two-sided test of H0: E[daily P&L] = 0 using a Newey-West \
    (Bartlett kernel) standard error of the mean, which is robust to serial correlation \
    in the daily series. Error days are excluded from the denominator as missing data.";

/// Newey–West rule-of-thumb bandwidth: floor(4 * (N/100)^(2/9)), clamped
/// to [1, N-1].
pub fn newey_west_bandwidth(n: usize) -> usize {
    let raw = (4.0 * (n as f64 / 100.0).powf(2.0 / 9.0)).floor() as usize;
    raw.clamp(1, n.saturating_sub(1))
}

/// HAC standard error of the mean of `residuals` (already centered).
pub fn newey_west_se(residuals: &[f64], bandwidth: usize) -> f64 {
    let n = residuals.len();
    if n < 2 {
        return 0.0;
    }

    // Autocovariances up to the bandwidth, Bartlett-weighted.
    let gamma = |lag: usize| -> f64 {
        residuals[lag..]
            .iter()
            .zip(&residuals[..n - lag])
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / n as f64
    };

    let mut nw_var = gamma(0);
    for lag in 1..=bandwidth.min(n - 1) {
        let weight = 1.0 - lag as f64 / (bandwidth as f64 + 1.0);
        nw_var += 2.0 * weight * gamma(lag);
    }
    // Long-run variance can go negative in tiny samples; floor at zero.
    (nw_var.max(0.0) / n as f64).sqrt()
}

/// Run the inference over the eligible-day P&L series.
pub fn daily_series_inference(daily_pnl: &[f64]) -> HacInference {
    let n = daily_pnl.len();
    if n < MIN_DAYS {
        return HacInference::empty(n, "too few eligible days for inference");
    }

    let mean_pnl = mean(daily_pnl);
    let residuals: Vec<f64> = daily_pnl.iter().map(|p| p - mean_pnl).collect();
    let bandwidth = newey_west_bandwidth(n);
    let se = newey_west_se(&residuals, bandwidth);

    let mut result = HacInference {
        method: "hac_newey_west".into(),
        description: DESCRIPTION.into(),
        n_days: n,
        mean_daily_pnl: mean_pnl,
        std_daily_pnl: sample_std(daily_pnl),
        total_pnl: daily_pnl.iter().sum(),
        hac_std_error: se,
        hac_bandwidth: bandwidth,
        t_stat: 0.0,
        p_value: 1.0,
        ci_lower_95: mean_pnl,
        ci_upper_95: mean_pnl,
        is_significant_5pct: false,
        insufficient_sample: n < INSUFFICIENT_DAYS,
        sample_size_warning: if n < INSUFFICIENT_DAYS {
            format!("only {n} eligible days; inference is unreliable below {INSUFFICIENT_DAYS}")
        } else {
            String::new()
        },
    };

    if se > 0.0 {
        let t = mean_pnl / se;
        let dist = StudentsT::new(0.0, 1.0, (n - 1) as f64)
            .expect("valid Student-t for n >= 5");
        let p = 2.0 * (1.0 - dist.cdf(t.abs()));
        let t_crit = dist.inverse_cdf(0.975);

        result.t_stat = t;
        result.p_value = p.clamp(0.0, 1.0);
        result.ci_lower_95 = mean_pnl - t_crit * se;
        result.ci_upper_95 = mean_pnl + t_crit * se;
        result.is_significant_5pct = result.p_value < 0.05;
    }

    result
}
