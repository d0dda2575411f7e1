//! Level construction: fractal pivots, round numbers and the clustered
//! ladder used for scale-out targets and failed-breakout checks.

use std::collections::VecDeque;

/// Rolling fractal pivot detector.
///
/// A bar is a pivot high when its high is the strict maximum of the
/// `window` bars on each side. Confirmation is therefore delayed by
/// `window` bars: the pivot at index `i` enters the ladder only once bar
/// `i + window` has been seen, which keeps snapshots causal.
#[derive(Debug, Clone)]
pub struct PivotTracker {
    window: usize,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
    confirmed_highs: Vec<f64>,
    confirmed_lows: Vec<f64>,
}

impl PivotTracker {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "pivot window must be >= 1");
        Self {
            window,
            highs: VecDeque::new(),
            lows: VecDeque::new(),
            confirmed_highs: Vec::new(),
            confirmed_lows: Vec::new(),
        }
    }

    pub fn update(&mut self, high: f64, low: f64) {
        let span = 2 * self.window + 1;
        self.highs.push_back(high);
        self.lows.push_back(low);
        if self.highs.len() > span {
            self.highs.pop_front();
            self.lows.pop_front();
        }
        if self.highs.len() < span {
            return;
        }

        // Candidate sits in the middle of the retained span.
        let mid = self.window;
        let candidate_high = self.highs[mid];
        if self
            .highs
            .iter()
            .enumerate()
            .all(|(i, &h)| i == mid || h < candidate_high)
        {
            self.confirmed_highs.push(candidate_high);
        }
        let candidate_low = self.lows[mid];
        if self
            .lows
            .iter()
            .enumerate()
            .all(|(i, &l)| i == mid || l > candidate_low)
        {
            self.confirmed_lows.push(candidate_low);
        }
    }

    pub fn highs(&self) -> &[f64] {
        &self.confirmed_highs
    }

    pub fn lows(&self) -> &[f64] {
        &self.confirmed_lows
    }
}

/// Whole- and half-dollar prices within ±5% of `price`.
pub fn round_levels(price: f64) -> Vec<f64> {
    if price <= 0.0 {
        return Vec::new();
    }
    let lo = price * 0.95;
    let hi = price * 1.05;
    let mut level = (lo * 2.0).ceil() / 2.0;
    let mut out = Vec::new();
    while level <= hi {
        out.push(level);
        level += 0.5;
    }
    out
}

/// Merge levels closer than `tolerance` (relative) into their mean.
/// Input order does not matter; output is ascending.
pub fn cluster_levels(mut levels: Vec<f64>, tolerance: f64) -> Vec<f64> {
    levels.retain(|l| l.is_finite() && *l > 0.0);
    levels.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut out: Vec<f64> = Vec::with_capacity(levels.len());
    let mut cluster: Vec<f64> = Vec::new();
    for level in levels {
        match cluster.last() {
            Some(&last) if (level - last) / last <= tolerance => cluster.push(level),
            Some(_) => {
                out.push(cluster.iter().sum::<f64>() / cluster.len() as f64);
                cluster = vec![level];
            }
            None => cluster.push(level),
        }
    }
    if !cluster.is_empty() {
        out.push(cluster.iter().sum::<f64>() / cluster.len() as f64);
    }
    out
}

/// First ladder level strictly above `price`.
pub fn next_resistance_above(levels: &[f64], price: f64) -> Option<f64> {
    levels.iter().copied().find(|&l| l > price)
}

/// Closest ladder level at or below `price`.
pub fn nearest_support_below(levels: &[f64], price: f64) -> Option<f64> {
    levels.iter().copied().filter(|&l| l <= price).next_back()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pivot_high_confirmed_after_window() {
        let mut tracker = PivotTracker::new(2);
        // Peak at the third bar; confirmation needs two bars on each side.
        for &(h, l) in &[(10.0, 9.5), (10.5, 10.0), (11.0, 10.5), (10.4, 10.0), (10.2, 9.8)] {
            tracker.update(h, l);
        }
        assert_eq!(tracker.highs(), &[11.0]);
        assert!(tracker.lows().is_empty());
    }

    #[test]
    fn pivot_low_confirmed_after_window() {
        let mut tracker = PivotTracker::new(1);
        for &(h, l) in &[(10.0, 9.5), (9.8, 9.0), (10.2, 9.6)] {
            tracker.update(h, l);
        }
        assert_eq!(tracker.lows(), &[9.0]);
    }

    #[test]
    fn plateau_is_not_a_pivot() {
        let mut tracker = PivotTracker::new(1);
        for &(h, l) in &[(10.0, 9.5), (10.0, 9.5), (10.0, 9.5)] {
            tracker.update(h, l);
        }
        assert!(tracker.highs().is_empty());
        assert!(tracker.lows().is_empty());
    }

    #[test]
    fn round_levels_cover_five_percent_band() {
        let levels = round_levels(10.0);
        assert_eq!(levels, vec![9.5, 10.0, 10.5]);
    }

    #[test]
    fn cluster_merges_near_duplicates() {
        let clustered = cluster_levels(vec![10.0, 10.01, 10.5], 0.002);
        assert_eq!(clustered.len(), 2);
        assert!((clustered[0] - 10.005).abs() < 1e-9);
        assert!((clustered[1] - 10.5).abs() < 1e-9);
    }

    #[test]
    fn resistance_and_support_lookup() {
        let ladder = vec![9.5, 10.0, 10.5];
        assert_eq!(next_resistance_above(&ladder, 10.0), Some(10.5));
        assert_eq!(nearest_support_below(&ladder, 10.2), Some(10.0));
        assert_eq!(next_resistance_above(&ladder, 11.0), None);
        assert_eq!(nearest_support_below(&ladder, 9.0), None);
    }
}
