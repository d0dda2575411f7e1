//! Fill price adjustments: directional slippage plus half the quoted
//! spread, and the flat round-trip fee charged once on the final exit.

use crate::config::FillsConfig;

#[derive(Debug, Clone, Copy)]
pub struct FillModel {
    slippage_bps: f64,
    half_spread: f64,
    fees_per_trade: f64,
}

impl FillModel {
    pub fn new(config: &FillsConfig) -> Self {
        Self {
            slippage_bps: config.slippage_bps,
            half_spread: config.spread_cents / 100.0 / 2.0,
            fees_per_trade: config.fees_per_trade,
        }
    }

    /// Frictionless model for tests and sensitivity baselines.
    pub fn frictionless() -> Self {
        Self { slippage_bps: 0.0, half_spread: 0.0, fees_per_trade: 0.0 }
    }

    /// Buy: pay up by slippage and half the spread.
    pub fn entry_price(&self, raw: f64) -> f64 {
        raw * (1.0 + self.slippage_bps / 1e4) + self.half_spread
    }

    /// Sell: give up slippage and half the spread.
    pub fn exit_price(&self, raw: f64) -> f64 {
        raw * (1.0 - self.slippage_bps / 1e4) - self.half_spread
    }

    pub fn fees_per_trade(&self) -> f64 {
        self.fees_per_trade
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frictionless_passthrough() {
        let model = FillModel::frictionless();
        assert_eq!(model.entry_price(10.0), 10.0);
        assert_eq!(model.exit_price(10.0), 10.0);
        assert_eq!(model.fees_per_trade(), 0.0);
    }

    #[test]
    fn entry_pays_up_exit_gives_up() {
        let config = FillsConfig { slippage_bps: 10.0, spread_cents: 2.0, fees_per_trade: 1.0 };
        let model = FillModel::new(&config);
        // 10 bps on $10.00 is one cent, plus a one-cent half spread.
        assert!((model.entry_price(10.0) - 10.02).abs() < 1e-9);
        assert!((model.exit_price(10.0) - 9.98).abs() < 1e-9);
        assert!(model.entry_price(10.0) > 10.0);
        assert!(model.exit_price(10.0) < 10.0);
    }
}
