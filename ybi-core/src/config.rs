//! YAML run configuration.
//!
//! Every section is typed with serde defaults so a minimal file works, and
//! unknown keys are rejected so typos fail loudly instead of silently
//! running with defaults. The fully resolved config is serialized into
//! `run_metadata.json` for reproducibility.

use crate::calendar::SessionClock;
use crate::domain::SelectionMethod;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid time '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub universe: UniverseConfig,
    #[serde(default)]
    pub watchlist: WatchlistConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub fills: FillsConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// No entries before this Eastern wall-clock time.
    #[serde(default = "default_entry_start")]
    pub entry_window_start: String,
    /// No entries after this time; exits stay active until the close.
    #[serde(default = "default_entry_end")]
    pub entry_window_end: String,
    /// Hard close for any remaining position.
    #[serde(default = "default_force_flat")]
    pub force_flat_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UniverseConfig {
    #[serde(default = "default_price_min")]
    pub price_min: f64,
    #[serde(default = "default_price_max")]
    pub price_max: f64,
    /// Reference data is authoritative for hygiene when present.
    #[serde(default = "default_true")]
    pub use_reference_data: bool,
    /// Deterministic cap on the premarket scan; recorded in run metadata.
    #[serde(default = "default_max_candidates")]
    pub max_candidates_to_scan: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchlistConfig {
    #[serde(default = "default_method")]
    pub method: SelectionMethod,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_min_gap_pct")]
    pub min_gap_pct: f64,
    #[serde(default = "default_min_premarket_pct")]
    pub min_premarket_pct: f64,
    #[serde(default = "default_min_premarket_volume")]
    pub min_premarket_volume: f64,
    #[serde(default = "default_min_premarket_dollar_volume")]
    pub min_premarket_dollar_volume: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeaturesConfig {
    #[serde(default = "default_ema_periods")]
    pub ema_periods: [usize; 4],
    #[serde(default = "default_baseline_period")]
    pub baseline_period: usize,
    #[serde(default = "default_baseline_kind")]
    pub baseline_kind: BaselineKind,
    #[serde(default = "default_squeeze_length")]
    pub squeeze_length: usize,
    #[serde(default = "default_pivot_window")]
    pub pivot_window: usize,
    #[serde(default = "default_cluster_tolerance")]
    pub level_cluster_tolerance: f64,
    #[serde(default = "default_max_ext_entry")]
    pub max_extension_for_entry: f64,
    #[serde(default = "default_max_ext_exit")]
    pub max_extension_for_exit: f64,
}

/// 200-period baseline flavour; the source material supports either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineKind {
    Sma,
    Ema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    #[serde(default = "default_true")]
    pub enable_pmh_breakout: bool,
    #[serde(default = "default_true")]
    pub enable_pullback_hold: bool,
    #[serde(default = "default_true")]
    pub enable_double_bottom: bool,
    #[serde(default = "default_true")]
    pub enable_starter_probe: bool,
    #[serde(default = "default_true")]
    pub enable_hod_breakout: bool,
    /// Require price above the 200-period baseline for entries.
    #[serde(default)]
    pub require_baseline: bool,
    #[serde(default = "default_starter_fraction")]
    pub starter_fraction: f64,
    #[serde(default = "default_scale_fraction")]
    pub scale_fraction: f64,
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,
    /// Stop is placed at `stop_base * (1 - stop_buffer_pct)`.
    #[serde(default = "default_stop_buffer")]
    pub stop_buffer_pct: f64,
    /// Minimum bars held before the close-below-EMA8 exit can fire.
    #[serde(default = "default_ema8_exit_min_bars")]
    pub ema8_exit_min_bars_held: usize,
    /// Pullback from HOD required before setup E can trigger.
    #[serde(default = "default_hod_pullback")]
    pub hod_pullback_pct: f64,
    /// How close the bar must hold a level for the starter probe.
    #[serde(default = "default_starter_level_tolerance")]
    pub starter_level_tolerance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskConfig {
    #[serde(default = "default_starting_equity")]
    pub starting_equity: f64,
    #[serde(default = "default_risk_per_trade")]
    pub risk_per_trade_pct: f64,
    #[serde(default = "default_max_notional_pct")]
    pub max_position_notional_pct: f64,
    #[serde(default = "default_max_trades_per_day")]
    pub max_trades_per_day: u32,
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss_dollars: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FillsConfig {
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: f64,
    /// Quoted spread in cents; half is paid on each side.
    #[serde(default = "default_spread_cents")]
    pub spread_cents: f64,
    /// Flat fee per round trip, charged once on the final exit.
    #[serde(default)]
    pub fees_per_trade: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InferenceConfig {
    #[serde(default = "default_block_len")]
    pub bootstrap_block_len: usize,
    #[serde(default = "default_n_bootstrap")]
    pub n_bootstrap: usize,
    #[serde(default = "default_seed")]
    pub random_seed: u64,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_str(&contents)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.universe.price_min >= self.universe.price_max {
            return Err(ConfigError::Invalid(format!(
                "universe.price_min {} must be below price_max {}",
                self.universe.price_min, self.universe.price_max
            )));
        }
        if self.watchlist.top_n == 0 {
            return Err(ConfigError::Invalid("watchlist.top_n must be >= 1".into()));
        }
        if self.universe.max_candidates_to_scan < self.watchlist.top_n {
            return Err(ConfigError::Invalid(
                "universe.max_candidates_to_scan must be >= watchlist.top_n".into(),
            ));
        }
        for frac in [
            ("strategy.starter_fraction", self.strategy.starter_fraction),
            ("strategy.scale_fraction", self.strategy.scale_fraction),
        ] {
            if !(0.0..=1.0).contains(&frac.1) || frac.1 == 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be in (0, 1], got {}",
                    frac.0, frac.1
                )));
            }
        }
        if self.risk.risk_per_trade_pct <= 0.0 || self.risk.risk_per_trade_pct > 0.5 {
            return Err(ConfigError::Invalid(format!(
                "risk.risk_per_trade_pct out of range: {}",
                self.risk.risk_per_trade_pct
            )));
        }
        if self.risk.starting_equity <= 0.0 {
            return Err(ConfigError::Invalid("risk.starting_equity must be positive".into()));
        }
        if self.inference.n_bootstrap == 0 || self.inference.bootstrap_block_len == 0 {
            return Err(ConfigError::Invalid(
                "inference.n_bootstrap and bootstrap_block_len must be >= 1".into(),
            ));
        }
        let (start, end, flat) = (
            parse_hhmm(&self.session.entry_window_start)?,
            parse_hhmm(&self.session.entry_window_end)?,
            parse_hhmm(&self.session.force_flat_time)?,
        );
        if start >= end || end > flat {
            return Err(ConfigError::Invalid(format!(
                "session window must satisfy start < end <= force_flat ({} / {} / {})",
                self.session.entry_window_start,
                self.session.entry_window_end,
                self.session.force_flat_time
            )));
        }
        Ok(())
    }

    /// Build the session clock from the configured wall-clock times.
    pub fn session_clock(&self) -> Result<SessionClock, ConfigError> {
        Ok(SessionClock::new(
            parse_hhmm(&self.session.entry_window_start)?,
            parse_hhmm(&self.session.entry_window_end)?,
            parse_hhmm(&self.session.force_flat_time)?,
        ))
    }
}

/// Parse "HH:MM" into a wall-clock time.
pub fn parse_hhmm(value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| ConfigError::InvalidTime(value.to_string()))
}

fn default_entry_start() -> String {
    "09:30".into()
}
fn default_entry_end() -> String {
    "11:00".into()
}
fn default_force_flat() -> String {
    "16:00".into()
}
fn default_price_min() -> f64 {
    0.5
}
fn default_price_max() -> f64 {
    20.0
}
fn default_true() -> bool {
    true
}
fn default_max_candidates() -> usize {
    500
}
fn default_method() -> SelectionMethod {
    SelectionMethod::GapOpen
}
fn default_top_n() -> usize {
    20
}
fn default_min_gap_pct() -> f64 {
    0.05
}
fn default_min_premarket_pct() -> f64 {
    0.10
}
fn default_min_premarket_volume() -> f64 {
    100_000.0
}
fn default_min_premarket_dollar_volume() -> f64 {
    500_000.0
}
fn default_ema_periods() -> [usize; 4] {
    [8, 21, 34, 55]
}
fn default_baseline_period() -> usize {
    200
}
fn default_baseline_kind() -> BaselineKind {
    BaselineKind::Sma
}
fn default_squeeze_length() -> usize {
    20
}
fn default_pivot_window() -> usize {
    5
}
fn default_cluster_tolerance() -> f64 {
    0.002
}
fn default_max_ext_entry() -> f64 {
    0.015
}
fn default_max_ext_exit() -> f64 {
    0.05
}
fn default_starter_fraction() -> f64 {
    0.25
}
fn default_scale_fraction() -> f64 {
    0.5
}
fn default_cooldown_minutes() -> i64 {
    2
}
fn default_stop_buffer() -> f64 {
    0.001
}
fn default_ema8_exit_min_bars() -> usize {
    2
}
fn default_hod_pullback() -> f64 {
    0.02
}
fn default_starter_level_tolerance() -> f64 {
    0.005
}
fn default_starting_equity() -> f64 {
    10_000.0
}
fn default_risk_per_trade() -> f64 {
    0.01
}
fn default_max_notional_pct() -> f64 {
    0.25
}
fn default_max_trades_per_day() -> u32 {
    5
}
fn default_max_daily_loss() -> f64 {
    200.0
}
fn default_slippage_bps() -> f64 {
    5.0
}
fn default_spread_cents() -> f64 {
    2.0
}
fn default_block_len() -> usize {
    5
}
fn default_n_bootstrap() -> usize {
    10_000
}
fn default_seed() -> u64 {
    42
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            entry_window_start: default_entry_start(),
            entry_window_end: default_entry_end(),
            force_flat_time: default_force_flat(),
        }
    }
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            price_min: default_price_min(),
            price_max: default_price_max(),
            use_reference_data: true,
            max_candidates_to_scan: default_max_candidates(),
        }
    }
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            top_n: default_top_n(),
            min_gap_pct: default_min_gap_pct(),
            min_premarket_pct: default_min_premarket_pct(),
            min_premarket_volume: default_min_premarket_volume(),
            min_premarket_dollar_volume: default_min_premarket_dollar_volume(),
        }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            ema_periods: default_ema_periods(),
            baseline_period: default_baseline_period(),
            baseline_kind: default_baseline_kind(),
            squeeze_length: default_squeeze_length(),
            pivot_window: default_pivot_window(),
            level_cluster_tolerance: default_cluster_tolerance(),
            max_extension_for_entry: default_max_ext_entry(),
            max_extension_for_exit: default_max_ext_exit(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            enable_pmh_breakout: true,
            enable_pullback_hold: true,
            enable_double_bottom: true,
            enable_starter_probe: true,
            enable_hod_breakout: true,
            require_baseline: false,
            starter_fraction: default_starter_fraction(),
            scale_fraction: default_scale_fraction(),
            cooldown_minutes: default_cooldown_minutes(),
            stop_buffer_pct: default_stop_buffer(),
            ema8_exit_min_bars_held: default_ema8_exit_min_bars(),
            hod_pullback_pct: default_hod_pullback(),
            starter_level_tolerance: default_starter_level_tolerance(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            starting_equity: default_starting_equity(),
            risk_per_trade_pct: default_risk_per_trade(),
            max_position_notional_pct: default_max_notional_pct(),
            max_trades_per_day: default_max_trades_per_day(),
            max_daily_loss_dollars: default_max_daily_loss(),
        }
    }
}

impl Default for FillsConfig {
    fn default() -> Self {
        Self {
            slippage_bps: default_slippage_bps(),
            spread_cents: default_spread_cents(),
            fees_per_trade: 0.0,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            bootstrap_block_len: default_block_len(),
            n_bootstrap: default_n_bootstrap(),
            random_seed: default_seed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = Config::from_str("{}").unwrap();
        assert_eq!(config.watchlist.top_n, 20);
        assert_eq!(config.inference.n_bootstrap, 10_000);
        assert!(config.universe.use_reference_data);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let result = Config::from_str("watchlist:\n  topn: 5\n");
        assert!(result.is_err());
    }

    #[test]
    fn partial_section_overrides() {
        let config = Config::from_str("risk:\n  max_trades_per_day: 3\n").unwrap();
        assert_eq!(config.risk.max_trades_per_day, 3);
        assert!((config.risk.risk_per_trade_pct - 0.01).abs() < 1e-12);
    }

    #[test]
    fn inverted_price_range_is_invalid() {
        let result = Config::from_str("universe:\n  price_min: 30.0\n  price_max: 20.0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn entry_window_must_precede_force_flat() {
        let result = Config::from_str(
            "session:\n  entry_window_start: \"09:30\"\n  entry_window_end: \"16:30\"\n",
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn bad_time_string_is_invalid() {
        let result = Config::from_str("session:\n  entry_window_start: \"930\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn method_parses_snake_case() {
        let config = Config::from_str("watchlist:\n  method: premarket_gap\n").unwrap();
        assert_eq!(config.watchlist.method, crate::domain::SelectionMethod::PremarketGap);
    }
}
