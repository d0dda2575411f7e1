//! YBI small-cap scalping backtest — core engine.
//!
//! Provides the market calendar, data access layer, watchlist builder,
//! causal feature pipeline, strategy state machine and the per-day
//! portfolio simulator.

pub mod calendar;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod features;
pub mod strategy;
pub mod universe;
