//! Event-driven portfolio simulator.
//!
//! One deterministic, single-threaded pass per trading day over the
//! time-merged bars of every watchlist ticker. Within each timestamp the
//! phases run in fixed order: mark-to-market, pending-intent execution,
//! feature update and signal generation, intrabar risk.

pub mod day_loop;
pub mod fill_model;
pub mod sizing;

pub use day_loop::{simulate_day, DayInput, DayResult, EngineError};
pub use fill_model::FillModel;
