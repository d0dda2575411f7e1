//! Causal feature pipeline.
//!
//! Every indicator is streamed: recursive updates only, no vectorised
//! look-back that could touch a future row. A snapshot at time t depends
//! only on bars with `ts <= t`.

pub mod ema;
pub mod levels;
pub mod pipeline;
pub mod squeeze;

pub use pipeline::{FeatureEngine, FeatureSnapshot};
pub use squeeze::{MomentumSign, TtmState};
