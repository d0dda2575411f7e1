use super::trade::{ExitReason, SetupTag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a pending intent wants done at the next bar's open.
///
/// Ordering matters: within one timestamp the simulator executes exits
/// before scale-outs before entries, so a freed slot or freed cash is
/// visible to the entry that needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Exit,
    ScaleOut,
    Enter,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Exit => "exit",
            IntentKind::ScaleOut => "scale_out",
            IntentKind::Enter => "enter",
        }
    }
}

/// Emitted on bar close at `signal_ts`, executed at the next bar's open.
/// The strategy never consults a bar with `ts > signal_ts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingIntent {
    pub ticker: String,
    pub kind: IntentKind,
    pub signal_ts: DateTime<Utc>,
    /// Entry intents: the triggering setup.
    pub setup: Option<SetupTag>,
    /// Entry intents: raw stop level before the buffer is applied.
    pub stop_base: Option<f64>,
    /// Entry intents: size at the starter fraction.
    pub starter: bool,
    /// Entry intents: nearest resistance above the signal close, used as
    /// the first scale-out target once filled.
    pub scale_target: Option<f64>,
    /// Scale-out intents: fraction of the original quantity to sell.
    pub scale_fraction: Option<f64>,
    /// Exit intents: why the strategy wants out.
    pub exit_reason: Option<ExitReason>,
}

impl PendingIntent {
    pub fn enter(
        ticker: &str,
        signal_ts: DateTime<Utc>,
        setup: SetupTag,
        stop_base: f64,
        starter: bool,
    ) -> Self {
        Self {
            ticker: ticker.to_string(),
            kind: IntentKind::Enter,
            signal_ts,
            setup: Some(setup),
            stop_base: Some(stop_base),
            starter,
            scale_target: None,
            scale_fraction: None,
            exit_reason: None,
        }
    }

    pub fn scale_out(ticker: &str, signal_ts: DateTime<Utc>, fraction: f64) -> Self {
        Self {
            ticker: ticker.to_string(),
            kind: IntentKind::ScaleOut,
            signal_ts,
            setup: None,
            stop_base: None,
            starter: false,
            scale_target: None,
            scale_fraction: Some(fraction),
            exit_reason: Some(ExitReason::ScaleOutTarget),
        }
    }

    pub fn exit(ticker: &str, signal_ts: DateTime<Utc>, reason: ExitReason) -> Self {
        Self {
            ticker: ticker.to_string(),
            kind: IntentKind::Exit,
            signal_ts,
            setup: None,
            stop_base: None,
            starter: false,
            scale_target: None,
            scale_fraction: None,
            exit_reason: Some(reason),
        }
    }
}
