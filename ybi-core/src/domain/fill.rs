//! Fill — one child execution in the ledger.

use super::intent::IntentKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// One child execution. Every fill links back to the round trip it belongs
/// to, so the fill ledger and the trade ledger can be reconciled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillRecord {
    pub ts: DateTime<Utc>,
    pub ticker: String,
    pub side: Side,
    pub qty: u32,
    pub price: f64,
    /// Round-trip fee; non-zero only on the final SELL.
    pub fee: f64,
    pub intent_kind: IntentKind,
    pub reason: String,
    pub linked_trade_id: String,
}

impl FillRecord {
    /// Signed cash impact: negative for buys, positive for sells, fee out.
    pub fn cash_delta(&self) -> f64 {
        let gross = self.price * f64::from(self.qty);
        match self.side {
            Side::Buy => -gross - self.fee,
            Side::Sell => gross - self.fee,
        }
    }
}
