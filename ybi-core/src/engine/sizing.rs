//! Risk-based position sizing.
//!
//! `qty = floor(risk_dollars / (entry − stop))` in whole shares, with the
//! per-position notional cap enforced as a rejection rather than a resize.

use crate::config::RiskConfig;
use crate::domain::RejectionCode;

/// Size an entry, or say why it cannot be taken.
///
/// `stop < entry` must already hold (the invalid-stop rejection happens at
/// the call site, where the gap-down context is known).
pub fn size_entry(
    risk: &RiskConfig,
    equity_at_open: f64,
    entry_px: f64,
    stop_px: f64,
    starter_fraction: Option<f64>,
) -> Result<u32, RejectionCode> {
    debug_assert!(stop_px < entry_px);

    let mut risk_dollars = risk.risk_per_trade_pct * equity_at_open;
    if let Some(fraction) = starter_fraction {
        risk_dollars *= fraction;
    }

    let per_share_risk = entry_px - stop_px;
    let qty = (risk_dollars / per_share_risk).floor();
    if qty < 1.0 || !qty.is_finite() {
        return Err(RejectionCode::ZeroQuantity);
    }
    let qty = qty as u32;

    if entry_px * f64::from(qty) > risk.max_position_notional_pct * equity_at_open {
        return Err(RejectionCode::NotionalCap);
    }

    Ok(qty)
}
