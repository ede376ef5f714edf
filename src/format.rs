//! Human-readable price responses.
//!
//! Rendering only: nothing here changes a number the engine produced.
//! Money is rounded through `Decimal` so that display rounding is
//! half-away-from-zero rather than whatever binary floats happen to do.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::types::{AuthoritativePrice, ResponseStyle, TrendLabel};

pub const NO_DATA: &str = "No reliable price data";

/// Render a result in the requested style.
///
/// - `Casual`: coarse buckets, e.g. "about $210"
/// - `Authoritative`: "$208.89 (high confidence, 3 sources)"
/// - `Movement`: "$208.89 ↑ +20.0%"
pub fn format_price_response(result: &AuthoritativePrice, style: ResponseStyle) -> String {
    let consensus = &result.consensus;
    if !consensus.has_data() {
        return NO_DATA.to_string();
    }

    let value = consensus.consensus_value;
    match style {
        ResponseStyle::Casual => format!("about ${}", casual_amount(value)),
        ResponseStyle::Authoritative => format!(
            "{} ({} confidence, {} source{})",
            exact_amount(value),
            consensus.confidence_level,
            consensus.contributing_sources.len(),
            if consensus.contributing_sources.len() == 1 { "" } else { "s" },
        ),
        ResponseStyle::Movement => {
            let momentum = result.trend.momentum_pct;
            format!(
                "{} {} {}",
                exact_amount(value),
                arrow(result.trend.trend_label),
                signed_pct(momentum),
            )
        }
    }
}

/// `$X.XX`, fixed two decimals.
pub fn exact_amount(value: f64) -> String {
    let d = to_decimal(value).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("${d:.2}")
}

/// Round to a bucket that depends on magnitude.
///
/// Under $10 to the nearest 50c, under $100 to the dollar, under $1000
/// to $5, otherwise to $10.
pub fn casual_amount(value: f64) -> String {
    let d = to_decimal(value);
    let step = if d < dec!(10) {
        dec!(0.5)
    } else if d < dec!(100) {
        dec!(1)
    } else if d < dec!(1000) {
        dec!(5)
    } else {
        dec!(10)
    };

    let rounded = (d / step).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero) * step;
    if step < dec!(1) {
        format!("{rounded:.2}")
    } else {
        format!("{rounded:.0}")
    }
}

fn arrow(label: TrendLabel) -> &'static str {
    match label {
        TrendLabel::Spiking | TrendLabel::Rising => "↑",
        TrendLabel::Crashing | TrendLabel::Falling => "↓",
        TrendLabel::Stable => "→",
    }
}

fn signed_pct(pct: f64) -> String {
    let d = to_decimal(pct).round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    if d.is_sign_negative() && !d.is_zero() {
        format!("{d:.1}%")
    } else {
        format!("+{:.1}%", d.abs())
    }
}

fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
