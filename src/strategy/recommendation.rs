//! Buy/sell/hold recommendation policy.
//!
//! A fixed, ordered list of rules; the first one that matches wins.
//! The order matters: a spiking card with tight, high-confidence
//! consensus is a sell, even though it would also satisfy the hold
//! rule's volatility bound.

use serde::Deserialize;

use crate::types::{Action, ConfidenceLevel, ConsensusResult, Recommendation, TrendLabel, TrendResult};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Volatility (%) above which the only advice is caution.
    pub caution_volatility_pct: f64,
    /// Momentum (%) that turns a plain rise/fall into a sell/buy.
    pub strong_momentum_pct: f64,
    /// Hold only when |momentum| and volatility are both under these.
    pub hold_momentum_pct: f64,
    pub hold_volatility_pct: f64,
    /// Sell target as a multiple of consensus.
    pub sell_markup: f64,
    /// Buy target as a multiple of consensus.
    pub buy_markdown: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            caution_volatility_pct: 40.0,
            strong_momentum_pct: 15.0,
            hold_momentum_pct: 5.0,
            hold_volatility_pct: 15.0,
            sell_markup: 1.1,
            buy_markdown: 0.9,
        }
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

pub struct RecommendationPolicy {
    config: RecommendationConfig,
}

impl RecommendationPolicy {
    pub fn new(config: RecommendationConfig) -> Self {
        Self { config }
    }

    pub fn recommend(&self, consensus: &ConsensusResult, trend: &TrendResult) -> Recommendation {
        let cfg = &self.config;
        let value = consensus.consensus_value;
        let momentum = trend.momentum_pct;
        let volatility = consensus.volatility_pct;

        // 1. Not enough trust in the number itself.
        if matches!(
            consensus.confidence_level,
            ConfidenceLevel::None | ConfidenceLevel::Low
        ) {
            return Recommendation {
                action: Action::Wait,
                target_price: None,
                rationale: match consensus.confidence_level {
                    ConfidenceLevel::None => "No reliable price data yet; wait for quotes".into(),
                    _ => format!(
                        "Only {} source(s) with weak agreement; wait for better data",
                        consensus.contributing_sources.len()
                    ),
                },
            };
        }

        // 2. Sources disagree too much.
        if volatility > cfg.caution_volatility_pct {
            return Recommendation {
                action: Action::Caution,
                target_price: None,
                rationale: format!(
                    "Sources disagree by {volatility:.1}% (${:.2}–${:.2}); prices are unreliable",
                    consensus.low, consensus.high
                ),
            };
        }

        // 3. Strong upward move: take profit.
        if trend.trend_label == TrendLabel::Spiking
            || (trend.trend_label == TrendLabel::Rising && momentum > cfg.strong_momentum_pct)
        {
            return Recommendation {
                action: Action::Sell,
                target_price: Some(value * cfg.sell_markup),
                rationale: format!(
                    "Price is {} ({momentum:+.1}%); consider selling into strength",
                    trend.trend_label
                ),
            };
        }

        // 4. Strong downward move: buy the dip.
        if trend.trend_label == TrendLabel::Crashing
            || (trend.trend_label == TrendLabel::Falling && momentum < -cfg.strong_momentum_pct)
        {
            return Recommendation {
                action: Action::Buy,
                target_price: Some(value * cfg.buy_markdown),
                rationale: format!(
                    "Price is {} ({momentum:+.1}%); a buying opportunity may be forming",
                    trend.trend_label
                ),
            };
        }

        // 5. Flat and well agreed.
        if momentum.abs() < cfg.hold_momentum_pct && volatility < cfg.hold_volatility_pct {
            return Recommendation {
                action: Action::Hold,
                target_price: None,
                rationale: format!(
                    "Stable around ${value:.2} ({momentum:+.1}%, {volatility:.1}% spread)"
                ),
            };
        }

        // 6. Everything else.
        Recommendation {
            action: Action::Monitor,
            target_price: None,
            rationale: format!(
                "Trend {} ({momentum:+.1}%) with {volatility:.1}% spread; keep watching",
                trend.trend_label
            ),
        }
    }
}

impl Default for RecommendationPolicy {
    fn default() -> Self {
        Self::new(RecommendationConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
