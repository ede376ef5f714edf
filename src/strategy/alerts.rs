//! Alert evaluation.
//!
//! Turns a consensus result, its trend and an optional user threshold
//! into structured alerts. Every rule is checked independently; one
//! result can raise several alerts and no deduplication is done.

use serde::Deserialize;
use tracing::debug;

use crate::types::{
    Action, Alert, AlertThreshold, AlertType, ConsensusResult, Severity, TrendResult,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// |momentum| (%) strictly above this raises a price-movement alert.
    pub movement_pct: f64,
    /// Volatility (%) strictly above this raises a volatility alert.
    pub volatility_pct: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            movement_pct: 20.0,
            volatility_pct: 30.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

pub struct AlertEvaluator {
    config: AlertConfig,
}

impl AlertEvaluator {
    pub fn new(config: AlertConfig) -> Self {
        Self { config }
    }

    /// Evaluate all alert rules for one computation.
    ///
    /// A result without data raises nothing: its zero value would
    /// otherwise trip every `buy_below` threshold.
    pub fn evaluate(
        &self,
        consensus: &ConsensusResult,
        trend: &TrendResult,
        threshold: Option<&AlertThreshold>,
    ) -> Vec<Alert> {
        if !consensus.has_data() {
            return Vec::new();
        }

        let mut alerts = Vec::new();
        let value = consensus.consensus_value;

        if trend.momentum_pct.abs() > self.config.movement_pct {
            let direction = if trend.momentum_pct > 0.0 { "up" } else { "down" };
            alerts.push(Alert {
                alert_type: AlertType::PriceMovement,
                severity: Severity::High,
                message: format!(
                    "Price moved {direction} {:.1}% against the previous window",
                    trend.momentum_pct.abs()
                ),
                related_value: trend.momentum_pct,
                action: None,
            });
        }

        if consensus.volatility_pct > self.config.volatility_pct {
            alerts.push(Alert {
                alert_type: AlertType::Volatility,
                severity: Severity::Medium,
                message: format!(
                    "Sources disagree: spread is {:.1}% of consensus (${:.2}–${:.2})",
                    consensus.volatility_pct, consensus.low, consensus.high
                ),
                related_value: consensus.volatility_pct,
                action: None,
            });
        }

        if trend.trend_label.is_extreme() {
            alerts.push(Alert {
                alert_type: AlertType::TrendChange,
                severity: Severity::Medium,
                message: format!(
                    "Trend is {} ({:+.1}% momentum)",
                    trend.trend_label, trend.momentum_pct
                ),
                related_value: trend.momentum_pct,
                action: None,
            });
        }

        if let Some(t) = threshold {
            if let Some(sell_above) = t.sell_above.filter(|s| value >= *s) {
                alerts.push(Alert {
                    alert_type: AlertType::Threshold,
                    severity: Severity::High,
                    message: format!(
                        "${value:.2} reached your sell threshold of ${sell_above:.2}"
                    ),
                    related_value: value,
                    action: Some(Action::Sell),
                });
            }
            if let Some(buy_below) = t.buy_below.filter(|b| value <= *b) {
                alerts.push(Alert {
                    alert_type: AlertType::Threshold,
                    severity: Severity::High,
                    message: format!(
                        "${value:.2} dropped to your buy threshold of ${buy_below:.2}"
                    ),
                    related_value: value,
                    action: Some(Action::Buy),
                });
            }
        }

        if !alerts.is_empty() {
            debug!(card = %consensus.card_key, count = alerts.len(), "Alerts raised");
        }

        alerts
    }
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
