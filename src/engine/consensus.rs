//! Weighted consensus across price sources.
//!
//! Filters out invalid quotes, renormalises the remaining sources'
//! weights, and classifies how much the result can be trusted from
//! source count, agreement (volatility) and sample depth.

use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::types::{CardKey, ConfidenceLevel, ConsensusResult, Quote};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Confidence classification thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Distinct sources needed for `high` (together with low volatility).
    pub high_min_sources: usize,
    /// Volatility (%) must be strictly below this for `high`.
    pub high_max_volatility_pct: f64,
    pub medium_min_sources: usize,
    pub medium_max_volatility_pct: f64,
    /// A single quote backed by more samples than this is `high` on its own.
    pub sample_escalation: u32,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            high_min_sources: 3,
            high_max_volatility_pct: 20.0,
            medium_min_sources: 2,
            medium_max_volatility_pct: 30.0,
            sample_escalation: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct ConsensusEngine {
    config: ConsensusConfig,
}

impl ConsensusEngine {
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }

    /// Combine quotes into one consensus result.
    ///
    /// Pure given its input: the same quotes always give the same value,
    /// range, volatility and confidence.
    pub fn compute(&self, card_key: &CardKey, quotes: &[Quote]) -> ConsensusResult {
        let valid: Vec<&Quote> = quotes.iter().filter(|q| q.is_valid()).collect();

        if valid.len() < quotes.len() {
            debug!(
                card = %card_key,
                dropped = quotes.len() - valid.len(),
                "Discarded invalid quotes"
            );
        }

        if valid.is_empty() {
            return ConsensusResult::empty(card_key.clone());
        }

        let mut values: Vec<f64> = valid.iter().map(|q| q.value).collect();
        values.sort_by(|a, b| a.total_cmp(b));
        let low = values[0];
        let high = values[values.len() - 1];
        let median = median_of_sorted(&values);

        // Rounding in the weighted sum must not push it outside the range.
        let consensus_value = weighted_mean(&valid).clamp(low, high);

        let volatility_pct = if consensus_value > 0.0 {
            (high - low) / consensus_value * 100.0
        } else {
            0.0
        };

        let sources: BTreeSet<&str> = valid.iter().map(|q| q.source_id.as_str()).collect();
        let max_samples = valid.iter().filter_map(|q| q.sample_count).max().unwrap_or(0);
        let sample_count: u32 = valid.iter().filter_map(|q| q.sample_count).sum();

        let confidence_level = self.classify(sources.len(), volatility_pct, max_samples);

        debug!(
            card = %card_key,
            consensus = consensus_value,
            volatility_pct,
            sources = sources.len(),
            confidence = %confidence_level,
            "Consensus computed"
        );

        ConsensusResult {
            card_key: card_key.clone(),
            consensus_value,
            median,
            low,
            high,
            volatility_pct,
            confidence_level,
            contributing_sources: sources.into_iter().map(String::from).collect(),
            sample_count,
            data_points: valid.len(),
            computed_at: Utc::now(),
        }
    }

    fn classify(&self, sources: usize, volatility_pct: f64, max_samples: u32) -> ConfidenceLevel {
        let cfg = &self.config;
        if (sources >= cfg.high_min_sources && volatility_pct < cfg.high_max_volatility_pct)
            || max_samples > cfg.sample_escalation
        {
            ConfidenceLevel::High
        } else if sources >= cfg.medium_min_sources
            && volatility_pct < cfg.medium_max_volatility_pct
        {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

impl Default for ConsensusEngine {
    fn default() -> Self {
        Self::new(ConsensusConfig::default())
    }
}

/// `Σ(value·w) / Σw`, or the plain mean when every weight is zero.
fn weighted_mean(quotes: &[&Quote]) -> f64 {
    let total_weight: f64 = quotes.iter().map(|q| q.static_weight).sum();
    if total_weight > 0.0 {
        quotes.iter().map(|q| q.value * q.static_weight).sum::<f64>() / total_weight
    } else {
        quotes.iter().map(|q| q.value).sum::<f64>() / quotes.len() as f64
    }
}

fn median_of_sorted(values: &[f64]) -> f64 {
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
