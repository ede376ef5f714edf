//! Trend detection over a card's price history.
//!
//! Compares the mean of the most recent half-window to the half-window
//! before it. Values are used as recorded: no outlier trimming is
//! applied, so support and resistance are the raw extremes of the
//! recent window.

use serde::Deserialize;

use crate::types::{HistoricalPoint, TrendLabel, TrendResult};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Total points considered; split into two equal halves.
    pub window: usize,
    /// Momentum (%) above which a rise becomes a spike.
    pub spike_pct: f64,
    /// Momentum (%) above which the series is rising.
    pub rise_pct: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window: 14,
            spike_pct: 15.0,
            rise_pct: 5.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

pub struct TrendAnalyzer {
    config: TrendConfig,
}

impl TrendAnalyzer {
    pub fn new(config: TrendConfig) -> Self {
        Self { config }
    }

    /// Derive label, momentum and support/resistance from a time-ordered
    /// series (oldest first).
    pub fn detect(&self, history: &[HistoricalPoint]) -> TrendResult {
        match history {
            [] => return TrendResult::stable(0.0, 0),
            [only] => return TrendResult::stable(only.value, 1),
            _ => {}
        }

        let (previous, recent) = self.split_windows(history);

        let recent_avg = mean(recent);
        let previous_avg = mean(previous);
        let momentum_pct = if previous_avg > 0.0 {
            (recent_avg - previous_avg) / previous_avg * 100.0
        } else {
            0.0
        };

        let support_value = recent.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
        let resistance_value = recent.iter().map(|p| p.value).fold(f64::NEG_INFINITY, f64::max);

        TrendResult {
            trend_label: self.label(momentum_pct),
            momentum_pct,
            support_value,
            resistance_value,
            window_size: previous.len() + recent.len(),
        }
    }

    /// Split into `(previous, recent)`; both are non-empty for len >= 2.
    fn split_windows<'a>(
        &self,
        history: &'a [HistoricalPoint],
    ) -> (&'a [HistoricalPoint], &'a [HistoricalPoint]) {
        let half = (self.config.window / 2).max(1);
        let len = history.len();

        if len > half {
            let recent_start = len - half;
            let previous_start = recent_start.saturating_sub(half);
            (&history[previous_start..recent_start], &history[recent_start..])
        } else {
            // Short series: recent takes the larger half.
            let split = len / 2;
            (&history[..split], &history[split..])
        }
    }

    fn label(&self, momentum_pct: f64) -> TrendLabel {
        let cfg = &self.config;
        if momentum_pct > cfg.spike_pct {
            TrendLabel::Spiking
        } else if momentum_pct > cfg.rise_pct {
            TrendLabel::Rising
        } else if momentum_pct < -cfg.spike_pct {
            TrendLabel::Crashing
        } else if momentum_pct < -cfg.rise_pct {
            TrendLabel::Falling
        } else {
            TrendLabel::Stable
        }
    }
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new(TrendConfig::default())
    }
}

fn mean(points: &[HistoricalPoint]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
