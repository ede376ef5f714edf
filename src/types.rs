//! Shared types for the card price oracle.
//!
//! These types form the data model used across all modules. Providers,
//! the engine, strategy rules, the cache and the facade all depend on
//! them, never on each other's internals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Card identity
// ---------------------------------------------------------------------------

/// Condition used when the caller doesn't specify one.
pub const DEFAULT_CONDITION: &str = "near-mint";

/// Canonical identity of a card (name + set + condition).
///
/// Built only through [`CardKey::new`], so two inputs that differ in
/// case, punctuation or spacing always produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardKey(String);

impl CardKey {
    pub fn new(name: &str, set: &str, condition: Option<&str>) -> Self {
        let condition = canonical_condition(condition.unwrap_or(""));
        CardKey(format!(
            "{}|{}|{}",
            normalize_segment(name),
            normalize_segment(set),
            condition,
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase, drop punctuation, and join words with `-`.
///
/// Whitespace, `-`, `_` and `/` separate words; every other
/// non-alphanumeric character is removed outright so that
/// "Mr. Mime" and "Mr Mime" agree.
pub fn normalize_segment(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_alphanumeric() {
            cleaned.extend(c.to_lowercase());
        } else if c.is_whitespace() || matches!(c, '-' | '_' | '/') {
            cleaned.push(' ');
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Normalise a condition and fold the common grading abbreviations.
fn canonical_condition(raw: &str) -> String {
    let norm = normalize_segment(raw);
    match norm.as_str() {
        "" | "nm" | "near-mint" | "nearmint" => DEFAULT_CONDITION.to_string(),
        "m" | "mint" => "mint".to_string(),
        "lp" | "light-played" | "lightly-played" => "lightly-played".to_string(),
        "mp" | "moderately-played" => "moderately-played".to_string(),
        "hp" | "heavily-played" => "heavily-played".to_string(),
        "dmg" | "damaged" => "damaged".to_string(),
        _ => norm,
    }
}

/// A card as the caller described it, plus its canonical key.
///
/// Providers get the raw text (sources expect human spelling in their
/// queries); everything keyed internally uses `key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub name: String,
    pub set: String,
    pub condition: String,
    pub key: CardKey,
}

impl Card {
    pub fn new(name: &str, set: &str, condition: Option<&str>) -> Self {
        let condition = condition
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CONDITION);
        Card {
            name: name.trim().to_string(),
            set: set.trim().to_string(),
            condition: condition.to_string(),
            key: CardKey::new(name, set, Some(condition)),
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) [{}]", self.name, self.set, self.condition)
    }
}

// ---------------------------------------------------------------------------
// Quotes
// ---------------------------------------------------------------------------

/// One source's price observation for a card at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub source_id: String,
    pub value: f64,
    pub low: Option<f64>,
    pub high: Option<f64>,
    /// How many sales/listings the source aggregated, if it says.
    pub sample_count: Option<u32>,
    /// Free-form trend label reported by the source ("up", "down", ...).
    pub trend_hint: Option<String>,
    /// Trust weight in [0, 1].
    pub static_weight: f64,
    pub captured_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(source_id: &str, value: f64, static_weight: f64) -> Self {
        Quote {
            source_id: source_id.to_string(),
            value,
            low: None,
            high: None,
            sample_count: None,
            trend_hint: None,
            static_weight: clamp_weight(static_weight),
            captured_at: Utc::now(),
        }
    }

    pub fn with_sample_count(mut self, samples: u32) -> Self {
        self.sample_count = Some(samples);
        self
    }

    /// Non-finite or non-positive values mark the quote invalid.
    pub fn is_valid(&self) -> bool {
        self.value.is_finite() && self.value > 0.0
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ${:.2} (w={:.2}", self.source_id, self.value, self.static_weight)?;
        if let Some(n) = self.sample_count {
            write!(f, ", n={n}")?;
        }
        write!(f, ")")
    }
}

/// Weights outside [0, 1] (or NaN) are pulled back into range.
pub fn clamp_weight(weight: f64) -> f64 {
    if weight.is_nan() {
        0.0
    } else {
        weight.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Consensus
// ---------------------------------------------------------------------------

/// Qualitative trust rating. Ordered: `None < Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    None,
    Low,
    Medium,
    High,
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceLevel::None => write!(f, "none"),
            ConfidenceLevel::Low => write!(f, "low"),
            ConfidenceLevel::Medium => write!(f, "medium"),
            ConfidenceLevel::High => write!(f, "high"),
        }
    }
}

/// Weighted combination of every valid quote for one card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub card_key: CardKey,
    pub consensus_value: f64,
    pub median: f64,
    pub low: f64,
    pub high: f64,
    pub volatility_pct: f64,
    pub confidence_level: ConfidenceLevel,
    pub contributing_sources: Vec<String>,
    /// Sum of the sample counts the sources reported.
    pub sample_count: u32,
    /// Number of valid quotes that went into the result.
    pub data_points: usize,
    pub computed_at: DateTime<Utc>,
}

impl ConsensusResult {
    /// Result for a computation that had no valid quotes.
    pub fn empty(card_key: CardKey) -> Self {
        ConsensusResult {
            card_key,
            consensus_value: 0.0,
            median: 0.0,
            low: 0.0,
            high: 0.0,
            volatility_pct: 0.0,
            confidence_level: ConfidenceLevel::None,
            contributing_sources: Vec::new(),
            sample_count: 0,
            data_points: 0,
            computed_at: Utc::now(),
        }
    }

    pub fn has_data(&self) -> bool {
        self.confidence_level != ConfidenceLevel::None
    }
}

impl fmt::Display for ConsensusResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ${:.2} (range ${:.2}–${:.2}, vol={:.1}%, conf={}, sources={})",
            self.card_key,
            self.consensus_value,
            self.low,
            self.high,
            self.volatility_pct,
            self.confidence_level,
            self.contributing_sources.len(),
        )
    }
}

// ---------------------------------------------------------------------------
// History & trend
// ---------------------------------------------------------------------------

/// One entry of a card's append-only price series.
///
/// Serialised as `{date, price}`, the shape of the history document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    #[serde(rename = "price")]
    pub value: f64,
    #[serde(rename = "date")]
    pub observed_at: DateTime<Utc>,
}

impl HistoricalPoint {
    pub fn new(value: f64, observed_at: DateTime<Utc>) -> Self {
        HistoricalPoint { value, observed_at }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    Spiking,
    Rising,
    Stable,
    Falling,
    Crashing,
}

impl TrendLabel {
    /// Labels that signal a sharp regime change.
    pub fn is_extreme(&self) -> bool {
        matches!(self, TrendLabel::Spiking | TrendLabel::Crashing)
    }
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendLabel::Spiking => write!(f, "spiking"),
            TrendLabel::Rising => write!(f, "rising"),
            TrendLabel::Stable => write!(f, "stable"),
            TrendLabel::Falling => write!(f, "falling"),
            TrendLabel::Crashing => write!(f, "crashing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub trend_label: TrendLabel,
    pub momentum_pct: f64,
    pub support_value: f64,
    pub resistance_value: f64,
    /// Number of points the windows actually covered.
    pub window_size: usize,
}

impl TrendResult {
    /// A flat trend pinned at `value`.
    pub fn stable(value: f64, window_size: usize) -> Self {
        TrendResult {
            trend_label: TrendLabel::Stable,
            momentum_pct: 0.0,
            support_value: value,
            resistance_value: value,
            window_size,
        }
    }
}

impl fmt::Display for TrendResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:+.1}%, support ${:.2}, resistance ${:.2}, n={})",
            self.trend_label,
            self.momentum_pct,
            self.support_value,
            self.resistance_value,
            self.window_size,
        )
    }
}

// ---------------------------------------------------------------------------
// Alerts & recommendations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    PriceMovement,
    Volatility,
    TrendChange,
    Threshold,
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertType::PriceMovement => write!(f, "price_movement"),
            AlertType::Volatility => write!(f, "volatility"),
            AlertType::TrendChange => write!(f, "trend_change"),
            AlertType::Threshold => write!(f, "threshold"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Recommended action for a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Wait,
    Caution,
    Sell,
    Buy,
    Hold,
    Monitor,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Wait => write!(f, "WAIT"),
            Action::Caution => write!(f, "CAUTION"),
            Action::Sell => write!(f, "SELL"),
            Action::Buy => write!(f, "BUY"),
            Action::Hold => write!(f, "HOLD"),
            Action::Monitor => write!(f, "MONITOR"),
        }
    }
}

/// A structured, ephemeral alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub related_value: f64,
    /// Only threshold alerts imply an action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_price: Option<f64>,
    pub rationale: String,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target_price {
            Some(t) => write!(f, "{} @ ${t:.2}: {}", self.action, self.rationale),
            None => write!(f, "{}: {}", self.action, self.rationale),
        }
    }
}

/// User-set buy/sell trigger prices for one card.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AlertThreshold {
    #[serde(rename = "buyThreshold", default)]
    pub buy_below: Option<f64>,
    #[serde(rename = "sellThreshold", default)]
    pub sell_above: Option<f64>,
}

impl AlertThreshold {
    pub fn is_empty(&self) -> bool {
        self.buy_below.is_none() && self.sell_above.is_none()
    }
}

/// Most recent trusted price for a card, kept across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastKnownGood {
    pub value: f64,
    pub source: String,
    pub last_updated: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Request options
// ---------------------------------------------------------------------------

/// Caller's freshness requirement; picks the cache TTL class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Urgent,
    #[default]
    Normal,
}

impl std::str::FromStr for Urgency {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "urgent" | "high" | "fast" => Ok(Urgency::Urgent),
            "normal" | "" => Ok(Urgency::Normal),
            _ => Err(OracleError::InvalidInput(format!("unknown urgency: {s}"))),
        }
    }
}

/// Output style for [`crate::format::format_price_response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStyle {
    #[default]
    Casual,
    Authoritative,
    Movement,
}

impl std::str::FromStr for ResponseStyle {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "casual" => Ok(ResponseStyle::Casual),
            "authoritative" | "exact" => Ok(ResponseStyle::Authoritative),
            "movement" | "trend" => Ok(ResponseStyle::Movement),
            _ => Err(OracleError::InvalidInput(format!("unknown style: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PriceOptions {
    pub condition: Option<String>,
    pub urgency: Urgency,
}

// ---------------------------------------------------------------------------
// Facade results
// ---------------------------------------------------------------------------

/// Everything the oracle knows about a card's price right now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthoritativePrice {
    pub card: Card,
    pub consensus: ConsensusResult,
    pub trend: TrendResult,
    pub alerts: Vec<Alert>,
    pub recommendation: Recommendation,
    /// Last trusted price from an earlier computation, if any.
    pub last_known_good: Option<LastKnownGood>,
    pub from_cache: bool,
}

impl fmt::Display for AuthoritativePrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} | {} alert(s){}",
            self.card,
            self.consensus,
            self.trend,
            self.alerts.len(),
            if self.from_cache { " [cached]" } else { "" },
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickPrice {
    pub price: f64,
    pub confidence: ConfidenceLevel,
    pub formatted: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketAnalysis {
    pub current: ConsensusResult,
    pub trends: TrendResult,
    pub recommendation: Recommendation,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types.
///
/// None of these escape the facade; they surface in provider failure
/// logs and from parsing request parameters.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("Provider {provider} timed out after {millis}ms")]
    Timeout { provider: String, millis: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
