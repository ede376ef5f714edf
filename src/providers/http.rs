//! Generic JSON-over-HTTP price source.
//!
//! One instance per `[[providers]]` entry in `config.toml`. The URL
//! template gets `{name}`, `{set}` and `{condition}` substituted
//! (URL-encoded), and the response body is expected to be a JSON object
//! carrying at least a price field.
//!
//! Auth: when `api_key_env` is set, the resolved key is sent as
//! `Authorization: Bearer {key}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use super::QuoteProvider;
use crate::config::{AppConfig, ProviderConfig};
use crate::types::{clamp_weight, Card, Quote};

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// The price payload. Sources disagree on field names, so the common
/// spellings are accepted.
#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(alias = "price", alias = "market_price", alias = "marketPrice")]
    value: Option<f64>,
    #[serde(default, alias = "low_price", alias = "lowPrice")]
    low: Option<f64>,
    #[serde(default, alias = "high_price", alias = "highPrice")]
    high: Option<f64>,
    #[serde(default, alias = "samples", alias = "sampleCount", alias = "sales")]
    sample_count: Option<u32>,
    #[serde(default)]
    trend: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct HttpQuoteProvider {
    http: Client,
    name: String,
    url_template: String,
    weight: f64,
    api_key: Option<SecretString>,
}

impl HttpQuoteProvider {
    pub fn new(
        name: &str,
        url_template: &str,
        weight: f64,
        api_key: Option<SecretString>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("CARD-ORACLE/0.1.0 (price-consensus)")
            .build()
            .with_context(|| format!("Failed to build HTTP client for {name}"))?;

        Ok(Self {
            http,
            name: name.to_string(),
            url_template: url_template.to_string(),
            weight: clamp_weight(weight),
            api_key,
        })
    }

    /// Build from a config entry, resolving the API key from the
    /// environment. A missing key is an error: the source would reject
    /// every request anyway.
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = match cfg.api_key_env.as_deref() {
            Some(env) => Some(SecretString::new(AppConfig::resolve_env(env)?)),
            None => None,
        };
        Self::new(&cfg.name, &cfg.url, cfg.weight, api_key)
    }

    fn build_url(&self, card: &Card) -> String {
        self.url_template
            .replace("{name}", &urlencoding::encode(&card.name))
            .replace("{set}", &urlencoding::encode(&card.set))
            .replace("{condition}", &urlencoding::encode(&card.condition))
    }

    fn parse(&self, body: PriceResponse) -> Option<Quote> {
        let value = body.value?;
        let mut quote = Quote::new(&self.name, value, self.weight);
        quote.low = body.low;
        quote.high = body.high;
        quote.sample_count = body.sample_count;
        quote.trend_hint = body.trend;
        quote.captured_at = Utc::now();
        Some(quote)
    }
}

#[async_trait]
impl QuoteProvider for HttpQuoteProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn static_weight(&self) -> f64 {
        self.weight
    }

    async fn fetch_quote(&self, card: &Card) -> Result<Option<Quote>> {
        let url = self.build_url(card);
        debug!(provider = %self.name, url = %url, "Fetching quote");

        let mut req = self.http.get(&url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key.expose_secret());
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("{} request failed", self.name))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{} API error {status}: {body}", self.name);
        }

        let body: PriceResponse = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse {} price response", self.name))?;

        Ok(self.parse(body))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
