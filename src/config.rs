//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section has defaults, so a missing section (or a missing file,
//! via [`AppConfig::load_or_default`]) still yields a working setup.
//! Secrets (provider API keys) are referenced by env-var name and
//! resolved at runtime.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::cache::CacheConfig;
use crate::engine::consensus::ConsensusConfig;
use crate::engine::trend::TrendConfig;
use crate::strategy::alerts::AlertConfig;
use crate::strategy::recommendation::RecommendationConfig;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub cache: CacheConfig,
    pub consensus: ConsensusConfig,
    pub trend: TrendConfig,
    pub alerts: AlertConfig,
    pub recommendation: RecommendationConfig,
    pub api: ApiConfig,
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    /// Directory holding the JSON snapshot documents.
    pub data_dir: String,
    /// How often dirty durable state is flushed to disk.
    pub persist_interval_secs: u64,
    /// Upper bound on a single provider fetch.
    pub provider_timeout_secs: u64,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Emit JSON log lines instead of the human format.
    pub log_json: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "CARD-ORACLE".to_string(),
            data_dir: "data".to_string(),
            persist_interval_secs: 30,
            provider_timeout_secs: 10,
            log_level: "card_oracle=info".to_string(),
            log_json: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8088,
        }
    }
}

/// One HTTP price source.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub name: String,
    /// URL template; `{name}`, `{set}` and `{condition}` are substituted.
    pub url: String,
    /// Trust weight in [0, 1].
    pub weight: f64,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            warn!(path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
