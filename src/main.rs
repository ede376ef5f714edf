//! CARD-ORACLE — multi-source consensus pricing for trading cards
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the price sources, restores durable state from disk, and
//! serves the HTTP API until Ctrl+C, flushing state on the way out.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use card_oracle::api;
use card_oracle::config;
use card_oracle::oracle::PriceOracle;
use card_oracle::providers::http::HttpQuoteProvider;
use card_oracle::providers::QuoteProvider;
use card_oracle::storage::PriceStore;

const BANNER: &str = r#"
   ___   _   ___ ___     ___  ___    _    ___ _    ___
  / __| /_\ | _ \   \   / _ \| _ \  /_\  / __| |  | __|
 | (__ / _ \|   / |) | | (_) |   / / _ \| (__| |__| _|
  \___/_/ \_\_|_\___/   \___/|_|_\/_/ \_\\___|____|___|

  Multi-source consensus pricing for trading cards
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("CARD_ORACLE_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::AppConfig::load_or_default(&config_path)?;

    init_logging(&cfg);

    println!("{BANNER}");
    info!(
        service = %cfg.service.name,
        data_dir = %cfg.service.data_dir,
        urgent_ttl_secs = cfg.cache.urgent_ttl_secs,
        normal_ttl_secs = cfg.cache.normal_ttl_secs,
        "CARD-ORACLE starting up"
    );

    // -- Price sources ---------------------------------------------------

    let mut providers: Vec<Arc<dyn QuoteProvider>> = Vec::new();
    for p in cfg.providers.iter().filter(|p| p.enabled) {
        match HttpQuoteProvider::from_config(p) {
            Ok(client) => {
                info!(provider = %p.name, weight = p.weight, "Price source enabled");
                providers.push(Arc::new(client));
            }
            Err(e) => warn!(provider = %p.name, error = %e, "Price source skipped"),
        }
    }

    if providers.is_empty() {
        warn!("No price sources configured; every lookup will report no data");
    }

    // -- Oracle ----------------------------------------------------------

    let store = PriceStore::new(&cfg.service.data_dir);
    let oracle = Arc::new(PriceOracle::new(&cfg, providers, Some(store)));

    let persistence = oracle
        .clone()
        .spawn_persistence(Duration::from_secs(cfg.service.persist_interval_secs));

    let server = if cfg.api.enabled {
        Some(api::spawn_api(oracle.clone(), cfg.api.port).await?)
    } else {
        warn!("API disabled in config; running persistence only");
        None
    };

    // -- Run until shutdown ----------------------------------------------

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received.");

    if let Some(server) = server {
        server.abort();
    }
    persistence.abort();

    // Final flush
    oracle.persist().await;
    let stats = oracle.cache_stats().await;
    info!(
        cache_entries = stats.entries,
        cache_hits = stats.hits,
        cache_misses = stats.misses,
        "CARD-ORACLE shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
///
/// `RUST_LOG` overrides `[service] log_level`, and `CARD_ORACLE_LOG_JSON`
/// forces JSON output on top of `[service] log_json`.
fn init_logging(cfg: &config::AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.service.log_level));

    let json_logging = cfg.service.log_json || std::env::var("CARD_ORACLE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
