//! Price oracle facade.
//!
//! Orchestrates one full lookup: cache check → concurrent provider
//! fan-out → consensus → history append + trend → alerts and
//! recommendation → cache write-through. None of the public entry
//! points return an error; every failure degrades into a well-formed,
//! lower-confidence result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::{CacheStats, PriceCache};
use crate::config::AppConfig;
use crate::engine::consensus::ConsensusEngine;
use crate::engine::trend::TrendAnalyzer;
use crate::format::format_price_response;
use crate::providers::{self, QuoteProvider};
use crate::storage::{DurableState, PriceStore};
use crate::strategy::alerts::AlertEvaluator;
use crate::strategy::recommendation::RecommendationPolicy;
use crate::types::{
    AlertThreshold, AuthoritativePrice, Card, CardKey, HistoricalPoint, LastKnownGood,
    MarketAnalysis, PriceOptions, QuickPrice, ResponseStyle, Urgency,
};

/// Source label written into last-known-good records.
const CONSENSUS_SOURCE: &str = "consensus";

pub struct PriceOracle {
    providers: Vec<Arc<dyn QuoteProvider>>,
    consensus: ConsensusEngine,
    trend: TrendAnalyzer,
    alerts: AlertEvaluator,
    policy: RecommendationPolicy,
    cache: PriceCache,
    durable: Mutex<DurableState>,
    store: Option<PriceStore>,
    dirty: AtomicBool,
    provider_timeout: Duration,
}

impl PriceOracle {
    /// Build an oracle from config. When `store` is given, its durable
    /// state is loaded now and snapshots are written back to it.
    pub fn new(
        config: &AppConfig,
        providers: Vec<Arc<dyn QuoteProvider>>,
        store: Option<PriceStore>,
    ) -> Self {
        let durable = store.as_ref().map(PriceStore::load).unwrap_or_default();

        info!(
            providers = providers.len(),
            persistent = store.is_some(),
            timeout_secs = config.service.provider_timeout_secs,
            "Price oracle initialised"
        );

        Self {
            providers,
            consensus: ConsensusEngine::new(config.consensus.clone()),
            trend: TrendAnalyzer::new(config.trend.clone()),
            alerts: AlertEvaluator::new(config.alerts.clone()),
            policy: RecommendationPolicy::new(config.recommendation.clone()),
            cache: PriceCache::new(config.cache.clone()),
            durable: Mutex::new(durable),
            store,
            dirty: AtomicBool::new(false),
            provider_timeout: Duration::from_secs(config.service.provider_timeout_secs),
        }
    }

    /// Override the per-provider timeout (mainly for tests).
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    // -- Lookups ---------------------------------------------------------

    /// Full result for one card.
    ///
    /// Served from cache when an entry is fresh enough for the caller's
    /// urgency; otherwise recomputed from every provider. Concurrent
    /// misses on the same card each do their own fan-out.
    pub async fn get_authoritative_price(
        &self,
        name: &str,
        set: &str,
        options: PriceOptions,
    ) -> AuthoritativePrice {
        let card = Card::new(name, set, options.condition.as_deref());

        if let Some(entry) = self.cache.get_fresh(&card.key, options.urgency).await {
            let mut result = entry.result;
            result.from_cache = true;
            return result;
        }

        let quotes = providers::fetch_all(&self.providers, &card, self.provider_timeout).await;
        let consensus = self.consensus.compute(&card.key, &quotes);

        let (trend, threshold, last_known_good) = {
            let mut durable = self.durable.lock().await;

            if consensus.has_data() {
                durable.append_point(
                    &card.key,
                    HistoricalPoint::new(consensus.consensus_value, consensus.computed_at),
                );
                durable.set_last_known_good(
                    &card.key,
                    LastKnownGood {
                        value: consensus.consensus_value,
                        source: CONSENSUS_SOURCE.to_string(),
                        last_updated: consensus.computed_at,
                    },
                );
                self.dirty.store(true, Ordering::Release);
            }

            (
                self.trend.detect(durable.history(&card.key)),
                durable.threshold(&card.key).copied(),
                durable.last_known_good(&card.key).cloned(),
            )
        };

        let alerts = self.alerts.evaluate(&consensus, &trend, threshold.as_ref());
        let recommendation = self.policy.recommend(&consensus, &trend);

        let result = AuthoritativePrice {
            card,
            consensus,
            trend,
            alerts,
            recommendation,
            last_known_good,
            from_cache: false,
        };

        info!(
            card = %result.card.key,
            price = result.consensus.consensus_value,
            confidence = %result.consensus.confidence_level,
            trend = %result.trend.trend_label,
            action = %result.recommendation.action,
            alerts = result.alerts.len(),
            "Price computed"
        );

        // A no-data result is not cached, so the next call retries the sources.
        if result.consensus.has_data() {
            self.cache
                .put(result.card.key.clone(), result.clone(), options.urgency)
                .await;
        }

        result
    }

    /// Price, confidence and a casual one-liner, at urgent freshness.
    pub async fn get_quick_price(&self, name: &str, set: &str) -> QuickPrice {
        let result = self
            .get_authoritative_price(
                name,
                set,
                PriceOptions {
                    condition: None,
                    urgency: Urgency::Urgent,
                },
            )
            .await;

        QuickPrice {
            price: result.consensus.consensus_value,
            confidence: result.consensus.confidence_level,
            formatted: format_price_response(&result, ResponseStyle::Casual),
        }
    }

    /// Consensus, trend and recommendation, at normal freshness.
    pub async fn get_market_analysis(&self, name: &str, set: &str) -> MarketAnalysis {
        let result = self
            .get_authoritative_price(name, set, PriceOptions::default())
            .await;

        MarketAnalysis {
            current: result.consensus,
            trends: result.trend,
            recommendation: result.recommendation,
        }
    }

    // -- Thresholds ------------------------------------------------------

    /// Set (or replace) the buy/sell trigger prices for a card.
    ///
    /// Non-finite or non-positive bounds are dropped. Setting both to
    /// nothing removes the threshold.
    pub async fn set_alert(
        &self,
        card_key: &CardKey,
        buy_below: Option<f64>,
        sell_above: Option<f64>,
    ) -> AlertThreshold {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        let threshold = AlertThreshold {
            buy_below: buy_below.filter(|v| valid(*v)),
            sell_above: sell_above.filter(|v| valid(*v)),
        };

        self.durable.lock().await.set_threshold(card_key, threshold);
        self.dirty.store(true, Ordering::Release);
        // Cached results carry alerts computed against the old threshold.
        self.cache.invalidate(card_key).await;

        info!(card = %card_key, ?threshold, "Alert threshold set");
        threshold
    }

    pub async fn remove_alert(&self, card_key: &CardKey) -> Option<AlertThreshold> {
        let removed = self.durable.lock().await.remove_threshold(card_key);
        if removed.is_some() {
            self.dirty.store(true, Ordering::Release);
            self.cache.invalidate(card_key).await;
            info!(card = %card_key, "Alert threshold removed");
        }
        removed
    }

    pub async fn alert_for(&self, card_key: &CardKey) -> Option<AlertThreshold> {
        self.durable.lock().await.threshold(card_key).copied()
    }

    // -- Introspection ---------------------------------------------------

    pub async fn history(&self, card_key: &CardKey) -> Vec<HistoricalPoint> {
        self.durable.lock().await.history(card_key).to_vec()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    // -- Persistence -----------------------------------------------------

    /// Snapshot durable state to disk now.
    ///
    /// Returns whether a snapshot was written. Failures are logged and
    /// swallowed; the in-memory state is untouched either way.
    pub async fn persist(&self) -> bool {
        let Some(store) = self.store.clone() else {
            return false;
        };

        self.dirty.store(false, Ordering::Release);
        let snapshot = self.durable.lock().await.clone();

        let outcome = tokio::task::spawn_blocking(move || store.save(&snapshot)).await;
        match outcome {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(error = %e, "Failed to persist durable state");
                self.dirty.store(true, Ordering::Release);
                false
            }
            Err(e) => {
                error!(error = %e, "Persistence task panicked");
                self.dirty.store(true, Ordering::Release);
                false
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Flush dirty state every `interval`, and evict expired cache
    /// entries while at it. Runs until the handle is aborted.
    pub fn spawn_persistence(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;

                let evicted = self.cache.evict_expired().await;
                if evicted > 0 {
                    debug!(evicted, "Expired cache entries evicted");
                }

                if self.is_dirty() {
                    self.persist().await;
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
