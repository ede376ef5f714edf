//! Volatile, dual-TTL price cache.
//!
//! Assembled results are cached per card key. The caller's urgency
//! picks the TTL class: urgent requests want data younger than the
//! short TTL, normal requests accept anything younger than the long
//! one. Nothing here survives a restart; durable state lives in
//! [`crate::storage`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use crate::types::{AuthoritativePrice, CardKey, Urgency};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub urgent_ttl_secs: i64,
    pub normal_ttl_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            urgent_ttl_secs: 60,
            normal_ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn ttl_for(&self, urgency: Urgency) -> Duration {
        match urgency {
            Urgency::Urgent => Duration::seconds(self.urgent_ttl_secs),
            Urgency::Normal => Duration::seconds(self.normal_ttl_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CardKey,
    pub result: AuthoritativePrice,
    pub computed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Fresh enough for a caller with the given max age?
    fn is_fresh_for(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        !self.is_expired(now) && now - self.computed_at < max_age
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// In-memory TTL cache, safe for concurrent readers and writers.
pub struct PriceCache {
    config: CacheConfig,
    entries: RwLock<HashMap<CardKey, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PriceCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Entry for `key` if it has not reached its own expiry.
    pub async fn get(&self, key: &CardKey) -> Option<CacheEntry> {
        let now = Utc::now();
        let entries = self.entries.read().await;
        let hit = entries.get(key).filter(|e| !e.is_expired(now)).cloned();
        self.record(hit.is_some());
        hit
    }

    /// Entry for `key` if it is fresh enough for `urgency`.
    ///
    /// An entry written by a normal request lives for the long TTL, but
    /// an urgent caller only accepts it while it is younger than the
    /// short one.
    pub async fn get_fresh(&self, key: &CardKey, urgency: Urgency) -> Option<CacheEntry> {
        let now = Utc::now();
        let max_age = self.config.ttl_for(urgency);
        let entries = self.entries.read().await;
        let hit = entries
            .get(key)
            .filter(|e| e.is_fresh_for(now, max_age))
            .cloned();
        self.record(hit.is_some());
        debug!(card = %key, ?urgency, hit = hit.is_some(), "Cache lookup");
        hit
    }

    /// Store a result with the TTL class for `urgency`.
    pub async fn put(&self, key: CardKey, result: AuthoritativePrice, urgency: Urgency) {
        let ttl = self.config.ttl_for(urgency);
        self.put_with_ttl(key, result, ttl).await;
    }

    pub async fn put_with_ttl(&self, key: CardKey, result: AuthoritativePrice, ttl: Duration) {
        let computed_at = Utc::now();
        let entry = CacheEntry {
            key: key.clone(),
            result,
            computed_at,
            expires_at: computed_at + ttl,
        };
        self.entries.write().await.insert(key, entry);
    }

    pub async fn invalidate(&self, key: &CardKey) {
        self.entries.write().await.remove(key);
    }

    /// Remove expired entries.
    pub async fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            entries: self.len().await,
            hits,
            misses,
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
        }
    }

    fn record(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
