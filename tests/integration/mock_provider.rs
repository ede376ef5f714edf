//! Mock price source for integration testing.
//!
//! Provides a deterministic `QuoteProvider` whose price, failure mode
//! and latency are controllable from test code, and which counts how
//! often it was asked.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use card_oracle::providers::QuoteProvider;
use card_oracle::types::{Card, Quote};

/// A mock price source for deterministic testing.
pub struct MockProvider {
    name: String,
    weight: f64,
    price: Arc<Mutex<Option<f64>>>,
    sample_count: Option<u32>,
    delay: Option<Duration>,
    /// If set, every fetch returns this error.
    force_error: Arc<Mutex<Option<String>>>,
    /// If set, every fetch panics.
    force_panic: AtomicBool,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: &str, weight: f64, price: f64) -> Self {
        Self {
            name: name.to_string(),
            weight,
            price: Arc::new(Mutex::new(Some(price))),
            sample_count: None,
            delay: None,
            force_error: Arc::new(Mutex::new(None)),
            force_panic: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// A source that never has a listing.
    pub fn empty(name: &str, weight: f64) -> Self {
        let p = Self::new(name, weight, 0.0);
        *p.price.lock().unwrap() = None;
        p
    }

    pub fn with_samples(mut self, n: u32) -> Self {
        self.sample_count = Some(n);
        self
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_price(&self, price: f64) {
        *self.price.lock().unwrap() = Some(price);
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn set_panic(&self) {
        self.force_panic.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl QuoteProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn static_weight(&self) -> f64 {
        self.weight
    }

    async fn fetch_quote(&self, _card: &Card) -> Result<Option<Quote>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.force_panic.load(Ordering::SeqCst) {
            panic!("{} scraper bug", self.name);
        }

        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            anyhow::bail!(msg);
        }

        let price = *self.price.lock().unwrap();
        Ok(price.map(|v| {
            let q = Quote::new(&self.name, v, self.weight);
            match self.sample_count {
                Some(n) => q.with_sample_count(n),
                None => q,
            }
        }))
    }
}

/// Erase a mock's concrete type for handing to the oracle.
pub fn erased(p: &Arc<MockProvider>) -> Arc<dyn QuoteProvider> {
    p.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> Card {
        Card::new("Charizard", "Base Set", None)
    }

    #[tokio::test]
    async fn test_mock_returns_price() {
        let p = MockProvider::new("tcg", 0.4, 12.0).with_samples(3);
        let q = p.fetch_quote(&card()).await.unwrap().unwrap();
        assert_eq!(q.value, 12.0);
        assert_eq!(q.sample_count, Some(3));
        assert_eq!(p.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_empty() {
        let p = MockProvider::empty("tcg", 0.4);
        assert!(p.fetch_quote(&card()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mock_forced_error() {
        let p = MockProvider::new("tcg", 0.4, 12.0);
        p.set_error("boom");
        assert!(p.fetch_quote(&card()).await.is_err());
        p.clear_error();
        assert!(p.fetch_quote(&card()).await.is_ok());
    }
}
