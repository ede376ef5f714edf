//! End-to-end lookups through `PriceOracle`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use card_oracle::cache::CacheConfig;
use card_oracle::config::AppConfig;
use card_oracle::oracle::PriceOracle;
use card_oracle::providers::QuoteProvider;
use card_oracle::types::*;

use crate::mock_provider::{erased, MockProvider};

/// Config whose cache never serves a hit, so every call recomputes.
fn uncached_config() -> AppConfig {
    AppConfig {
        cache: CacheConfig { urgent_ttl_secs: 0, normal_ttl_secs: 0 },
        ..AppConfig::default()
    }
}

fn oracle(providers: Vec<Arc<dyn QuoteProvider>>) -> PriceOracle {
    PriceOracle::new(&AppConfig::default(), providers, None)
}

#[tokio::test]
async fn test_three_agreeing_sources() {
    let o = oracle(vec![
        erased(&MockProvider::new("tcgplayer", 0.4, 200.0).into_arc()),
        erased(&MockProvider::new("ebay", 0.3, 220.0).into_arc()),
        erased(&MockProvider::new("cardmarket", 0.2, 210.0).into_arc()),
    ]);

    let r = o.get_authoritative_price("Charizard", "Base Set", PriceOptions::default()).await;
    let c = &r.consensus;
    assert!((c.consensus_value - 208.9).abs() < 0.05);
    assert_eq!(c.low, 200.0);
    assert_eq!(c.high, 220.0);
    assert!((c.volatility_pct - 9.6).abs() < 0.05);
    assert_eq!(c.confidence_level, ConfidenceLevel::High);
    assert!(c.low <= c.consensus_value && c.consensus_value <= c.high);
}

#[tokio::test]
async fn test_single_thin_source_is_low_and_waits() {
    let o = oracle(vec![erased(
        &MockProvider::new("ebay", 0.2, 50.0).with_samples(0).into_arc(),
    )]);
    let r = o.get_authoritative_price("Pikachu", "Base Set", PriceOptions::default()).await;
    assert_eq!(r.consensus.confidence_level, ConfidenceLevel::Low);
    assert_eq!(r.recommendation.action, Action::Wait);
}

#[tokio::test]
async fn test_single_deep_source_is_high() {
    let o = oracle(vec![erased(
        &MockProvider::new("ebay", 0.2, 50.0).with_samples(25).into_arc(),
    )]);
    let r = o.get_authoritative_price("Pikachu", "Base Set", PriceOptions::default()).await;
    assert_eq!(r.consensus.confidence_level, ConfidenceLevel::High);
}

#[tokio::test]
async fn test_total_provider_failure() {
    let broken = MockProvider::new("tcgplayer", 0.4, 200.0).into_arc();
    broken.set_error("503 Service Unavailable");
    let o = oracle(vec![
        erased(&broken),
        erased(&MockProvider::empty("ebay", 0.3).into_arc()),
    ]);

    let r = o.get_authoritative_price("Charizard", "Base Set", PriceOptions::default()).await;
    assert_eq!(r.consensus.confidence_level, ConfidenceLevel::None);
    assert_eq!(r.consensus.consensus_value, 0.0);
    assert_eq!(r.recommendation.action, Action::Wait);
    assert!(r.alerts.is_empty());
}

#[tokio::test]
async fn test_panicking_source_does_not_sink_lookup() {
    let buggy = MockProvider::new("scraper", 0.5, 999.0).into_arc();
    buggy.set_panic();
    let o = Arc::new(oracle(vec![
        erased(&buggy),
        erased(&MockProvider::new("tcgplayer", 0.4, 120.0).into_arc()),
    ]));

    let handle = tokio::spawn({
        let o = o.clone();
        async move { o.get_authoritative_price("Charizard", "Base Set", PriceOptions::default()).await }
    });
    let r = handle.await.expect("lookup task should not panic");

    assert_eq!(buggy.calls(), 1);
    assert_eq!(r.consensus.confidence_level, ConfidenceLevel::Low);
    assert_eq!(r.consensus.contributing_sources, vec!["tcgplayer"]);
    assert_eq!(r.consensus.consensus_value, 120.0);
}

#[tokio::test]
async fn test_no_providers_at_all() {
    let o = oracle(Vec::new());
    let q = o.get_quick_price("Charizard", "Base Set").await;
    assert_eq!(q.price, 0.0);
    assert_eq!(q.confidence, ConfidenceLevel::None);
}

#[tokio::test]
async fn test_hanging_source_does_not_block() {
    let o = oracle(vec![
        erased(&MockProvider::new("slow", 0.5, 999.0).with_delay(Duration::from_secs(30)).into_arc()),
        erased(&MockProvider::new("fast", 0.5, 100.0).into_arc()),
    ])
    .with_provider_timeout(Duration::from_millis(100));

    let started = Instant::now();
    let r = o.get_authoritative_price("Charizard", "Base Set", PriceOptions::default()).await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(r.consensus.contributing_sources, vec!["fast"]);
    assert_eq!(r.consensus.consensus_value, 100.0);
}

#[tokio::test]
async fn test_spike_recommends_sell() {
    let source = MockProvider::new("tcgplayer", 0.5, 100.0).with_samples(20).into_arc();
    let o = PriceOracle::new(&uncached_config(), vec![erased(&source)], None);

    for _ in 0..7 {
        o.get_authoritative_price("Lugia", "Neo Genesis", PriceOptions::default()).await;
    }
    source.set_price(120.0);
    let mut last = None;
    for _ in 0..7 {
        last = Some(o.get_authoritative_price("Lugia", "Neo Genesis", PriceOptions::default()).await);
    }
    let r = last.unwrap();

    assert!((r.trend.momentum_pct - 20.0).abs() < 1e-9);
    assert_eq!(r.trend.trend_label, TrendLabel::Spiking);
    assert_eq!(r.trend.support_value, 120.0);
    assert_eq!(r.recommendation.action, Action::Sell);
    assert!((r.recommendation.target_price.unwrap() - 132.0).abs() < 1e-9);
    assert!(r.alerts.iter().any(|a| a.alert_type == AlertType::TrendChange));
    assert_eq!(source.calls(), 14);
}

#[tokio::test]
async fn test_crash_recommends_buy_and_trips_threshold() {
    let source = MockProvider::new("tcgplayer", 0.5, 200.0).with_samples(20).into_arc();
    let o = PriceOracle::new(&uncached_config(), vec![erased(&source)], None);
    let key = CardKey::new("Lugia", "Neo Genesis", None);
    o.set_alert(&key, Some(160.0), None).await;

    for _ in 0..7 {
        o.get_authoritative_price("Lugia", "Neo Genesis", PriceOptions::default()).await;
    }
    source.set_price(150.0);
    let mut last = None;
    for _ in 0..7 {
        last = Some(o.get_authoritative_price("lugia", "NEO GENESIS", PriceOptions::default()).await);
    }
    let r = last.unwrap();

    assert_eq!(r.trend.trend_label, TrendLabel::Crashing);
    assert_eq!(r.recommendation.action, Action::Buy);
    assert!((r.recommendation.target_price.unwrap() - 135.0).abs() < 1e-9);

    let types: Vec<AlertType> = r.alerts.iter().map(|a| a.alert_type).collect();
    assert!(types.contains(&AlertType::PriceMovement));
    assert!(types.contains(&AlertType::TrendChange));
    let threshold = r.alerts.iter().find(|a| a.alert_type == AlertType::Threshold).unwrap();
    assert_eq!(threshold.action, Some(Action::Buy));
    assert_eq!(threshold.severity, Severity::High);
}

#[tokio::test]
async fn test_urgent_request_bypasses_older_entry() {
    let source = MockProvider::new("tcgplayer", 0.5, 100.0).into_arc();
    let cfg = AppConfig {
        cache: CacheConfig { urgent_ttl_secs: 0, normal_ttl_secs: 300 },
        ..AppConfig::default()
    };
    let o = PriceOracle::new(&cfg, vec![erased(&source)], None);

    o.get_authoritative_price("Mew", "Promo", PriceOptions::default()).await;
    let cached = o.get_authoritative_price("Mew", "Promo", PriceOptions::default()).await;
    assert!(cached.from_cache);
    assert_eq!(source.calls(), 1);

    let urgent = o
        .get_authoritative_price(
            "Mew",
            "Promo",
            PriceOptions { condition: None, urgency: Urgency::Urgent },
        )
        .await;
    assert!(!urgent.from_cache);
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_conditions_are_separate_cards() {
    let source = MockProvider::new("tcgplayer", 0.5, 100.0).into_arc();
    let o = oracle(vec![erased(&source)]);

    let nm = o
        .get_authoritative_price("Mew", "Promo", PriceOptions { condition: Some("NM".into()), ..Default::default() })
        .await;
    let lp = o
        .get_authoritative_price("Mew", "Promo", PriceOptions { condition: Some("LP".into()), ..Default::default() })
        .await;
    assert_ne!(nm.card.key, lp.card.key);
    assert!(!lp.from_cache);
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_concurrent_misses_all_succeed() {
    let source = MockProvider::new("tcgplayer", 0.5, 100.0)
        .with_delay(Duration::from_millis(20))
        .into_arc();
    let o = Arc::new(oracle(vec![erased(&source)]));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let o = o.clone();
        handles.push(tokio::spawn(async move {
            o.get_authoritative_price("Charizard", "Base Set", PriceOptions::default()).await
        }));
    }
    for h in handles {
        let r = h.await.unwrap();
        assert_eq!(r.consensus.consensus_value, 100.0);
    }

    // Duplicate fan-out on a cold key is allowed, but never more than one per caller.
    assert!(source.calls() >= 1 && source.calls() <= 8);
    let key = CardKey::new("Charizard", "Base Set", None);
    assert_eq!(o.history(&key).await.len(), source.calls());
}

#[tokio::test]
async fn test_market_analysis_shape() {
    let o = oracle(vec![
        erased(&MockProvider::new("a", 0.5, 100.0).into_arc()),
        erased(&MockProvider::new("b", 0.5, 102.0).into_arc()),
    ]);
    let a = o.get_market_analysis("Snorlax", "Jungle").await;
    assert_eq!(a.current.confidence_level, ConfidenceLevel::Medium);
    assert_eq!(a.trends.trend_label, TrendLabel::Stable);
    assert_eq!(a.recommendation.action, Action::Hold);
}
