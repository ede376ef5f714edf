//! Durable state across oracle restarts.

use std::path::PathBuf;
use std::time::Duration;

use card_oracle::cache::CacheConfig;
use card_oracle::config::AppConfig;
use card_oracle::engine::trend::TrendAnalyzer;
use card_oracle::oracle::PriceOracle;
use card_oracle::storage::PriceStore;
use card_oracle::types::*;

use crate::mock_provider::{erased, MockProvider};

fn temp_dir() -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("card_oracle_it_{}", uuid::Uuid::new_v4()));
    p
}

fn config() -> AppConfig {
    AppConfig {
        cache: CacheConfig { urgent_ttl_secs: 0, normal_ttl_secs: 0 },
        ..AppConfig::default()
    }
}

fn cleanup(dir: &PathBuf) {
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_history_survives_restart_with_same_trend() {
    let dir = temp_dir();
    let key = CardKey::new("Blastoise", "Base Set", None);
    let source = MockProvider::new("tcgplayer", 0.5, 100.0).into_arc();

    let before = {
        let o = PriceOracle::new(&config(), vec![erased(&source)], Some(PriceStore::new(&dir)));
        for price in [100.0, 101.0, 99.0, 103.0, 104.0, 108.0, 110.0, 112.0, 115.0, 117.0] {
            source.set_price(price);
            o.get_authoritative_price("Blastoise", "Base Set", PriceOptions::default()).await;
        }
        assert!(o.persist().await);
        o.history(&key).await
    };

    let o = PriceOracle::new(&config(), Vec::new(), Some(PriceStore::new(&dir)));
    let after = o.history(&key).await;
    assert_eq!(before, after);

    let analyzer = TrendAnalyzer::default();
    assert_eq!(analyzer.detect(&before), analyzer.detect(&after));

    cleanup(&dir);
}

#[tokio::test]
async fn test_weighted_mean_history_reloads_bit_exact() {
    let dir = temp_dir();
    let key = CardKey::new("Mewtwo", "Base Set", None);
    let a = MockProvider::new("tcgplayer", 0.4, 200.0).into_arc();
    let b = MockProvider::new("ebay", 0.3, 210.0).into_arc();
    let c = MockProvider::new("cardmarket", 0.2, 220.0).into_arc();

    let before = {
        let o = PriceOracle::new(
            &config(),
            vec![erased(&a), erased(&b), erased(&c)],
            Some(PriceStore::new(&dir)),
        );
        for step in 0..14 {
            let drift = step as f64 * 1.37;
            a.set_price(200.0 + drift);
            b.set_price(210.0 - drift / 3.0);
            c.set_price(220.0 + drift * 0.7);
            o.get_authoritative_price("Mewtwo", "Base Set", PriceOptions::default()).await;
        }
        assert!(o.persist().await);
        o.history(&key).await
    };
    assert_eq!(before.len(), 14);
    assert!(before.iter().any(|p| p.value.fract() != 0.0));

    let o = PriceOracle::new(&config(), Vec::new(), Some(PriceStore::new(&dir)));
    let after = o.history(&key).await;
    for (b, a) in before.iter().zip(&after) {
        assert_eq!(b.value.to_bits(), a.value.to_bits());
    }

    let analyzer = TrendAnalyzer::default();
    assert_eq!(analyzer.detect(&before), analyzer.detect(&after));

    cleanup(&dir);
}

#[tokio::test]
async fn test_threshold_and_last_known_good_survive_restart() {
    let dir = temp_dir();
    let key = CardKey::new("Venusaur", "Base Set", None);

    {
        let source = MockProvider::new("tcgplayer", 0.5, 80.0).into_arc();
        let o = PriceOracle::new(&config(), vec![erased(&source)], Some(PriceStore::new(&dir)));
        o.set_alert(&key, None, Some(75.0)).await;
        o.get_authoritative_price("Venusaur", "Base Set", PriceOptions::default()).await;
        assert!(o.persist().await);
    }

    // All sources down after the restart: the old price is still reported
    // as last known good, and the threshold is still armed.
    let broken = MockProvider::new("tcgplayer", 0.5, 80.0).into_arc();
    broken.set_error("connection refused");
    let o = PriceOracle::new(&config(), vec![erased(&broken)], Some(PriceStore::new(&dir)));

    assert_eq!(o.alert_for(&key).await.unwrap().sell_above, Some(75.0));
    let r = o.get_authoritative_price("venusaur", "base set", PriceOptions::default()).await;
    assert_eq!(r.consensus.confidence_level, ConfidenceLevel::None);
    assert_eq!(r.recommendation.action, Action::Wait);
    assert_eq!(r.last_known_good.unwrap().value, 80.0);

    broken.clear_error();
    let r = o.get_authoritative_price("Venusaur", "Base Set", PriceOptions::default()).await;
    assert!(r.alerts.iter().any(|a| a.action == Some(Action::Sell)));

    cleanup(&dir);
}

#[tokio::test]
async fn test_corrupt_snapshot_starts_empty() {
    let dir = temp_dir();
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("history.json"), "[[[ truncated").unwrap();
    std::fs::write(dir.join("thresholds.json"), "").unwrap();

    let source = MockProvider::new("tcgplayer", 0.5, 10.0).into_arc();
    let o = PriceOracle::new(&config(), vec![erased(&source)], Some(PriceStore::new(&dir)));
    let r = o.get_authoritative_price("Eevee", "Jungle", PriceOptions::default()).await;
    assert_eq!(r.consensus.consensus_value, 10.0);
    assert_eq!(o.history(&r.card.key).await.len(), 1);

    // Saving over the corrupt files repairs them.
    assert!(o.persist().await);
    let reloaded = PriceStore::new(&dir).load();
    assert_eq!(reloaded.history(&r.card.key).len(), 1);

    cleanup(&dir);
}

#[tokio::test]
async fn test_unwritable_store_is_swallowed() {
    // A regular file where the data directory should be.
    let path = temp_dir();
    std::fs::write(&path, "not a directory").unwrap();

    let source = MockProvider::new("tcgplayer", 0.5, 10.0).into_arc();
    let o = PriceOracle::new(&config(), vec![erased(&source)], Some(PriceStore::new(&path)));
    let r = o.get_authoritative_price("Eevee", "Jungle", PriceOptions::default()).await;
    assert_eq!(r.consensus.consensus_value, 10.0);

    assert!(!o.persist().await);
    assert!(o.is_dirty());
    assert_eq!(o.history(&r.card.key).await.len(), 1);

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_background_persistence_flushes_dirty_state() {
    let dir = temp_dir();
    let source = MockProvider::new("tcgplayer", 0.5, 42.0).into_arc();
    let o = std::sync::Arc::new(PriceOracle::new(
        &config(),
        vec![erased(&source)],
        Some(PriceStore::new(&dir)),
    ));
    let handle = o.clone().spawn_persistence(Duration::from_millis(20));

    o.get_authoritative_price("Gengar", "Fossil", PriceOptions::default()).await;

    let history_file = dir.join("history.json");
    let mut flushed = false;
    for _ in 0..100 {
        if history_file.exists() && !o.is_dirty() {
            flushed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    handle.abort();
    assert!(flushed);

    let key = CardKey::new("Gengar", "Fossil", None);
    assert_eq!(PriceStore::new(&dir).load().history(&key).len(), 1);

    cleanup(&dir);
}
