//! Persistence layer.
//!
//! Durable state is three plain JSON documents in one data directory:
//!
//! - `last_known_good.json`: card key → `{value, source, lastUpdated}`
//! - `history.json`: card key → `[{date, price}, ...]`
//! - `thresholds.json`: card key → `{buyThreshold, sellThreshold}`
//!
//! Each is loaded wholesale at startup and rewritten wholesale on save.
//! Writes go to a temp file that is then renamed over the target, but
//! the three documents are not written atomically as a set.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::types::{AlertThreshold, CardKey, HistoricalPoint, LastKnownGood};

const LAST_KNOWN_GOOD_FILE: &str = "last_known_good.json";
const HISTORY_FILE: &str = "history.json";
const THRESHOLDS_FILE: &str = "thresholds.json";

// ---------------------------------------------------------------------------
// In-memory state
// ---------------------------------------------------------------------------

/// Everything that survives a restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DurableState {
    pub last_known_good: BTreeMap<CardKey, LastKnownGood>,
    pub history: BTreeMap<CardKey, Vec<HistoricalPoint>>,
    pub thresholds: BTreeMap<CardKey, AlertThreshold>,
}

impl DurableState {
    /// Append one observation to a card's series. Series only grow.
    pub fn append_point(&mut self, key: &CardKey, point: HistoricalPoint) {
        self.history.entry(key.clone()).or_default().push(point);
    }

    pub fn history(&self, key: &CardKey) -> &[HistoricalPoint] {
        self.history.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_threshold(&mut self, key: &CardKey, threshold: AlertThreshold) {
        if threshold.is_empty() {
            self.thresholds.remove(key);
        } else {
            self.thresholds.insert(key.clone(), threshold);
        }
    }

    pub fn remove_threshold(&mut self, key: &CardKey) -> Option<AlertThreshold> {
        self.thresholds.remove(key)
    }

    pub fn threshold(&self, key: &CardKey) -> Option<&AlertThreshold> {
        self.thresholds.get(key)
    }

    pub fn set_last_known_good(&mut self, key: &CardKey, record: LastKnownGood) {
        self.last_known_good.insert(key.clone(), record);
    }

    pub fn last_known_good(&self, key: &CardKey) -> Option<&LastKnownGood> {
        self.last_known_good.get(key)
    }

    pub fn total_points(&self) -> usize {
        self.history.values().map(Vec::len).sum()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// JSON snapshot store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct PriceStore {
    dir: PathBuf,
}

impl PriceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load all documents.
    ///
    /// Never fails: a missing document is a fresh start, and a corrupt
    /// one is logged and treated as empty.
    pub fn load(&self) -> DurableState {
        let state = DurableState {
            last_known_good: self.load_document(LAST_KNOWN_GOOD_FILE),
            history: self.load_document(HISTORY_FILE),
            thresholds: self.load_document(THRESHOLDS_FILE),
        };

        info!(
            dir = %self.dir.display(),
            cards = state.history.len(),
            points = state.total_points(),
            thresholds = state.thresholds.len(),
            "Durable state loaded"
        );

        state
    }

    /// Rewrite all documents from `state`.
    pub fn save(&self, state: &DurableState) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create data dir {}", self.dir.display()))?;

        self.write_document(LAST_KNOWN_GOOD_FILE, &state.last_known_good)?;
        self.write_document(HISTORY_FILE, &state.history)?;
        self.write_document(THRESHOLDS_FILE, &state.thresholds)?;

        debug!(
            dir = %self.dir.display(),
            points = state.total_points(),
            "Durable state saved"
        );
        Ok(())
    }

    /// Delete all documents (for testing or reset).
    pub fn delete(&self) -> Result<()> {
        for file in [LAST_KNOWN_GOOD_FILE, HISTORY_FILE, THRESHOLDS_FILE] {
            let path = self.dir.join(file);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to delete {}", path.display()))?;
            }
        }
        Ok(())
    }

    fn load_document<T: DeserializeOwned + Default>(&self, file: &str) -> T {
        let path = self.dir.join(file);
        if !path.exists() {
            debug!(path = %path.display(), "No saved document, starting empty");
            return T::default();
        }

        let parsed = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))
            .and_then(|json| {
                serde_json::from_str(&json)
                    .with_context(|| format!("Failed to parse {}", path.display()))
            });

        match parsed {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable document, starting empty");
                T::default()
            }
        }
    }

    fn write_document<T: Serialize>(&self, file: &str, doc: &T) -> Result<()> {
        let path = self.dir.join(file);
        let tmp = self.dir.join(format!(".{file}.{}.tmp", uuid::Uuid::new_v4()));

        let json = serde_json::to_string_pretty(doc)
            .with_context(|| format!("Failed to serialise {file}"))?;
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to move {} into place", path.display()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
