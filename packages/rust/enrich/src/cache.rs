//! Shared enrichment cache.
//!
//! One logical key-value store shared between the poller's enrichment calls
//! and the administrative HTTP surface (stats / clear). Entries never expire
//! within the process lifetime; only an explicit clear removes them.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

use tabreport_shared::EnrichmentData;

/// Maximum number of keys returned in a stats sample.
const STATS_SAMPLE_SIZE: usize = 10;

/// Process-wide enrichment cache keyed by normalized entity name.
///
/// Internally synchronized; share it via `Arc` between the poller and the
/// admin endpoints. The lock is never held across an await point.
#[derive(Debug, Default)]
pub struct EnrichmentCache {
    entries: Mutex<HashMap<String, EnrichmentData>>,
}

/// Snapshot returned by the admin stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Number of cached entries.
    pub size: usize,
    /// Up to ten cached keys, sorted for stable output.
    pub sample_keys: Vec<String>,
}

impl EnrichmentCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a normalized key.
    pub fn get(&self, key: &str) -> Option<EnrichmentData> {
        self.entries
            .lock()
            .expect("enrichment cache poisoned")
            .get(key)
            .cloned()
    }

    /// Store a result under its normalized key.
    pub fn insert(&self, key: String, data: EnrichmentData) {
        self.entries
            .lock()
            .expect("enrichment cache poisoned")
            .insert(key, data);
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("enrichment cache poisoned")
            .len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock().expect("enrichment cache poisoned");
        let removed = entries.len();
        entries.clear();
        removed
    }

    /// Size plus a bounded sample of keys for the admin surface.
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().expect("enrichment cache poisoned");
        let mut sample_keys: Vec<String> = entries.keys().cloned().collect();
        sample_keys.sort();
        sample_keys.truncate(STATS_SAMPLE_SIZE);
        CacheStats {
            size: entries.len(),
            sample_keys,
        }
    }
}
