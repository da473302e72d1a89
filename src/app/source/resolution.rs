//! Provider-internal id resolution cache
//!
//! Providers that key their catalogs on an internal id (rather than the
//! canonical scheme) resolve each internal id once and remember the outcome,
//! including negative outcomes, so a nightly rebuild does not re-resolve the
//! same ids. The cache is shared across all workers of a fan-out; every
//! operation takes the lock for one key only, so concurrent updates from
//! multiple workers stay per-key atomic.
//!
//! Entries persist in the provider's `{scope}_ids` table and grow
//! monotonically; an id once marked invalid stays invalid.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::app::store::CacheStore;
use crate::constants::store as store_constants;
use crate::errors::StoreResult;

/// Outcome of resolving one provider-internal id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionEntry {
    /// Whether the id resolved to a canonical id at all
    pub valid: bool,
    /// Canonical id, present iff `valid`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_id: Option<String>,
}

/// Thread-safe id-resolution map for one provider scope
#[derive(Debug)]
pub struct ResolutionCache {
    scope: String,
    entries: RwLock<HashMap<String, ResolutionEntry>>,
}

impl ResolutionCache {
    /// Create an empty cache for a provider scope (e.g., "tmdb")
    pub fn new(scope: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            scope: scope.into(),
            entries: RwLock::new(HashMap::new()),
        })
    }

    /// Backing table name for this scope
    pub fn table(&self) -> String {
        format!("{}{}", self.scope, store_constants::IDS_TABLE_SUFFIX)
    }

    /// Look up a previously resolved id
    pub async fn get(&self, internal_id: &str) -> Option<ResolutionEntry> {
        self.entries.read().await.get(internal_id).cloned()
    }

    /// Record a successful resolution
    pub async fn insert_valid(&self, internal_id: impl Into<String>, canonical_id: impl Into<String>) {
        self.entries.write().await.insert(
            internal_id.into(),
            ResolutionEntry {
                valid: true,
                canonical_id: Some(canonical_id.into()),
            },
        );
    }

    /// Record a failed resolution so the id is never retried
    pub async fn insert_invalid(&self, internal_id: impl Into<String>) {
        self.entries.write().await.insert(
            internal_id.into(),
            ResolutionEntry {
                valid: false,
                canonical_id: None,
            },
        );
    }

    /// Number of cached outcomes
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no outcomes
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Load previously persisted outcomes from the store
    pub async fn hydrate(&self, store: &CacheStore) -> StoreResult<()> {
        let snapshot = store.read_all(&self.table()).await?;
        let mut entries = self.entries.write().await;
        for (key, value) in snapshot.iter() {
            if let Ok(entry) = serde_json::from_value::<ResolutionEntry>(value.clone()) {
                entries.entry(key.clone()).or_insert(entry);
            }
        }
        info!(
            scope = %self.scope,
            entries = entries.len(),
            "resolution cache hydrated"
        );
        Ok(())
    }

    /// Persist the cache through the store's diffed write path
    pub async fn flush(&self, store: &CacheStore) -> StoreResult<()> {
        let entries = self.entries.read().await;
        let candidate: HashMap<String, Value> = entries
            .iter()
            .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|val| (k.clone(), val)))
            .collect();
        drop(entries);

        let record = store.upsert_diff(&self.table(), candidate).await?;
        debug!(
            scope = %self.scope,
            inserted = record.inserted_keys.len(),
            updated = record.updated_keys.len(),
            "resolution cache flushed"
        );
        Ok(())
    }
}
