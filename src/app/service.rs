//! Catalog service facade
//!
//! Ties the pipeline together: one `build` call rebuilds the configured
//! catalogs, assembles and persists the manifest singleton, and flushes the
//! providers' resolution caches. Read paths serve the manifest, cached
//! catalog entries, filtered 25-item pages hydrated with metadata, and a
//! summary of recent cache activity.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::app::builder::CatalogBuilder;
use crate::app::manifest::ManifestDocument;
use crate::app::models::{CachedCatalogEntry, CatalogConfig, ChangeRecord, MetadataRecord};
use crate::app::refresh::RefreshCycle;
use crate::app::source::{ResolutionCache, SourceRegistry};
use crate::app::store::CacheStore;
use crate::constants::catalog;
use crate::constants::store as store_constants;
use crate::errors::{AppError, Result};

/// Per-table view of recent cache activity
#[derive(Debug, Clone, Serialize)]
pub struct TableActivity {
    /// Table the changes were written to
    pub table: String,
    /// Keys inserted across the recent records
    pub inserted: usize,
    /// Keys updated across the recent records
    pub updated: usize,
    /// Keys marked deleted across the recent records
    pub deleted: usize,
}

/// Aggregated recent-change report, newest activity first
#[derive(Debug, Clone, Serialize)]
pub struct ChangeReport {
    /// Activity per table, ordered by most recent write
    pub tables: Vec<TableActivity>,
    /// Number of audit records the report covers
    pub records: usize,
}

/// Facade over the build pipeline and its read paths
pub struct CatalogService {
    builder: CatalogBuilder,
    store: Arc<CacheStore>,
    configs: Vec<CatalogConfig>,
    resolutions: Vec<Arc<ResolutionCache>>,
}

impl CatalogService {
    /// Create a service over a provider registry, store, and config list
    ///
    /// `resolutions` lists the providers' id-resolution caches so the
    /// service can hydrate them at startup and flush them after each build.
    pub fn new(
        registry: Arc<SourceRegistry>,
        store: Arc<CacheStore>,
        configs: Vec<CatalogConfig>,
        resolutions: Vec<Arc<ResolutionCache>>,
    ) -> Self {
        Self {
            builder: CatalogBuilder::new(registry, Arc::clone(&store)),
            store,
            configs,
            resolutions,
        }
    }

    /// Hydrate mirrors and resolution caches from the backend
    pub async fn start(&self) -> Result<()> {
        for table in [store_constants::CATALOGS_TABLE, store_constants::METAS_TABLE] {
            self.store.read_all(table).await?;
        }
        for cache in &self.resolutions {
            cache.hydrate(&self.store).await?;
        }
        info!(configs = self.configs.len(), "catalog service started");
        Ok(())
    }

    /// Run one full build: catalogs, manifest, resolution flush
    pub async fn build(&self) -> Result<ManifestDocument> {
        let fragments = self.builder.build(&self.configs).await;
        if fragments.is_empty() && !self.configs.is_empty() {
            return Err(AppError::generic("build produced no servable catalogs"));
        }

        let document = ManifestDocument::assemble(fragments);
        let candidate: HashMap<String, Value> = [(
            store_constants::MANIFEST_KEY.to_string(),
            serde_json::to_value(&document).map_err(crate::errors::StoreError::from)?,
        )]
        .into();
        self.store
            .upsert_diff(store_constants::MANIFEST_TABLE, candidate)
            .await?;

        // Resolution outcomes are an optimization; losing a flush only
        // costs re-resolution on the next build.
        for cache in &self.resolutions {
            if let Err(e) = cache.flush(&self.store).await {
                warn!(table = %cache.table(), error = %e, "resolution cache flush failed");
            }
        }

        info!(catalogs = document.catalogs.len(), "manifest persisted");
        Ok(document)
    }

    /// Current manifest document, if one has been built
    pub async fn manifest(&self) -> Result<Option<ManifestDocument>> {
        let found = self
            .store
            .read_keys(
                store_constants::MANIFEST_TABLE,
                &[store_constants::MANIFEST_KEY.to_string()],
            )
            .await?;
        match found.get(store_constants::MANIFEST_KEY) {
            Some(value) => Ok(Some(
                serde_json::from_value(value.clone()).map_err(crate::errors::StoreError::from)?,
            )),
            None => Ok(None),
        }
    }

    /// Cached entry for one composite catalog id
    pub async fn catalog_entry(&self, composite_id: &str) -> Result<Option<CachedCatalogEntry>> {
        let found = self
            .store
            .read_keys(store_constants::CATALOGS_TABLE, &[composite_id.to_string()])
            .await?;
        match found.get(composite_id) {
            Some(value) => Ok(Some(
                serde_json::from_value(value.clone()).map_err(crate::errors::StoreError::from)?,
            )),
            None => Ok(None),
        }
    }

    /// One servable catalog page: filter, 25-item window, metadata hydration
    ///
    /// An all-digit `genre` token filters by year, anything else by genre
    /// membership. Items whose metadata record is missing are dropped; the
    /// catalog's item order is preserved.
    pub async fn catalog_page(
        &self,
        composite_id: &str,
        genre: Option<&str>,
        skip: usize,
    ) -> Result<Vec<MetadataRecord>> {
        let Some(entry) = self.catalog_entry(composite_id).await? else {
            return Ok(Vec::new());
        };

        let filtered: Vec<&crate::app::models::CatalogItemRecord> = match genre {
            Some(token) if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) => {
                entry.items.iter().filter(|i| i.year == token).collect()
            }
            Some(token) if !token.is_empty() => entry
                .items
                .iter()
                .filter(|i| i.genres.iter().any(|g| g == token))
                .collect(),
            _ => entry.items.iter().collect(),
        };

        let window: Vec<String> = filtered
            .into_iter()
            .skip(skip)
            .take(catalog::SERVE_PAGE_SIZE)
            .map(|i| i.id.clone())
            .collect();
        if window.is_empty() {
            return Ok(Vec::new());
        }

        let found = self
            .store
            .read_keys(store_constants::METAS_TABLE, &window)
            .await?;
        let mut page = Vec::with_capacity(window.len());
        for id in &window {
            let Some(value) = found.get(id) else {
                warn!(id, "catalog item without metadata dropped from page");
                continue;
            };
            match serde_json::from_value::<MetadataRecord>(value.clone()) {
                Ok(meta) => page.push(meta),
                Err(e) => warn!(id, error = %e, "corrupt metadata record dropped from page"),
            }
        }
        Ok(page)
    }

    /// Summarize recent cache writes, newest table activity first
    pub async fn recent_changes(&self) -> Result<ChangeReport> {
        let records = self.store.recent_changes().await?;
        Ok(summarize(&records))
    }
}

#[async_trait]
impl RefreshCycle for CatalogService {
    async fn run_cycle(&self) -> Result<()> {
        self.build().await.map(|_| ())
    }
}

/// Fold audit records into per-table activity, keeping recency order
fn summarize(records: &[ChangeRecord]) -> ChangeReport {
    let mut order: Vec<String> = Vec::new();
    let mut by_table: HashMap<String, TableActivity> = HashMap::new();

    for record in records {
        let activity = by_table
            .entry(record.table.clone())
            .or_insert_with(|| {
                order.push(record.table.clone());
                TableActivity {
                    table: record.table.clone(),
                    inserted: 0,
                    updated: 0,
                    deleted: 0,
                }
            });
        activity.inserted += record.inserted_keys.len();
        activity.updated += record.updated_keys.len();
        activity.deleted += record.deleted_keys.len();
    }

    ChangeReport {
        tables: order
            .into_iter()
            .filter_map(|table| by_table.remove(&table))
            .collect(),
        records: records.len(),
    }
}
