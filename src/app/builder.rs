//! Catalog build orchestration
//!
//! For each catalog config the builder decides, per content type, whether
//! the cached entry is still fresh enough to serve or must be rebuilt from
//! its provider. Rebuild fetches fan out across the config's content types
//! through the work scheduler; fetched items are enriched with detail
//! records, items without a servable detail record are dropped, and the
//! survivors are merged into the shared `metas` and `catalogs` tables only
//! after the whole fan-out has returned.
//!
//! Configs are processed sequentially; a failing config or content type
//! never stops its siblings.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::app::manifest::{ManifestAssembler, ManifestFragment};
use crate::app::models::{
    CachedCatalogEntry, CatalogConfig, CatalogItemRecord, ContentType, MetadataRecord,
};
use crate::app::scheduler;
use crate::app::source::SourceRegistry;
use crate::app::store::CacheStore;
use crate::constants::store as store_constants;
use crate::errors::{BuildError, BuildResult};

/// Result of one content-type fetch inside the fan-out
struct TypeFetch {
    content_type: ContentType,
    items: Vec<CatalogItemRecord>,
    metas: Vec<MetadataRecord>,
    on_demand: bool,
}

/// Orchestrates rebuild decisions across configs and content types
pub struct CatalogBuilder {
    registry: Arc<SourceRegistry>,
    store: Arc<CacheStore>,
}

impl CatalogBuilder {
    /// Create a builder over a provider registry and cache store
    pub fn new(registry: Arc<SourceRegistry>, store: Arc<CacheStore>) -> Self {
        Self { registry, store }
    }

    /// Build every config, returning fragments in config order then
    /// content-type order within each config
    ///
    /// Per-config and per-type failures are logged and skipped; only the
    /// surviving fragments are returned.
    pub async fn build(&self, configs: &[CatalogConfig]) -> Vec<ManifestFragment> {
        info!(configs = configs.len(), "catalog build started");

        // Accurate diffs need the shared tables mirrored before any write.
        for table in [store_constants::CATALOGS_TABLE, store_constants::METAS_TABLE] {
            if let Err(e) = self.store.read_all(table).await {
                warn!(table, error = %e, "table preload failed, mirror may be empty");
            }
        }

        let mut fragments = Vec::new();
        for config in configs {
            match self.build_catalog(config).await {
                Ok(mut built) => fragments.append(&mut built),
                Err(e) => error!(name_id = %config.name_id, error = %e, "catalog config failed"),
            }
        }

        info!(fragments = fragments.len(), "catalog build finished");
        fragments
    }

    /// Build one config: freshness checks, fan-out, enrichment, persistence
    pub async fn build_catalog(
        &self,
        config: &CatalogConfig,
    ) -> BuildResult<Vec<ManifestFragment>> {
        let source = self.registry.get(&config.provider_id).ok_or_else(|| {
            BuildError::UnknownProvider {
                provider_id: config.provider_id.clone(),
                name_id: config.name_id.clone(),
            }
        })?;
        for content_type in &config.content_types {
            if !source.supports(*content_type) {
                return Err(BuildError::UnsupportedContentType {
                    provider_id: config.provider_id.clone(),
                    content_type: content_type.to_string(),
                });
            }
        }

        let now = Utc::now();
        let mut by_type: HashMap<ContentType, ManifestFragment> = HashMap::new();
        let mut stale_types: Vec<ContentType> = Vec::new();

        for content_type in &config.content_types {
            match self.fresh_entry(config, *content_type, now).await {
                Some(entry) => {
                    debug!(
                        composite_id = %config.composite_id(*content_type),
                        "cached entry fresh, reused"
                    );
                    by_type.insert(
                        *content_type,
                        ManifestAssembler::assemble(config, *content_type, &entry.items),
                    );
                }
                None => stale_types.push(*content_type),
            }
        }

        if !stale_types.is_empty() {
            let schema = config.query_schema.clone();
            let page_count = config.page_count;
            let source_for_fetch = Arc::clone(&source);

            let slots = scheduler::run_ordered(stale_types.clone(), None, move |content_type, _| {
                let source = Arc::clone(&source_for_fetch);
                let schema = schema.clone();
                async move {
                    if source.on_demand() {
                        return Ok::<_, crate::errors::ProviderError>(Some(TypeFetch {
                            content_type,
                            items: Vec::new(),
                            metas: Vec::new(),
                            on_demand: true,
                        }));
                    }

                    let items = source.fetch_catalog(&schema, content_type, page_count).await?;
                    if items.is_empty() {
                        return Ok(None);
                    }

                    let ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
                    let details = source.fetch_details(&ids, content_type).await?;
                    let (items, metas) = enrich(items, details);
                    if items.is_empty() {
                        return Ok(None);
                    }
                    Ok(Some(TypeFetch {
                        content_type,
                        items,
                        metas,
                        on_demand: false,
                    }))
                }
            })
            .await;

            // Merging into the shared mirrors happens only here, after the
            // whole fan-out has returned.
            for slot in slots {
                match slot {
                    Ok(Some(fetch)) => {
                        let content_type = fetch.content_type;
                        match self.commit_type(config, fetch, now).await {
                            Ok(fragment) => {
                                by_type.insert(content_type, fragment);
                            }
                            Err(e) => {
                                // Earlier chunks stay committed; the prior
                                // cached entry remains last-known-good.
                                error!(
                                    composite_id = %config.composite_id(content_type),
                                    error = %e,
                                    "persistence failed, rebuild abandoned for this type"
                                );
                            }
                        }
                    }
                    Ok(None) => {
                        debug!(name_id = %config.name_id, "empty fetch, cached entry untouched");
                    }
                    Err(failure) => {
                        warn!(name_id = %config.name_id, %failure, "content type fetch failed");
                    }
                }
            }
        }

        Ok(config
            .content_types
            .iter()
            .filter_map(|ct| by_type.remove(ct))
            .collect())
    }

    /// Return the cached entry when it may be served without a rebuild
    async fn fresh_entry(
        &self,
        config: &CatalogConfig,
        content_type: ContentType,
        now: DateTime<Utc>,
    ) -> Option<CachedCatalogEntry> {
        if config.force_update {
            return None;
        }
        let composite_id = config.composite_id(content_type);
        let found = self
            .store
            .read_keys(store_constants::CATALOGS_TABLE, &[composite_id.clone()])
            .await
            .ok()?;
        let entry: CachedCatalogEntry =
            serde_json::from_value(found.get(&composite_id)?.clone()).ok()?;
        entry.is_fresh(now).then_some(entry)
    }

    /// Persist one rebuilt type and emit its fragment
    async fn commit_type(
        &self,
        config: &CatalogConfig,
        fetch: TypeFetch,
        now: DateTime<Utc>,
    ) -> BuildResult<ManifestFragment> {
        if fetch.on_demand {
            // Nothing was fetched and nothing is cached for on-demand types.
            return Ok(ManifestAssembler::assemble(
                config,
                fetch.content_type,
                &fetch.items,
            ));
        }

        let composite_id = config.composite_id(fetch.content_type);

        // Shared tables grow by merge; the candidate is the mirror plus the
        // fresh records, so the diff writes only what actually changed.
        let metas_snapshot = self.store.snapshot(store_constants::METAS_TABLE).await;
        let mut metas_candidate: HashMap<String, Value> = (*metas_snapshot).clone();
        for meta in &fetch.metas {
            metas_candidate.insert(meta.id.clone(), serde_json::to_value(meta)?);
        }
        self.store
            .upsert_diff(store_constants::METAS_TABLE, metas_candidate)
            .await?;

        let ttl = TimeDelta::from_std(config.ttl).unwrap_or_else(|_| TimeDelta::days(1));
        let entry = CachedCatalogEntry {
            items: fetch.items.clone(),
            expires_at: now + ttl,
        };
        let catalogs_snapshot = self.store.snapshot(store_constants::CATALOGS_TABLE).await;
        let mut catalogs_candidate: HashMap<String, Value> = (*catalogs_snapshot).clone();
        catalogs_candidate.insert(composite_id.clone(), serde_json::to_value(&entry)?);
        self.store
            .upsert_diff(store_constants::CATALOGS_TABLE, catalogs_candidate)
            .await?;

        info!(
            %composite_id,
            items = fetch.items.len(),
            "catalog entry rebuilt"
        );
        Ok(ManifestAssembler::assemble(
            config,
            fetch.content_type,
            &fetch.items,
        ))
    }
}

/// Merge detail records into fetched items
///
/// Items without a servable detail record (missing title or poster) are
/// dropped; survivors take the simplified genres and year from their record.
fn enrich(
    items: Vec<CatalogItemRecord>,
    details: Vec<crate::app::models::RawDetailRecord>,
) -> (Vec<CatalogItemRecord>, Vec<MetadataRecord>) {
    let mut metas_by_id: HashMap<String, MetadataRecord> = HashMap::new();
    for detail in details {
        if let Some(meta) = detail.into_metadata() {
            metas_by_id.insert(meta.id.clone(), meta);
        }
    }

    let mut enriched = Vec::with_capacity(items.len());
    let mut metas = Vec::with_capacity(metas_by_id.len());
    for mut item in items {
        let Some(meta) = metas_by_id.remove(&item.id) else {
            debug!(id = %item.id, "no servable detail record, item dropped");
            continue;
        };
        item.genres = meta.genres.clone();
        item.year = meta.release_info.clone();
        enriched.push(item);
        metas.push(meta);
    }
    (enriched, metas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{FilterKind, RawDetailRecord};
    use crate::app::source::ContentSource;
    use crate::app::store::MemoryBackend;
    use crate::errors::ProviderResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Provider double with scripted outputs and call counting
    struct ScriptedSource {
        catalog: Vec<CatalogItemRecord>,
        details: Vec<RawDetailRecord>,
        on_demand: bool,
        fetch_calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(catalog: Vec<CatalogItemRecord>, details: Vec<RawDetailRecord>) -> Self {
            Self {
                catalog,
                details,
                on_demand: false,
                fetch_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ContentSource for ScriptedSource {
        fn provider_id(&self) -> &str {
            "scripted"
        }

        fn on_demand(&self) -> bool {
            self.on_demand
        }

        async fn fetch_catalog(
            &self,
            _schema: &str,
            content_type: ContentType,
            _page_count: Option<u32>,
        ) -> ProviderResult<Vec<CatalogItemRecord>> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .catalog
                .iter()
                .filter(|i| i.content_type == content_type)
                .cloned()
                .collect())
        }

        async fn fetch_details(
            &self,
            ids: &[String],
            _content_type: ContentType,
        ) -> ProviderResult<Vec<RawDetailRecord>> {
            Ok(self
                .details
                .iter()
                .filter(|d| ids.contains(&d.id))
                .cloned()
                .collect())
        }
    }

    fn detail(id: &str, genres: &[&str]) -> RawDetailRecord {
        RawDetailRecord {
            id: id.to_string(),
            title: Some(format!("Title {id}")),
            poster: Some(format!("http://img/{id}.jpg")),
            description: None,
            genres: genres.iter().map(|g| g.to_string()).collect(),
            release_info: "2020".to_string(),
        }
    }

    fn action_config() -> CatalogConfig {
        CatalogConfig {
            name_id: "action.movies".to_string(),
            provider_id: "scripted".to_string(),
            content_types: vec![ContentType::Movie],
            query_schema: "discover/$type".to_string(),
            filter_kind: FilterKind::Categories,
            display_name: None,
            ttl: Duration::from_secs(24 * 60 * 60),
            page_count: None,
            force_update: false,
        }
    }

    fn builder_with(source: ScriptedSource) -> (CatalogBuilder, Arc<CacheStore>, Arc<ScriptedSource>) {
        let store = Arc::new(CacheStore::new(Arc::new(MemoryBackend::new())));
        let source = Arc::new(source);
        let mut registry = SourceRegistry::new();
        registry.register(Arc::clone(&source) as Arc<dyn ContentSource>);
        let builder = CatalogBuilder::new(Arc::new(registry), Arc::clone(&store));
        (builder, store, source)
    }

    #[tokio::test]
    async fn test_end_to_end_rebuild_drops_unenriched_items() {
        // fetch returns tt1..tt3, details only for tt1 and tt2
        let source = ScriptedSource::new(
            vec![
                CatalogItemRecord::new("tt1", ContentType::Movie),
                CatalogItemRecord::new("tt2", ContentType::Movie),
                CatalogItemRecord::new("tt3", ContentType::Movie),
            ],
            vec![
                detail("tt1", &["Action"]),
                detail("tt2", &["Action", "Thriller"]),
            ],
        );
        let (builder, store, _) = builder_with(source);

        let fragments = builder.build(&[action_config()]).await;
        assert_eq!(fragments.len(), 1);
        let genre_options = fragments[0].extra[0].options.as_ref().unwrap();
        assert_eq!(genre_options, &vec!["Action".to_string(), "Thriller".to_string()]);

        let catalogs = store.snapshot(store_constants::CATALOGS_TABLE).await;
        let entry: CachedCatalogEntry =
            serde_json::from_value(catalogs["action.movies.movie"].clone()).unwrap();
        assert_eq!(entry.items.len(), 2);
        assert_eq!(entry.items[0].id, "tt1");
        assert_eq!(entry.items[1].id, "tt2");
        assert!(entry.is_fresh(Utc::now()));

        let metas = store.snapshot(store_constants::METAS_TABLE).await;
        assert!(metas.contains_key("tt1"));
        assert!(metas.contains_key("tt2"));
        assert!(!metas.contains_key("tt3"));
    }

    #[tokio::test]
    async fn test_fresh_entry_skips_fetch_and_write() {
        let source = ScriptedSource::new(
            vec![CatalogItemRecord::new("tt9", ContentType::Movie)],
            vec![detail("tt9", &["Drama"])],
        );
        let (builder, store, source) = builder_with(source);

        // Seed a fresh cached entry.
        let entry = CachedCatalogEntry {
            items: vec![CatalogItemRecord {
                id: "tt1".to_string(),
                content_type: ContentType::Movie,
                genres: vec!["Action".to_string()],
                year: "2019".to_string(),
            }],
            expires_at: Utc::now() + TimeDelta::hours(1),
        };
        store
            .upsert_diff(
                store_constants::CATALOGS_TABLE,
                [(
                    "action.movies.movie".to_string(),
                    serde_json::to_value(&entry).unwrap(),
                )]
                .into(),
            )
            .await
            .unwrap();

        let fragments = builder.build(&[action_config()]).await;
        assert_eq!(fragments.len(), 1);
        // Fragment derives from the cached items, not a new fetch.
        assert_eq!(
            fragments[0].extra[0].options.as_ref().unwrap(),
            &vec!["Action".to_string()]
        );
        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 0);

        let catalogs = store.snapshot(store_constants::CATALOGS_TABLE).await;
        let unchanged: CachedCatalogEntry =
            serde_json::from_value(catalogs["action.movies.movie"].clone()).unwrap();
        assert_eq!(unchanged.items[0].id, "tt1");
    }

    #[tokio::test]
    async fn test_force_update_rebuilds_fresh_entry() {
        let source = ScriptedSource::new(
            vec![CatalogItemRecord::new("tt9", ContentType::Movie)],
            vec![detail("tt9", &["Drama"])],
        );
        let (builder, store, source) = builder_with(source);

        let entry = CachedCatalogEntry {
            items: vec![CatalogItemRecord::new("tt1", ContentType::Movie)],
            expires_at: Utc::now() + TimeDelta::hours(1),
        };
        store
            .upsert_diff(
                store_constants::CATALOGS_TABLE,
                [(
                    "action.movies.movie".to_string(),
                    serde_json::to_value(&entry).unwrap(),
                )]
                .into(),
            )
            .await
            .unwrap();

        let mut config = action_config();
        config.force_update = true;
        builder.build(&[config]).await;

        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 1);
        let catalogs = store.snapshot(store_constants::CATALOGS_TABLE).await;
        let rebuilt: CachedCatalogEntry =
            serde_json::from_value(catalogs["action.movies.movie"].clone()).unwrap();
        assert_eq!(rebuilt.items[0].id, "tt9");
    }

    #[tokio::test]
    async fn test_empty_fetch_leaves_cached_entry_untouched() {
        let source = ScriptedSource::new(vec![], vec![]);
        let (builder, store, _) = builder_with(source);

        // Expired entry that an empty fetch must not overwrite.
        let entry = CachedCatalogEntry {
            items: vec![CatalogItemRecord::new("tt1", ContentType::Movie)],
            expires_at: Utc::now() - TimeDelta::hours(1),
        };
        store
            .upsert_diff(
                store_constants::CATALOGS_TABLE,
                [(
                    "action.movies.movie".to_string(),
                    serde_json::to_value(&entry).unwrap(),
                )]
                .into(),
            )
            .await
            .unwrap();

        let fragments = builder.build(&[action_config()]).await;
        assert!(fragments.is_empty());

        let catalogs = store.snapshot(store_constants::CATALOGS_TABLE).await;
        let kept: CachedCatalogEntry =
            serde_json::from_value(catalogs["action.movies.movie"].clone()).unwrap();
        assert_eq!(kept.items[0].id, "tt1");
    }

    #[tokio::test]
    async fn test_on_demand_provider_emits_fragment_without_cache_write() {
        let mut source = ScriptedSource::new(
            vec![CatalogItemRecord::new("tt1", ContentType::Movie)],
            vec![],
        );
        source.on_demand = true;
        let (builder, store, source) = builder_with(source);

        let fragments = builder.build(&[action_config()]).await;
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].extra[0].options.as_ref().unwrap().is_empty());
        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 0);
        assert!(store
            .snapshot(store_constants::CATALOGS_TABLE)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_unknown_provider_fails_config_but_not_siblings() {
        let source = ScriptedSource::new(
            vec![CatalogItemRecord::new("tt1", ContentType::Movie)],
            vec![detail("tt1", &["Action"])],
        );
        let (builder, _, _) = builder_with(source);

        let mut bad = action_config();
        bad.provider_id = "missing".to_string();
        bad.name_id = "broken.movies".to_string();

        let fragments = builder.build(&[bad, action_config()]).await;
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].id, "action.movies.movie");
    }

    #[tokio::test]
    async fn test_output_order_follows_config_then_type_order() {
        let source = ScriptedSource::new(
            vec![
                CatalogItemRecord::new("tt1", ContentType::Movie),
                CatalogItemRecord::new("tt2", ContentType::Series),
            ],
            vec![detail("tt1", &["Action"]), detail("tt2", &["Drama"])],
        );
        let (builder, _, _) = builder_with(source);

        let mut config = action_config();
        config.name_id = "mixed.picks".to_string();
        config.content_types = vec![ContentType::Series, ContentType::Movie];

        let fragments = builder.build(&[config]).await;
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].id, "mixed.picks.series");
        assert_eq!(fragments[1].id, "mixed.picks.movie");
    }
}
