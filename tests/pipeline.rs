//! Integration tests for the full build-and-serve pipeline
//!
//! These tests drive a complete cycle through real components: a scripted
//! provider, the catalog builder, the diffed cache store over the
//! file-backed backend, manifest assembly, and the service read paths.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use catalog_forge::app::store::{CacheStore, FileBackend};
use catalog_forge::app::{
    CatalogConfig, CatalogItemRecord, CatalogService, ContentSource, ContentType, FilterKind,
    RawDetailRecord, SourceRegistry,
};
use catalog_forge::errors::ProviderResult;

/// Scripted provider with a fixed catalog and detail set
struct ScriptedSource {
    catalog: Vec<CatalogItemRecord>,
    details: Vec<RawDetailRecord>,
    fetch_calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(catalog: Vec<CatalogItemRecord>, details: Vec<RawDetailRecord>) -> Self {
        Self {
            catalog,
            details,
            fetch_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ContentSource for ScriptedSource {
    fn provider_id(&self) -> &str {
        "scripted"
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

fn detail(id: &str, title: &str, genres: &[&str], year: &str) -> RawDetailRecord {
    RawDetailRecord {
        id: id.to_string(),
        title: Some(title.to_string()),
        poster: Some(format!("http://img/{id}.jpg")),
        description: Some(format!("About {title}")),
        genres: genres.iter().map(|g| g.to_string()).collect(),
        release_info: year.to_string(),
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

async fn service_over(
    dir: &TempDir,
    source: ScriptedSource,
    configs: Vec<CatalogConfig>,
) -> (CatalogService, Arc<ScriptedSource>) {
    let backend = Arc::new(FileBackend::new(dir.path()).await.unwrap());
    let store = Arc::new(CacheStore::new(backend));
    let source = Arc::new(source);
    let mut registry = SourceRegistry::new();
    registry.register(Arc::clone(&source) as Arc<dyn ContentSource>);
    let service = CatalogService::new(Arc::new(registry), store, configs, Vec::new());
    service.start().await.unwrap();
    (service, source)
}

fn matrix_catalog() -> (Vec<CatalogItemRecord>, Vec<RawDetailRecord>) {
    (
        vec![
            CatalogItemRecord::new("tt0133093", ContentType::Movie),
            CatalogItemRecord::new("tt0234215", ContentType::Movie),
            CatalogItemRecord::new("tt9999999", ContentType::Movie),
        ],
        vec![
            detail("tt0133093", "The Matrix", &["Action", "Sci-Fi"], "1999"),
            detail("tt0234215", "The Matrix Reloaded", &["Action"], "2003"),
            // tt9999999 has no detail record and must be dropped
        ],
    )
}

#[tokio::test]
async fn test_full_build_then_serve_pages() {
    let dir = TempDir::new().unwrap();
    let (catalog, details) = matrix_catalog();
    let (service, _) = service_over(&dir, ScriptedSource::new(catalog, details), vec![action_config()]).await;

    let document = service.build().await.unwrap();
    assert_eq!(document.catalogs.len(), 1);
    let fragment = &document.catalogs[0];
    assert_eq!(fragment.id, "action.movies.movie");
    assert_eq!(fragment.category, "Action");
    assert_eq!(
        fragment.extra[0].options.as_ref().unwrap(),
        &vec!["Action".to_string(), "Sci-Fi".to_string()]
    );

    // The unenriched item is gone from the served page.
    let page = service
        .catalog_page("action.movies.movie", None, 0)
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].title, "The Matrix");
    assert_eq!(page[1].title, "The Matrix Reloaded");

    // Genre and year-token filtering.
    let scifi = service
        .catalog_page("action.movies.movie", Some("Sci-Fi"), 0)
        .await
        .unwrap();
    assert_eq!(scifi.len(), 1);
    let y2003 = service
        .catalog_page("action.movies.movie", Some("2003"), 0)
        .await
        .unwrap();
    assert_eq!(y2003.len(), 1);
    assert_eq!(y2003[0].id, "tt0234215");
}

#[tokio::test]
async fn test_cache_survives_restart_and_stays_fresh() {
    let dir = TempDir::new().unwrap();
    let (catalog, details) = matrix_catalog();
    {
        let (service, source) =
            service_over(&dir, ScriptedSource::new(catalog.clone(), details.clone()), vec![action_config()]).await;
        service.build().await.unwrap();
        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 1);
    }

    // Fresh process over the same data directory: entry is still fresh, so
    // a rebuild reuses it without touching the provider.
    let (service, source) =
        service_over(&dir, ScriptedSource::new(catalog, details), vec![action_config()]).await;
    let manifest = service.manifest().await.unwrap().unwrap();
    assert_eq!(manifest.catalogs.len(), 1);

    let document = service.build().await.unwrap();
    assert_eq!(document.catalogs.len(), 1);
    assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 0);

    let page = service
        .catalog_page("action.movies.movie", None, 0)
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
}

#[tokio::test]
async fn test_empty_fetch_keeps_last_known_good_catalog() {
    let dir = TempDir::new().unwrap();
    let (catalog, details) = matrix_catalog();
    {
        let mut config = action_config();
        config.ttl = Duration::from_secs(0); // expires immediately
        let (service, _) =
            service_over(&dir, ScriptedSource::new(catalog, details), vec![config]).await;
        service.build().await.unwrap();
    }

    // Provider went dark; the expired entry must survive the failed rebuild.
    let (service, _) = service_over(
        &dir,
        ScriptedSource::new(Vec::new(), Vec::new()),
        vec![action_config()],
    )
    .await;
    assert!(service.build().await.is_err());

    let entry = service
        .catalog_entry("action.movies.movie")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.items.len(), 2);
}

#[tokio::test]
async fn test_change_audit_reflects_incremental_writes() {
    let dir = TempDir::new().unwrap();
    let (catalog, mut details) = matrix_catalog();
    let mut config = action_config();
    config.force_update = true;

    let (service, _) = service_over(
        &dir,
        ScriptedSource::new(catalog.clone(), details.clone()),
        vec![config.clone()],
    )
    .await;
    service.build().await.unwrap();

    let report = service.recent_changes().await.unwrap();
    let metas = report.tables.iter().find(|t| t.table == "metas").unwrap();
    assert_eq!(metas.inserted, 2);
    assert_eq!(metas.updated, 0);

    // Second forced build with one changed record: only the change is
    // audited as an update, everything else is untouched.
    details[0].genres.push("Thriller".to_string());
    let (service, _) = service_over(&dir, ScriptedSource::new(catalog, details), vec![config]).await;
    service.build().await.unwrap();

    let report = service.recent_changes().await.unwrap();
    let metas = report.tables.iter().find(|t| t.table == "metas").unwrap();
    assert_eq!(metas.inserted, 2);
    assert_eq!(metas.updated, 1);
    assert_eq!(metas.deleted, 0);
}

#[tokio::test]
async fn test_mixed_type_config_builds_both_fragments() {
    let dir = TempDir::new().unwrap();
    let catalog = vec![
        CatalogItemRecord::new("tt0133093", ContentType::Movie),
        CatalogItemRecord::new("tt0903747", ContentType::Series),
    ];
    let details = vec![
        detail("tt0133093", "The Matrix", &["Action"], "1999"),
        detail("tt0903747", "Breaking Bad", &["Drama"], "2008–2013"),
    ];

    let mut config = action_config();
    config.name_id = "top.picks".to_string();
    config.content_types = vec![ContentType::Movie, ContentType::Series];

    let (service, _) = service_over(&dir, ScriptedSource::new(catalog, details), vec![config]).await;
    let document = service.build().await.unwrap();

    assert_eq!(document.catalogs.len(), 2);
    assert_eq!(document.catalogs[0].id, "top.picks.movie");
    assert_eq!(document.catalogs[1].id, "top.picks.series");

    // Year ranges are simplified to their first segment.
    let page = service
        .catalog_page("top.picks.series", None, 0)
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    let entry = service
        .catalog_entry("top.picks.series")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.items[0].year, "2008");
}
