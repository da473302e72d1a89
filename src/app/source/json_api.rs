//! Generic paged JSON catalog provider
//!
//! Covers the common provider shape: a paged listing endpoint whose query
//! schema is templated per content type, item nodes keyed by a
//! provider-internal id, and a canonical id reachable either inline
//! (`imdb_id` on the node) or through a resolve endpoint. Resolution
//! outcomes are remembered in a shared [`ResolutionCache`] so nightly
//! rebuilds skip already-resolved ids, including known-bad ones.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::app::models::{CatalogItemRecord, ContentType, RawDetailRecord};
use crate::app::scheduler;
use crate::errors::{ProviderError, ProviderResult};

use super::client::MetaClient;
use super::resolution::ResolutionCache;
use super::ContentSource;

/// Maximum canonical ids per detail request
const DETAIL_BATCH_SIZE: usize = 100;

/// Static description of one JSON API provider
#[derive(Debug, Clone)]
pub struct JsonApiSourceConfig {
    /// Registry key
    pub provider_id: String,
    /// Listing/resolve endpoint base
    pub base_url: Url,
    /// Detail (enrichment) endpoint base
    pub detail_url: Url,
    /// Pages fetched when the catalog config does not say otherwise
    pub default_page_count: u32,
    /// Provider resolves items per end-user request, not at build time
    pub on_demand: bool,
    /// Content types this provider can serve (empty means all)
    pub content_types: Vec<ContentType>,
}

/// JSON API provider over a shared [`MetaClient`]
pub struct JsonApiSource {
    config: JsonApiSourceConfig,
    client: MetaClient,
    resolution: Arc<ResolutionCache>,
}

impl JsonApiSource {
    /// Create a provider with its own resolution cache scope
    pub fn new(config: JsonApiSourceConfig, client: MetaClient) -> Self {
        let resolution = ResolutionCache::new(config.provider_id.clone());
        Self {
            config,
            client,
            resolution,
        }
    }

    /// Shared resolution cache (hydrated/flushed by the service layer)
    pub fn resolution_cache(&self) -> Arc<ResolutionCache> {
        Arc::clone(&self.resolution)
    }

    /// Build the page URLs for one catalog fetch
    ///
    /// `$type` in the schema is replaced with the content-type token; pages
    /// are 1-based, appended as `page=N`.
    fn page_urls(
        &self,
        schema: &str,
        content_type: ContentType,
        pages: u32,
    ) -> ProviderResult<Vec<Url>> {
        let schema = schema.replace("$type", content_type.as_str());
        let separator = if schema.contains('?') { '&' } else { '?' };
        (1..=pages)
            .map(|page| {
                let path = format!("{schema}{separator}page={page}");
                self.config
                    .base_url
                    .join(&path)
                    .map_err(|_| ProviderError::InvalidUrl {
                        url: format!("{}{}", self.config.base_url, path),
                    })
            })
            .collect()
    }

    /// Map one listing node to a canonical record, consulting the cache
    ///
    /// Returns `None` for nodes without an id, ids known to be invalid, and
    /// ids that fail to resolve (which are then remembered as invalid).
    async fn resolve_node(
        &self,
        node: &Value,
        content_type: ContentType,
    ) -> Option<CatalogItemRecord> {
        let internal_id = match node.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return None,
        };

        if let Some(entry) = self.resolution.get(&internal_id).await {
            return if entry.valid {
                entry
                    .canonical_id
                    .map(|id| CatalogItemRecord::new(id, content_type))
            } else {
                None
            };
        }

        // Inline canonical id on the node wins over a resolve round trip.
        let inline = node
            .get("imdb_id")
            .and_then(Value::as_str)
            .filter(|id| id.starts_with("tt"))
            .map(str::to_string);

        let canonical = match inline {
            Some(id) => Some(id),
            None => self.resolve_remote(&internal_id, content_type).await,
        };

        match canonical {
            Some(id) => {
                self.resolution.insert_valid(&internal_id, &id).await;
                Some(CatalogItemRecord::new(id, content_type))
            }
            None => {
                debug!(internal_id, "id resolution failed, marked invalid");
                self.resolution.insert_invalid(&internal_id).await;
                None
            }
        }
    }

    async fn resolve_remote(&self, internal_id: &str, content_type: ContentType) -> Option<String> {
        let path = format!("external_ids/{}/{}", content_type.as_str(), internal_id);
        let url = self.config.base_url.join(&path).ok()?;
        let body = self.client.get_json(&url).await.ok()?;
        body.get("imdb_id")
            .and_then(Value::as_str)
            .filter(|id| id.starts_with("tt"))
            .map(str::to_string)
    }
}

#[async_trait]
impl ContentSource for JsonApiSource {
    fn provider_id(&self) -> &str {
        &self.config.provider_id
    }

    fn on_demand(&self) -> bool {
        self.config.on_demand
    }

    fn supports(&self, content_type: ContentType) -> bool {
        self.config.content_types.is_empty() || self.config.content_types.contains(&content_type)
    }

    async fn fetch_catalog(
        &self,
        schema: &str,
        content_type: ContentType,
        page_count: Option<u32>,
    ) -> ProviderResult<Vec<CatalogItemRecord>> {
        let pages = page_count.unwrap_or(self.config.default_page_count).max(1);
        let urls = self.page_urls(schema, content_type, pages)?;

        let client = self.client.clone();
        let page_results = scheduler::run_ordered(urls, None, move |url, _| {
            let client = client.clone();
            async move {
                let body = client.get_json(&url).await?;
                let nodes = body
                    .get("results")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                Ok::<Vec<Value>, ProviderError>(nodes)
            }
        })
        .await;

        let mut seen: HashSet<String> = HashSet::new();
        let mut records: Vec<CatalogItemRecord> = Vec::new();
        for slot in page_results {
            let nodes = match slot {
                Ok(nodes) => nodes,
                Err(failure) => {
                    // A failed page costs its items, not the whole catalog.
                    warn!(provider = %self.config.provider_id, %failure, "catalog page dropped");
                    continue;
                }
            };
            for node in &nodes {
                if let Some(record) = self.resolve_node(node, content_type).await {
                    if seen.insert(record.id.clone()) {
                        records.push(record);
                    }
                }
            }
        }

        debug!(
            provider = %self.config.provider_id,
            content_type = %content_type,
            items = records.len(),
            "catalog fetch complete"
        );
        Ok(records)
    }

    async fn fetch_details(
        &self,
        ids: &[String],
        content_type: ContentType,
    ) -> ProviderResult<Vec<RawDetailRecord>> {
        let batches: Vec<Vec<String>> = ids
            .chunks(DETAIL_BATCH_SIZE)
            .map(|chunk| chunk.to_vec())
            .collect();

        let client = self.client.clone();
        let detail_url = self.config.detail_url.clone();
        let batch_results = scheduler::run_ordered(batches, None, move |batch, _| {
            let client = client.clone();
            let detail_url = detail_url.clone();
            async move {
                client
                    .fetch_detail_batch(&detail_url, &batch, content_type)
                    .await
            }
        })
        .await;

        let mut records = Vec::new();
        for slot in batch_results {
            match slot {
                Ok(batch) => records.extend(batch),
                Err(failure) => {
                    warn!(provider = %self.config.provider_id, %failure, "detail batch dropped");
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_source() -> JsonApiSource {
        let config = JsonApiSourceConfig {
            provider_id: "tmdb".to_string(),
            base_url: Url::parse("https://api.provider.example/3/").unwrap(),
            detail_url: Url::parse("https://details.example/").unwrap(),
            default_page_count: 2,
            on_demand: false,
            content_types: vec![ContentType::Movie, ContentType::Series],
        };
        JsonApiSource::new(config, MetaClient::new().unwrap())
    }

    #[test]
    fn test_page_urls_substitute_type_and_page() {
        let source = test_source();
        let urls = source
            .page_urls("discover/$type?sort_by=popularity.desc", ContentType::Series, 2)
            .unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(
            urls[0].as_str(),
            "https://api.provider.example/3/discover/series?sort_by=popularity.desc&page=1"
        );
        assert!(urls[1].as_str().ends_with("page=2"));
    }

    #[test]
    fn test_page_urls_without_query_use_question_mark() {
        let source = test_source();
        let urls = source
            .page_urls("trending/$type", ContentType::Movie, 1)
            .unwrap();
        assert_eq!(
            urls[0].as_str(),
            "https://api.provider.example/3/trending/movie?page=1"
        );
    }

    #[tokio::test]
    async fn test_resolve_node_with_inline_canonical_id() {
        let source = test_source();
        let node = json!({"id": 603, "imdb_id": "tt0133093"});
        let record = source
            .resolve_node(&node, ContentType::Movie)
            .await
            .unwrap();
        assert_eq!(record.id, "tt0133093");
        assert_eq!(record.content_type, ContentType::Movie);

        // Outcome is remembered.
        let entry = source.resolution_cache().get("603").await.unwrap();
        assert!(entry.valid);
    }

    #[tokio::test]
    async fn test_resolve_node_skips_known_invalid_ids() {
        let source = test_source();
        source.resolution_cache().insert_invalid("42").await;
        let node = json!({"id": 42, "imdb_id": "tt0000042"});
        assert!(source.resolve_node(&node, ContentType::Movie).await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_node_uses_cached_canonical_id() {
        let source = test_source();
        source
            .resolution_cache()
            .insert_valid("603", "tt0133093")
            .await;
        let node = json!({"id": 603});
        let record = source
            .resolve_node(&node, ContentType::Series)
            .await
            .unwrap();
        assert_eq!(record.id, "tt0133093");
    }

    #[test]
    fn test_supports_declared_types_only() {
        let mut source = test_source();
        source.config.content_types = vec![ContentType::Movie];
        assert!(source.supports(ContentType::Movie));
        assert!(!source.supports(ContentType::Series));
    }
}
