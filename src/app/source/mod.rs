//! Content source boundary
//!
//! A [`ContentSource`] is one external metadata provider: it turns a catalog
//! query schema into canonical item records and resolves canonical ids into
//! detail records for enrichment. The set of providers is closed and fixed
//! at startup; the builder looks them up through a [`SourceRegistry`] rather
//! than any open-ended dispatch.
//!
//! Retries, rate limiting, and per-request timeouts all live at this
//! boundary (see [`client::MetaClient`]); the build core above it never
//! retries a provider call.

pub mod client;
pub mod json_api;
pub mod resolution;

pub use client::{MetaClient, MetaClientConfig};
pub use json_api::{JsonApiSource, JsonApiSourceConfig};
pub use resolution::{ResolutionCache, ResolutionEntry};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::app::models::{CatalogItemRecord, ContentType, RawDetailRecord};
use crate::errors::ProviderResult;

/// External interface to one metadata provider
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Registry key of this provider
    fn provider_id(&self) -> &str;

    /// Whether this provider resolves items per end-user request instead of
    /// at build time
    fn on_demand(&self) -> bool {
        false
    }

    /// Whether this provider can serve the given content type
    fn supports(&self, _content_type: ContentType) -> bool {
        true
    }

    /// Fetch the catalog listing for one content type
    ///
    /// Returns canonical records in provider order. An empty result is not
    /// an error; the builder treats it as "leave the cached entry alone".
    async fn fetch_catalog(
        &self,
        schema: &str,
        content_type: ContentType,
        page_count: Option<u32>,
    ) -> ProviderResult<Vec<CatalogItemRecord>>;

    /// Fetch detail records for a batch of canonical ids
    ///
    /// Records missing a title or poster will be dropped by the caller.
    async fn fetch_details(
        &self,
        ids: &[String],
        content_type: ContentType,
    ) -> ProviderResult<Vec<RawDetailRecord>>;
}

/// Closed provider registry, built once at startup
#[derive(Default)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn ContentSource>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own id
    pub fn register(&mut self, source: Arc<dyn ContentSource>) {
        self.sources.insert(source.provider_id().to_string(), source);
    }

    /// Look up a provider by id
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn ContentSource>> {
        self.sources.get(provider_id).cloned()
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
