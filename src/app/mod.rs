//! Core application logic for Catalog Forge
//!
//! This module contains the build pipeline components: the bounded
//! work scheduler, the diffed cache store, the provider boundary, the
//! rebuild-deciding catalog builder, manifest assembly, the daily refresh
//! scheduler, and the service facade that ties them together.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use catalog_forge::app::{CatalogService, SourceRegistry};
//! use catalog_forge::app::store::{CacheStore, MemoryBackend};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(CacheStore::new(Arc::new(MemoryBackend::new())));
//! let registry = Arc::new(SourceRegistry::new());
//!
//! let service = CatalogService::new(registry, store, Vec::new(), Vec::new());
//! service.start().await?;
//! let manifest = service.build().await?;
//! println!("built {} catalogs", manifest.catalogs.len());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod manifest;
pub mod models;
pub mod refresh;
pub mod scheduler;
pub mod service;
pub mod source;
pub mod store;

// Re-export main public API
pub use builder::CatalogBuilder;
pub use manifest::{ExtraField, ManifestAssembler, ManifestDocument, ManifestFragment};
pub use models::{
    CachedCatalogEntry, CatalogConfig, CatalogItemRecord, ChangeRecord, ContentType, FilterKind,
    MetadataRecord, RawDetailRecord,
};
pub use refresh::{RefreshConfig, RefreshCycle, RefreshScheduler};
pub use scheduler::{SlotResult, WorkerFailure};
pub use service::{CatalogService, ChangeReport, TableActivity};
pub use source::{ContentSource, JsonApiSource, MetaClient, ResolutionCache, SourceRegistry};
pub use store::{CacheStore, StoreConfig};
