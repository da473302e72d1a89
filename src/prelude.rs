//! Prelude module for the Catalog Forge Library
//!
//! Re-exports the most commonly used items so typical integrations need a
//! single `use catalog_forge::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use catalog_forge::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let store = Arc::new(CacheStore::new(Arc::new(MemoryBackend::new())));
//!     let registry = Arc::new(SourceRegistry::new());
//!     let service = CatalogService::new(registry, store, Vec::new(), Vec::new());
//!     service.start().await?;
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential pipeline components
pub use crate::app::{
    CacheStore,
    CachedCatalogEntry,
    CatalogBuilder,
    CatalogConfig,
    CatalogItemRecord,
    CatalogService,
    ContentSource,
    ContentType,
    FilterKind,
    JsonApiSource,
    ManifestDocument,
    ManifestFragment,
    MetaClient,
    MetadataRecord,
    RefreshConfig,
    RefreshScheduler,
    SourceRegistry,
    StoreConfig,
};
pub use crate::app::store::{FileBackend, MemoryBackend, StoreBackend};

// Application configuration
pub use crate::config::AppConfig;

// Commonly used constants
pub use crate::constants::{catalog::SERVE_PAGE_SIZE, refresh::DAILY_REBUILD_HOUR};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

// Common external crate re-exports for convenience
pub use tokio;
