//! Catalog Forge Library
//!
//! A Rust library for building and serving cached content-metadata catalogs.
//! Catalogs are fetched from external providers with bounded parallelism,
//! enriched with detail records, and persisted through a diffed, chunked,
//! retrying cache store with a change audit trail. A daily scheduler keeps
//! the cache fresh.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        assert_eq!(store::PAGE_SIZE, 500);
        assert_eq!(refresh::DAILY_REBUILD_HOUR, 3);
        assert!(http::USER_AGENT.contains("CatalogForge"));
    }

    #[test]
    fn test_error_types() {
        let store_error = errors::StoreError::RetriesExhausted {
            table: "catalogs".to_string(),
            attempts: 3,
        };
        let app_error = AppError::Store(store_error);

        assert_eq!(app_error.category(), "store");
        assert!(!app_error.is_recoverable());
    }
}
