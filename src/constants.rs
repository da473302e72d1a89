//! Application constants for Catalog Forge
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "CatalogForge/0.3.0 (Catalog Aggregation Service)";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(50);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 16;
}

/// Rate limiting and retry configuration
pub mod limits {
    /// Default rate limit for provider requests (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 15;

    /// Maximum retry attempts for failed provider requests
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;

    /// Maximum jitter applied before a rate-limited request (milliseconds)
    pub const RATE_LIMIT_JITTER_MS: u64 = 100;
}

/// Cache store layout and write policy
pub mod store {
    /// Fixed page size for paginated table reads
    pub const PAGE_SIZE: usize = 500;

    /// Maximum rows per physical write chunk
    pub const CHUNK_SIZE: usize = 500;

    /// Maximum attempts per write chunk before the call fails
    pub const WRITE_MAX_ATTEMPTS: u32 = 3;

    /// Base delay for chunk-write backoff (milliseconds), doubling per attempt
    pub const WRITE_BASE_DELAY_MS: u64 = 1000;

    /// Table holding cached catalog entries, keyed by composite id
    pub const CATALOGS_TABLE: &str = "catalogs";

    /// Table holding enrichment metadata, keyed by canonical id
    pub const METAS_TABLE: &str = "metas";

    /// Singleton table holding the servable manifest document
    pub const MANIFEST_TABLE: &str = "manifest";

    /// Key of the singleton manifest row
    pub const MANIFEST_KEY: &str = "manifest";

    /// Append-only audit table, one row per confirmed write
    pub const CHANGES_TABLE: &str = "changes";

    /// Suffix for per-provider id-resolution tables
    pub const IDS_TABLE_SUFFIX: &str = "_ids";
}

/// Work scheduler configuration
pub mod scheduler {
    /// Fallback worker count when available parallelism cannot be probed
    pub const FALLBACK_WORKER_COUNT: usize = 4;
}

/// Background refresh configuration
pub mod refresh {
    use super::Duration;

    /// Hour of day (local clock) at which the daily rebuild fires
    pub const DAILY_REBUILD_HOUR: u32 = 3;

    /// Maximum attempts for one refresh cycle before deferring
    pub const CYCLE_MAX_RETRIES: u32 = 3;

    /// Fixed delay between retries of a failed cycle
    pub const CYCLE_RETRY_DELAY: Duration = Duration::from_secs(60);
}

/// Catalog derivation and serving
pub mod catalog {
    /// Maximum number of year filter options exposed per catalog
    pub const MAX_YEAR_FILTERS: usize = 15;

    /// Page size for skip-based catalog pagination
    pub const SERVE_PAGE_SIZE: usize = 25;

    /// Length of the md5-derived short catalog id
    pub const SHORT_ID_LEN: usize = 5;
}

/// Addon identity advertised in the manifest document
pub mod addon {
    /// Stable addon identifier
    pub const ID: &str = "forge.catalogs";

    /// Manifest version
    pub const VERSION: &str = "0.3.0";

    /// Display name
    pub const NAME: &str = "Catalog Forge";

    /// Description shown alongside the manifest
    pub const DESCRIPTION: &str =
        "Aggregated, filterable catalogs built from external content-metadata providers";

    /// Id prefix for items served by this addon
    pub const ID_PREFIX: &str = "forge:";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_policy_constants() {
        assert!(store::PAGE_SIZE >= 500 && store::PAGE_SIZE <= 1000);
        assert_eq!(store::WRITE_MAX_ATTEMPTS, 3);
        assert_eq!(store::WRITE_BASE_DELAY_MS, 1000);
    }

    #[test]
    fn test_catalog_constants() {
        assert_eq!(catalog::MAX_YEAR_FILTERS, 15);
        assert_eq!(catalog::SERVE_PAGE_SIZE, 25);
    }

    #[test]
    fn test_refresh_window() {
        assert!(refresh::DAILY_REBUILD_HOUR < 24);
        assert_eq!(refresh::CYCLE_MAX_RETRIES, 3);
    }
}
