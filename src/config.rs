//! Configuration management for Catalog Forge
//!
//! Provides unified configuration with zero-config defaults, multi-source
//! loading (explicit path, then the platform config directory), and
//! first-run initialization of a commented config file. The TOML layer is
//! kept separate from the runtime config structs it converts into.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::models::{CatalogConfig, ContentType};
use crate::app::source::{JsonApiSource, JsonApiSourceConfig, MetaClient, MetaClientConfig};
use crate::app::store::StoreConfig;
use crate::app::RefreshConfig;
use crate::constants::{http, limits, refresh, store};
use crate::errors::{ConfigError, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Cache store settings
    pub store: StoreConfigToml,
    /// Provider HTTP client settings
    pub client: ClientConfigToml,
    /// Daily refresh settings
    pub refresh: RefreshConfigToml,
    /// Registered providers
    #[serde(default)]
    pub providers: Vec<ProviderConfigToml>,
    /// Catalog definitions, in build order
    #[serde(default)]
    pub catalogs: Vec<CatalogConfig>,
}

/// TOML-friendly store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfigToml {
    /// Data directory (None = platform data dir)
    pub data_dir: Option<PathBuf>,
    /// Rows per read page
    pub page_size: usize,
    /// Rows per write chunk
    pub chunk_size: usize,
    /// Attempts per chunk write
    pub write_max_attempts: u32,
    /// Base delay for write backoff in milliseconds
    pub write_base_delay_ms: u64,
}

impl Default for StoreConfigToml {
    fn default() -> Self {
        Self {
            data_dir: None,
            page_size: store::PAGE_SIZE,
            chunk_size: store::CHUNK_SIZE,
            write_max_attempts: store::WRITE_MAX_ATTEMPTS,
            write_base_delay_ms: store::WRITE_BASE_DELAY_MS,
        }
    }
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfigToml {
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Maximum connections per host
    pub pool_max_per_host: usize,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// Maximum retry attempts per request
    pub max_retries: u32,
    /// Base delay for request backoff in milliseconds
    pub retry_base_delay_ms: u64,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            request_timeout_secs: http::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout_secs: http::CONNECT_TIMEOUT.as_secs(),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            max_retries: limits::MAX_RETRIES,
            retry_base_delay_ms: limits::RETRY_BASE_DELAY_MS,
        }
    }
}

/// TOML-friendly refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfigToml {
    /// UTC hour of the daily rebuild (0-23)
    pub hour: u32,
    /// Attempts per scheduled run
    pub max_retries: u32,
    /// Delay between attempts in seconds
    pub retry_delay_secs: u64,
}

impl Default for RefreshConfigToml {
    fn default() -> Self {
        Self {
            hour: refresh::DAILY_REBUILD_HOUR,
            max_retries: refresh::CYCLE_MAX_RETRIES,
            retry_delay_secs: refresh::CYCLE_RETRY_DELAY.as_secs(),
        }
    }
}

/// One provider entry in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfigToml {
    /// Registry key referenced by catalogs
    pub id: String,
    /// Listing/resolve endpoint base URL
    pub base_url: String,
    /// Detail endpoint base URL
    pub detail_url: String,
    /// Pages fetched when a catalog does not say otherwise
    #[serde(default = "default_page_count")]
    pub default_page_count: u32,
    /// Provider resolves items per end-user request
    #[serde(default)]
    pub on_demand: bool,
    /// Content types the provider serves (empty = all)
    #[serde(default)]
    pub content_types: Vec<ContentType>,
}

fn default_page_count() -> u32 {
    1
}

impl AppConfig {
    /// Load configuration from file or create default
    ///
    /// An explicit path must exist; otherwise the platform config directory
    /// is probed and defaults are used when no file is present.
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = config_file_override {
            if !path.exists() {
                return Err(ConfigError::NotFound { path }.into());
            }
            return Self::load_from_file(&path).await;
        }

        match Self::find_config_file()? {
            Some(path) => {
                debug!(path = %path.display(), "loading configuration file");
                Self::load_from_file(&path).await
            }
            None => {
                debug!("no configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write a commented default config file on first run
    ///
    /// Returns the created path, or `None` when a config file already
    /// exists.
    pub async fn initialize_first_run() -> Result<Option<PathBuf>> {
        if Self::find_config_file()?.is_some() {
            return Ok(None);
        }

        let path = Self::default_config_path()?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ConfigError::Io)?;
        }
        tokio::fs::write(&path, default_config_content())
            .await
            .map_err(ConfigError::Io)?;
        info!(path = %path.display(), "default configuration created");
        Ok(Some(path))
    }

    fn find_config_file() -> Result<Option<PathBuf>> {
        let path = Self::default_config_path()?;
        Ok(path.exists().then_some(path))
    }

    /// Platform-default configuration file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_dir".to_string(),
            reason: "platform config directory unavailable".to_string(),
        })?;
        Ok(config_dir.join("catalog-forge").join("config.toml"))
    }

    /// Directory the file-backed store writes to
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.store.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir().ok_or_else(|| ConfigError::InvalidValue {
            field: "store.data_dir".to_string(),
            reason: "platform data directory unavailable".to_string(),
        })?;
        Ok(data_dir.join("catalog-forge"))
    }

    async fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(ConfigError::Io)?;
        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::InvalidFormat)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs that reference undeclared providers
    pub fn validate(&self) -> Result<()> {
        for catalog in &self.catalogs {
            if !self.providers.iter().any(|p| p.id == catalog.provider_id) {
                return Err(ConfigError::InvalidValue {
                    field: format!("catalogs.{}.provider_id", catalog.name_id),
                    reason: format!("provider '{}' is not declared", catalog.provider_id),
                }
                .into());
            }
        }
        Ok(())
    }
}

impl StoreConfigToml {
    /// Convert to runtime store configuration
    pub fn to_runtime_config(&self) -> StoreConfig {
        StoreConfig {
            page_size: self.page_size.max(1),
            chunk_size: self.chunk_size.max(1),
            write_max_attempts: self.write_max_attempts.max(1),
            write_base_delay: Duration::from_millis(self.write_base_delay_ms),
        }
    }
}

impl ClientConfigToml {
    /// Convert to runtime client configuration
    pub fn to_runtime_config(&self) -> MetaClientConfig {
        MetaClientConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            pool_max_per_host: self.pool_max_per_host,
            rate_limit_rps: self.rate_limit_rps,
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

impl RefreshConfigToml {
    /// Convert to runtime refresh configuration
    pub fn to_runtime_config(&self) -> RefreshConfig {
        RefreshConfig {
            hour: self.hour.min(23),
            max_retries: self.max_retries.max(1),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}

impl ProviderConfigToml {
    /// Instantiate the provider over a shared client
    pub fn to_source(&self, client: MetaClient) -> Result<JsonApiSource> {
        let base_url = url::Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidValue {
            field: format!("providers.{}.base_url", self.id),
            reason: e.to_string(),
        })?;
        let detail_url =
            url::Url::parse(&self.detail_url).map_err(|e| ConfigError::InvalidValue {
                field: format!("providers.{}.detail_url", self.id),
                reason: e.to_string(),
            })?;

        Ok(JsonApiSource::new(
            JsonApiSourceConfig {
                provider_id: self.id.clone(),
                base_url,
                detail_url,
                default_page_count: self.default_page_count.max(1),
                on_demand: self.on_demand,
                content_types: self.content_types.clone(),
            },
            client,
        ))
    }
}

/// Commented default config written on first run
fn default_config_content() -> String {
    format!(
        r#"# Catalog Forge Configuration
#
# Generated automatically. Edit as needed; missing sections fall back to
# the defaults shown here.

[store]
# data_dir = "/path/to/data"   # default: platform data directory
page_size = {page_size}
chunk_size = {chunk_size}
write_max_attempts = {write_attempts}
write_base_delay_ms = {write_delay}

[client]
request_timeout_secs = {request_timeout}
connect_timeout_secs = {connect_timeout}
pool_max_per_host = {pool_max}
rate_limit_rps = {rps}
max_retries = {max_retries}
retry_base_delay_ms = {retry_delay}

[refresh]
hour = {hour}
max_retries = {cycle_retries}
retry_delay_secs = {cycle_delay}

# [[providers]]
# id = "tmdb"
# base_url = "https://api.example.org/3/"
# detail_url = "https://details.example.org/"
# default_page_count = 2

# [[catalogs]]
# name_id = "action.movies"
# provider_id = "tmdb"
# content_types = ["movie"]
# query_schema = "discover/$type?with_genres=28"
# filter_kind = "categories"
# ttl = "1day"
"#,
        page_size = store::PAGE_SIZE,
        chunk_size = store::CHUNK_SIZE,
        write_attempts = store::WRITE_MAX_ATTEMPTS,
        write_delay = store::WRITE_BASE_DELAY_MS,
        request_timeout = http::DEFAULT_TIMEOUT.as_secs(),
        connect_timeout = http::CONNECT_TIMEOUT.as_secs(),
        pool_max = http::POOL_MAX_PER_HOST,
        rps = limits::DEFAULT_RATE_LIMIT_RPS,
        max_retries = limits::MAX_RETRIES,
        retry_delay = limits::RETRY_BASE_DELAY_MS,
        hour = refresh::DAILY_REBUILD_HOUR,
        cycle_retries = refresh::CYCLE_MAX_RETRIES,
        cycle_delay = refresh::CYCLE_RETRY_DELAY.as_secs(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_roundtrips_through_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.store.page_size, store::PAGE_SIZE);
        assert_eq!(parsed.refresh.hour, refresh::DAILY_REBUILD_HOUR);
    }

    #[test]
    fn test_generated_default_content_parses() {
        let config: AppConfig = toml::from_str(&default_config_content()).unwrap();
        assert_eq!(config.client.max_retries, limits::MAX_RETRIES);
        assert!(config.catalogs.is_empty());
    }

    #[tokio::test]
    async fn test_load_nonexistent_override_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.toml");
        assert!(AppConfig::load(Some(path)).await.is_err());
    }

    #[tokio::test]
    async fn test_load_full_config_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(
            &path,
            r#"
[store]
page_size = 100
chunk_size = 50
write_max_attempts = 2
write_base_delay_ms = 10

[client]
request_timeout_secs = 30
connect_timeout_secs = 5
pool_max_per_host = 4
rate_limit_rps = 10
max_retries = 2
retry_base_delay_ms = 100

[refresh]
hour = 4
max_retries = 2
retry_delay_secs = 30

[[providers]]
id = "tmdb"
base_url = "https://api.example.org/3/"
detail_url = "https://details.example.org/"
default_page_count = 3

[[catalogs]]
name_id = "action.movies"
provider_id = "tmdb"
content_types = ["movie", "series"]
query_schema = "discover/$type"
filter_kind = "years"
ttl = "12h"
"#,
        )
        .await
        .unwrap();

        let config = AppConfig::load(Some(path)).await.unwrap();
        assert_eq!(config.store.to_runtime_config().page_size, 100);
        assert_eq!(config.refresh.to_runtime_config().hour, 4);
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.catalogs.len(), 1);
        assert_eq!(config.catalogs[0].content_types.len(), 2);
        assert_eq!(
            config.catalogs[0].ttl,
            std::time::Duration::from_secs(12 * 60 * 60)
        );
    }

    #[tokio::test]
    async fn test_catalog_with_undeclared_provider_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(
            &path,
            r#"
[[catalogs]]
name_id = "action.movies"
provider_id = "ghost"
content_types = ["movie"]
query_schema = "discover/$type"
"#,
        )
        .await
        .unwrap();
        assert!(AppConfig::load(Some(path)).await.is_err());
    }

    #[test]
    fn test_provider_with_bad_url_is_rejected() {
        let provider = ProviderConfigToml {
            id: "bad".to_string(),
            base_url: "not a url".to_string(),
            detail_url: "https://ok.example/".to_string(),
            default_page_count: 1,
            on_demand: false,
            content_types: Vec::new(),
        };
        let client = MetaClient::new().unwrap();
        assert!(provider.to_source(client).is_err());
    }
}
