//! HTTP client for provider interaction
//!
//! Wraps a tuned `reqwest` client with a token-bucket rate limiter and an
//! exponential-backoff retry loop. Every provider request funnels through
//! here, so the bounded per-request time limit and bounded retries the build
//! core relies on are enforced in one place.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Jitter, Quota, RateLimiter};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::app::models::{ContentType, RawDetailRecord};
use crate::constants::{http, limits};
use crate::errors::{ProviderError, ProviderResult};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Configuration for the provider HTTP client
#[derive(Debug, Clone)]
pub struct MetaClientConfig {
    /// Request timeout
    pub request_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// Maximum retry attempts per request
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub retry_base_delay: Duration,
}

impl Default for MetaClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            max_retries: limits::MAX_RETRIES,
            retry_base_delay: Duration::from_millis(limits::RETRY_BASE_DELAY_MS),
        }
    }
}

/// Rate-limited, retrying JSON client shared by all providers
#[derive(Clone)]
pub struct MetaClient {
    client: Client,
    rate_limiter: Arc<DirectRateLimiter>,
    config: MetaClientConfig,
}

impl MetaClient {
    /// Create a client with default configuration
    pub fn new() -> ProviderResult<Self> {
        Self::with_config(MetaClientConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: MetaClientConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(http::USER_AGENT)
            .pool_idle_timeout(http::POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(config.pool_max_per_host)
            .build()?;

        let rps = NonZeroU32::new(config.rate_limit_rps.max(1)).expect("max(1) is non-zero");
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    /// Fetch a URL and decode the body as JSON, with rate limiting and
    /// bounded exponential-backoff retries on 429/503 and transport errors
    pub async fn get_json(&self, url: &Url) -> ProviderResult<Value> {
        // Jitter spreads concurrent workers off the same tick.
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(
                limits::RATE_LIMIT_JITTER_MS,
            )))
            .await;

        let mut retries = 0u32;
        loop {
            match self.client.get(url.as_str()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.as_u16() == 429 || status.as_u16() == 503 {
                        if retries < self.config.max_retries {
                            retries += 1;
                            let delay = self.config.retry_base_delay * 2u32.pow(retries);
                            warn!(
                                %url,
                                status = status.as_u16(),
                                "provider throttled, backing off for {:?}",
                                delay
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        return Err(if status.as_u16() == 429 {
                            ProviderError::RateLimitExceeded
                        } else {
                            ProviderError::ServerOverloaded
                        });
                    }
                    if !status.is_success() {
                        return Err(ProviderError::Status {
                            status: status.as_u16(),
                        });
                    }
                    debug!(%url, "provider response ok");
                    return Ok(response.json::<Value>().await?);
                }
                Err(e) if retries < self.config.max_retries => {
                    retries += 1;
                    let delay = self.config.retry_base_delay * 2u32.pow(retries);
                    warn!(
                        %url,
                        attempt = retries,
                        max = self.config.max_retries,
                        error = %e,
                        "provider request failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(%url, error = %e, "provider request failed after retries");
                    return Err(ProviderError::MaxRetriesExceeded {
                        max_retries: self.config.max_retries,
                    });
                }
            }
        }
    }

    /// Bulk detail lookup against a Cinemeta-style endpoint
    ///
    /// `detail_base` is joined with
    /// `catalog/{type}/last-videos/lastVideosIds={id,..}.json`; the response
    /// carries the records under `metasDetailed`. Null entries are skipped.
    pub async fn fetch_detail_batch(
        &self,
        detail_base: &Url,
        ids: &[String],
        content_type: ContentType,
    ) -> ProviderResult<Vec<RawDetailRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let path = format!(
            "catalog/{}/last-videos/lastVideosIds={}.json",
            content_type.as_str(),
            ids.join(",")
        );
        let url = detail_base
            .join(&path)
            .map_err(|_| ProviderError::InvalidUrl {
                url: format!("{detail_base}{path}"),
            })?;

        let body = self.get_json(&url).await?;
        let metas = body
            .get("metasDetailed")
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::UnexpectedResponse {
                reason: "missing metasDetailed array".to_string(),
            })?;

        let mut records = Vec::with_capacity(metas.len());
        for meta in metas {
            if meta.is_null() {
                continue;
            }
            match serde_json::from_value::<RawDetailRecord>(meta.clone()) {
                Ok(record) if !record.id.is_empty() => records.push(record),
                Ok(_) => debug!("detail record without id skipped"),
                Err(e) => debug!(error = %e, "malformed detail record skipped"),
            }
        }
        Ok(records)
    }
}

impl std::fmt::Debug for MetaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaClient")
            .field("config", &self.config)
            .finish()
    }
}
