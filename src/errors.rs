//! Error types for Catalog Forge
//!
//! This module defines error types for all components of the application.
//! Errors are designed to be actionable and to make the transient/terminal
//! distinction explicit, since the builder absorbs transient provider
//! failures but surfaces persistence failures to its caller.

use thiserror::Error;

/// Provider boundary errors
#[derive(Error, Debug)]
pub enum ProviderError {
    /// HTTP request failed
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Server returned error status
    #[error("Provider returned HTTP {status}")]
    Status { status: u16 },

    /// Rate limit exceeded after retries
    #[error("Provider rate limit exceeded. Server responded with HTTP 429")]
    RateLimitExceeded,

    /// Server overloaded after retries
    #[error("Provider overloaded. Server responded with HTTP 503")]
    ServerOverloaded,

    /// Maximum retries exceeded
    #[error("Maximum retry attempts ({max_retries}) exceeded for provider request")]
    MaxRetriesExceeded { max_retries: u32 },

    /// Response body was not the expected JSON shape
    #[error("Unexpected provider response: {reason}")]
    UnexpectedResponse { reason: String },

    /// Invalid URL built from a catalog schema
    #[error("Invalid provider URL: {url}")]
    InvalidUrl { url: String },

    /// JSON decoding error
    #[error("JSON parsing error in provider response")]
    JsonParse(#[from] serde_json::Error),
}

/// Cache store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// A backend read failed
    #[error("Store read failed for table '{table}': {reason}")]
    ReadFailed { table: String, reason: String },

    /// A single chunk write failed (retryable)
    #[error("Store write failed for table '{table}': {reason}")]
    WriteFailed { table: String, reason: String },

    /// A chunk write exhausted its retry budget; earlier chunks stay committed
    #[error("Store write for table '{table}' exhausted {attempts} attempts")]
    RetriesExhausted { table: String, attempts: u32 },

    /// Persisted value could not be decoded
    #[error("Corrupt row '{key}' in table '{table}'")]
    CorruptRow { table: String, key: String },

    /// Backing file I/O error
    #[error("Store I/O error")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Store serialization error")]
    Json(#[from] serde_json::Error),
}

/// Catalog build errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// Config references a provider missing from the registry
    #[error("Unknown provider '{provider_id}' for catalog '{name_id}'")]
    UnknownProvider { provider_id: String, name_id: String },

    /// Provider declared for a content type it does not support
    #[error("Provider '{provider_id}' does not support content type '{content_type}'")]
    UnsupportedContentType {
        provider_id: String,
        content_type: String,
    },

    /// Persistence failed during a rebuild; the prior cached entry stands
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Whole refresh cycle failed after bounded retries
    #[error("Refresh cycle failed after {attempts} attempts: {reason}")]
    CycleFailed { attempts: u32, reason: String },
}

impl From<serde_json::Error> for BuildError {
    fn from(e: serde_json::Error) -> Self {
        Self::Store(StoreError::Json(e))
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: std::path::PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// I/O error reading configuration
    #[error("I/O error reading configuration")]
    Io(#[from] std::io::Error),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Provider boundary error
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Cache store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Catalog build error
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Provider(ProviderError::Http(_))
            | AppError::Provider(ProviderError::RateLimitExceeded)
            | AppError::Provider(ProviderError::ServerOverloaded)
            | AppError::Provider(ProviderError::Status { .. })
            | AppError::Store(StoreError::WriteFailed { .. }) => true,

            AppError::Store(StoreError::RetriesExhausted { .. })
            | AppError::Build(BuildError::UnknownProvider { .. })
            | AppError::Build(BuildError::UnsupportedContentType { .. })
            | AppError::Config(_) => false,

            _ => false,
        }
    }

    /// Get error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Provider(_) => "provider",
            AppError::Store(_) => "store",
            AppError::Build(_) => "build",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Provider result type alias
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Store result type alias
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Build result type alias
pub type BuildResult<T> = std::result::Result<T, BuildError>;
