//! Backend seam for the cache store
//!
//! A backend is a set of named tables, each mapping a string key to a JSON
//! value. Backends differ in shape (embedded map, JSON files, a document
//! database) but all expose the same paged-read / chunked-write surface, so
//! the store's diffing and retry policy stays backend-agnostic.
//!
//! There is deliberately no delete operation: rows absent from an upsert
//! candidate are recorded in the audit log only.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::StoreResult;

/// One persisted row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Row key, unique within its table
    pub key: String,
    /// Serialized value
    pub value: Value,
}

impl Row {
    /// Convenience constructor
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Abstract key/value persistence for one process
///
/// Implementations must order rows stably by key so that repeated paged reads
/// see a consistent sequence. A `write_rows` call is one physical chunk; the
/// store bounds chunk sizes and retries failed chunks.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Human-readable backend name for logging
    fn name(&self) -> &'static str;

    /// Row count probe for a table
    ///
    /// Returns `None` when the backend cannot count cheaply; the store then
    /// falls back to sequential paging.
    async fn count(&self, table: &str) -> StoreResult<Option<usize>>;

    /// Read one page of rows in stable key order
    ///
    /// A page shorter than `page_size` signals end-of-data.
    async fn read_page(&self, table: &str, page: usize, page_size: usize)
        -> StoreResult<Vec<Row>>;

    /// Read specific rows; missing keys are silently absent from the result
    async fn read_rows(&self, table: &str, keys: &[String]) -> StoreResult<Vec<Row>>;

    /// Write one chunk of rows (insert or overwrite)
    async fn write_rows(&self, table: &str, rows: &[Row]) -> StoreResult<()>;
}
