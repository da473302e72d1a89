//! Key/value cache layer with diffed writes, pagination, chunking, and retry
//!
//! `CacheStore` fronts a [`StoreBackend`] with per-table in-memory mirrors.
//! Reads are paginated (concurrently when the backend can count rows up
//! front), writes are diffed against the mirror so unchanged entries are
//! never rewritten, changed entries go out in bounded chunks with capped
//! exponential backoff, and every confirmed write leaves a [`ChangeRecord`]
//! in the append-only `changes` table.
//!
//! Mirrors are handed out as cheap `Arc` snapshots: the refresh task swaps a
//! new snapshot in after a write while readers keep whatever snapshot they
//! already hold. A reader may observe a mirror mid-refresh across two tables;
//! that staleness is accepted for catalog data. Rows absent from an upsert
//! candidate are audited as deleted but never physically removed.

pub mod backend;
pub mod file;
pub mod memory;

pub use backend::{Row, StoreBackend};
pub use file::FileBackend;
pub use memory::MemoryBackend;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::app::models::ChangeRecord;
use crate::app::scheduler;
use crate::constants::store as store_constants;
use crate::errors::{StoreError, StoreResult};

/// Tuning knobs for the store's read and write policy
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Fixed page size for paginated reads
    pub page_size: usize,
    /// Maximum rows per physical write chunk
    pub chunk_size: usize,
    /// Attempts per chunk before the write call fails
    pub write_max_attempts: u32,
    /// Base backoff delay, doubled after each failed attempt
    pub write_base_delay: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            page_size: store_constants::PAGE_SIZE,
            chunk_size: store_constants::CHUNK_SIZE,
            write_max_attempts: store_constants::WRITE_MAX_ATTEMPTS,
            write_base_delay: Duration::from_millis(store_constants::WRITE_BASE_DELAY_MS),
        }
    }
}

/// Table snapshot handed to readers
pub type TableSnapshot = Arc<HashMap<String, Value>>;

/// Cache store with diffed writes and per-table mirrors
pub struct CacheStore {
    backend: Arc<dyn StoreBackend>,
    config: StoreConfig,
    mirrors: RwLock<HashMap<String, TableSnapshot>>,
    change_seq: AtomicU64,
}

impl CacheStore {
    /// Create a store over `backend` with default policy
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self::with_config(backend, StoreConfig::default())
    }

    /// Create a store with a custom policy
    pub fn with_config(backend: Arc<dyn StoreBackend>, config: StoreConfig) -> Self {
        info!(backend = backend.name(), "cache store initialized");
        Self {
            backend,
            config,
            mirrors: RwLock::new(HashMap::new()),
            change_seq: AtomicU64::new(0),
        }
    }

    /// Current mirror snapshot for a table (empty if never loaded)
    pub async fn snapshot(&self, table: &str) -> TableSnapshot {
        self.mirrors
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    async fn swap_mirror(&self, table: &str, rows: HashMap<String, Value>) -> TableSnapshot {
        let snapshot: TableSnapshot = Arc::new(rows);
        self.mirrors
            .write()
            .await
            .insert(table.to_string(), Arc::clone(&snapshot));
        snapshot
    }

    /// Read a whole table, page by page, and refresh its mirror
    ///
    /// When the backend can count rows up front the pages are fetched
    /// concurrently through the work scheduler; otherwise pages are fetched
    /// sequentially until a short page signals end-of-data.
    pub async fn read_all(&self, table: &str) -> StoreResult<TableSnapshot> {
        let page_size = self.config.page_size;
        let mut rows: HashMap<String, Value> = HashMap::new();

        match self.backend.count(table).await? {
            Some(0) => {}
            Some(count) => {
                let pages = count.div_ceil(page_size);
                let backend = Arc::clone(&self.backend);
                let table_name = table.to_string();
                let results = scheduler::run_ordered(
                    (0..pages).collect::<Vec<usize>>(),
                    None,
                    move |page, _| {
                        let backend = Arc::clone(&backend);
                        let table = table_name.clone();
                        async move { backend.read_page(&table, page, page_size).await }
                    },
                )
                .await;

                for slot in results {
                    let page_rows = slot.map_err(|failure| StoreError::ReadFailed {
                        table: table.to_string(),
                        reason: failure.to_string(),
                    })?;
                    rows.extend(page_rows.into_iter().map(|r| (r.key, r.value)));
                }
            }
            None => {
                let mut page = 0usize;
                loop {
                    let page_rows = self.backend.read_page(table, page, page_size).await?;
                    let short = page_rows.len() < page_size;
                    rows.extend(page_rows.into_iter().map(|r| (r.key, r.value)));
                    if short {
                        break;
                    }
                    page += 1;
                }
            }
        }

        debug!(table, rows = rows.len(), "table read complete");
        Ok(self.swap_mirror(table, rows).await)
    }

    /// Read a subset of keys, hydrating mirror misses from the backend
    pub async fn read_keys(
        &self,
        table: &str,
        keys: &[String],
    ) -> StoreResult<HashMap<String, Value>> {
        let snapshot = self.snapshot(table).await;
        let mut found: HashMap<String, Value> = HashMap::new();
        let mut missing: Vec<String> = Vec::new();

        for key in keys {
            match snapshot.get(key) {
                Some(value) => {
                    found.insert(key.clone(), value.clone());
                }
                None => missing.push(key.clone()),
            }
        }

        if !missing.is_empty() {
            let fetched = self.backend.read_rows(table, &missing).await?;
            if !fetched.is_empty() {
                // Copy-on-write merge so concurrent readers keep their snapshot.
                let mut merged: HashMap<String, Value> = (*snapshot).clone();
                for row in fetched {
                    found.insert(row.key.clone(), row.value.clone());
                    merged.insert(row.key, row.value);
                }
                self.swap_mirror(table, merged).await;
            }
        }

        Ok(found)
    }

    /// Diff `candidate` against the table mirror and persist the difference
    ///
    /// Only inserted and updated entries are physically written, in chunks of
    /// at most `chunk_size` rows; each chunk is retried with exponential
    /// backoff before the call fails. Keys missing from the candidate are
    /// reported as deleted in the returned [`ChangeRecord`] without a
    /// physical delete. The mirror reflects the candidate when this call
    /// returns, on success and on partial-chunk failure alike; chunks written
    /// before a failing one stay committed.
    pub async fn upsert_diff(
        &self,
        table: &str,
        candidate: HashMap<String, Value>,
    ) -> StoreResult<ChangeRecord> {
        let snapshot = self.snapshot(table).await;

        let mut inserted_keys: Vec<String> = Vec::new();
        let mut updated_keys: Vec<String> = Vec::new();
        for (key, value) in &candidate {
            match snapshot.get(key) {
                None => inserted_keys.push(key.clone()),
                Some(existing) if existing != value => updated_keys.push(key.clone()),
                Some(_) => {}
            }
        }
        let mut deleted_keys: Vec<String> = snapshot
            .keys()
            .filter(|k| !candidate.contains_key(*k))
            .cloned()
            .collect();
        inserted_keys.sort();
        updated_keys.sort();
        deleted_keys.sort();

        let mut changed: Vec<Row> = inserted_keys
            .iter()
            .chain(updated_keys.iter())
            .map(|k| Row::new(k.clone(), candidate[k].clone()))
            .collect();
        changed.sort_by(|a, b| a.key.cmp(&b.key));

        debug!(
            table,
            inserted = inserted_keys.len(),
            updated = updated_keys.len(),
            deleted = deleted_keys.len(),
            skipped = candidate.len() - inserted_keys.len() - updated_keys.len(),
            "upsert diff computed"
        );

        let mut write_result: StoreResult<()> = Ok(());
        for chunk in changed.chunks(self.config.chunk_size) {
            if let Err(e) = self.write_chunk_with_retry(table, chunk).await {
                write_result = Err(e);
                break;
            }
        }

        // The mirror reflects the attempted candidate even when a chunk
        // failed; the backend keeps whatever chunks landed before it.
        self.swap_mirror(table, candidate).await;
        write_result?;

        let record = ChangeRecord {
            table: table.to_string(),
            inserted_keys,
            updated_keys,
            deleted_keys,
            timestamp: Utc::now(),
        };
        if !record.is_empty() {
            self.append_change(&record).await;
        }
        Ok(record)
    }

    async fn write_chunk_with_retry(&self, table: &str, chunk: &[Row]) -> StoreResult<()> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.backend.write_rows(table, chunk).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.config.write_max_attempts => {
                    let delay = self.config.write_base_delay * 2u32.pow(attempt - 1);
                    warn!(
                        table,
                        attempt,
                        max = self.config.write_max_attempts,
                        error = %e,
                        "chunk write failed, backing off for {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(table, attempts = attempt, error = %e, "chunk write exhausted retries");
                    return Err(StoreError::RetriesExhausted {
                        table: table.to_string(),
                        attempts: attempt,
                    });
                }
            }
        }
    }

    /// Append a confirmed change to the audit table
    ///
    /// Audit rows are best-effort: a failed append is logged, never raised,
    /// so a successful data write is not reported as failed.
    async fn append_change(&self, record: &ChangeRecord) {
        let seq = self.change_seq.fetch_add(1, Ordering::SeqCst);
        let key = format!(
            "{:013}.{:04}.{}",
            record.timestamp.timestamp_millis(),
            seq,
            record.table
        );
        let value = match serde_json::to_value(record) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "change record serialization failed");
                return;
            }
        };
        if let Err(e) = self
            .backend
            .write_rows(store_constants::CHANGES_TABLE, &[Row::new(key, value)])
            .await
        {
            warn!(error = %e, "change record append failed");
        }
    }

    /// Recent audit rows, newest first
    pub async fn recent_changes(&self) -> StoreResult<Vec<ChangeRecord>> {
        let snapshot = self.read_all(store_constants::CHANGES_TABLE).await?;
        let mut keyed: Vec<(String, ChangeRecord)> = snapshot
            .iter()
            .filter_map(|(key, value)| {
                serde_json::from_value::<ChangeRecord>(value.clone())
                    .ok()
                    .map(|record| (key.clone(), record))
            })
            .collect();
        keyed.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(keyed.into_iter().map(|(_, record)| record).collect())
    }
}
