//! In-memory store backend
//!
//! The default backend for tests and single-process deployments. Tables are
//! ordered maps so paged reads are stable. Fault injection lets tests
//! exercise the store's chunk retry and partial-failure paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::{StoreError, StoreResult};

use super::backend::{Row, StoreBackend};

/// In-memory backend with optional fault injection
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, BTreeMap<String, serde_json::Value>>>,
    /// Number of upcoming `write_rows` calls that will fail
    fail_next_writes: AtomicU32,
    /// Write calls to let through before the injected failures start
    skip_before_failing: AtomicU32,
    /// Total `write_rows` calls observed
    write_calls: AtomicU64,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` write calls fail with a synthetic error
    pub fn fail_next_writes(&self, n: u32) {
        self.skip_before_failing.store(0, Ordering::SeqCst);
        self.fail_next_writes.store(n, Ordering::SeqCst);
    }

    /// Let `skip` write calls through, then fail the following `n`
    pub fn fail_writes_after(&self, skip: u32, n: u32) {
        self.skip_before_failing.store(skip, Ordering::SeqCst);
        self.fail_next_writes.store(n, Ordering::SeqCst);
    }

    /// Number of `write_rows` calls seen so far
    pub fn write_call_count(&self) -> u64 {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Direct table peek for assertions
    pub async fn table_snapshot(&self, table: &str) -> BTreeMap<String, serde_json::Value> {
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn count(&self, table: &str) -> StoreResult<Option<usize>> {
        let tables = self.tables.read().await;
        Ok(Some(tables.get(table).map_or(0, |t| t.len())))
    }

    async fn read_page(
        &self,
        table: &str,
        page: usize,
        page_size: usize,
    ) -> StoreResult<Vec<Row>> {
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .iter()
            .skip(page * page_size)
            .take(page_size)
            .map(|(k, v)| Row::new(k.clone(), v.clone()))
            .collect())
    }

    async fn read_rows(&self, table: &str, keys: &[String]) -> StoreResult<Vec<Row>> {
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(keys
            .iter()
            .filter_map(|k| rows.get(k).map(|v| Row::new(k.clone(), v.clone())))
            .collect())
    }

    async fn write_rows(&self, table: &str, rows: &[Row]) -> StoreResult<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);

        let skip = self.skip_before_failing.load(Ordering::SeqCst);
        if skip > 0 {
            self.skip_before_failing.store(skip - 1, Ordering::SeqCst);
        } else {
            let pending = self.fail_next_writes.load(Ordering::SeqCst);
            if pending > 0 {
                self.fail_next_writes.store(pending - 1, Ordering::SeqCst);
                return Err(StoreError::WriteFailed {
                    table: table.to_string(),
                    reason: "injected fault".to_string(),
                });
            }
        }

        let mut tables = self.tables.write().await;
        let entry = tables.entry(table.to_string()).or_default();
        for row in rows {
            entry.insert(row.key.clone(), row.value.clone());
        }
        Ok(())
    }
}
