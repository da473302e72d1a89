//! JSON-file store backend
//!
//! Persists each table as one pretty-printed JSON object file under a root
//! directory, written atomically via a temp file + rename. Suitable for
//! single-writer deployments where the daily build is the only mutator.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::StoreResult;

use super::backend::{Row, StoreBackend};

/// One-JSON-file-per-table backend
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    // Serializes read-modify-write cycles on the table files.
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Create a backend rooted at `root`, creating the directory if needed
    pub async fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.json"))
    }

    async fn load_table(&self, table: &str) -> StoreResult<BTreeMap<String, serde_json::Value>> {
        let path = self.table_path(table);
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_table(
        &self,
        table: &str,
        rows: &BTreeMap<String, serde_json::Value>,
    ) -> StoreResult<()> {
        let path = self.table_path(table);
        let tmp = self.root.join(format!("{table}.json.tmp"));
        let bytes = serde_json::to_vec_pretty(rows)?;
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;
        debug!(table, rows = rows.len(), "table file saved");
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn count(&self, table: &str) -> StoreResult<Option<usize>> {
        Ok(Some(self.load_table(table).await?.len()))
    }

    async fn read_page(
        &self,
        table: &str,
        page: usize,
        page_size: usize,
    ) -> StoreResult<Vec<Row>> {
        let rows = self.load_table(table).await?;
        Ok(rows
            .iter()
            .skip(page * page_size)
            .take(page_size)
            .map(|(k, v)| Row::new(k.clone(), v.clone()))
            .collect())
    }

    async fn read_rows(&self, table: &str, keys: &[String]) -> StoreResult<Vec<Row>> {
        let rows = self.load_table(table).await?;
        Ok(keys
            .iter()
            .filter_map(|k| rows.get(k).map(|v| Row::new(k.clone(), v.clone())))
            .collect())
    }

    async fn write_rows(&self, table: &str, rows: &[Row]) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut table_rows = self.load_table(table).await?;
        for row in rows {
            table_rows.insert(row.key.clone(), row.value.clone());
        }
        self.save_table(table, &table_rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let dir = TempDir::new().unwrap();

        {
            let backend = FileBackend::new(dir.path()).await.unwrap();
            backend
                .write_rows("metas", &[Row::new("tt1", json!({"title": "Example"}))])
                .await
                .unwrap();
        }

        let backend = FileBackend::new(dir.path()).await.unwrap();
        assert_eq!(backend.count("metas").await.unwrap(), Some(1));
        let rows = backend
            .read_rows("metas", &["tt1".to_string()])
            .await
            .unwrap();
        assert_eq!(rows[0].value["title"], "Example");
    }

    #[tokio::test]
    async fn test_missing_table_reads_empty() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path()).await.unwrap();
        assert_eq!(backend.count("nope").await.unwrap(), Some(0));
        assert!(backend.read_page("nope", 0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_writes_merge_into_existing_table() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path()).await.unwrap();
        backend
            .write_rows("t", &[Row::new("a", json!(1))])
            .await
            .unwrap();
        backend
            .write_rows("t", &[Row::new("b", json!(2))])
            .await
            .unwrap();
        assert_eq!(backend.count("t").await.unwrap(), Some(2));
    }
}
