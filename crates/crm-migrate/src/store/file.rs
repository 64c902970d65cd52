//! File-based ledger backend.
//!
//! Every key maps to `<data_dir>/<key>.json`, a single JSON array. Appends
//! are read-modify-write cycles, serialized by an in-process lock and
//! committed with an atomic rename so a crash never leaves a truncated
//! ledger behind.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::backend::{unseen_entries, LedgerStore};
use crate::error::{MigrateError, Result};

/// JSON-array-per-key ledger stored in a directory.
pub struct FileLedgerStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileLedgerStore {
    /// Create a store rooted at `dir`. The directory is created lazily on
    /// the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    async fn read_entries(&self, path: &Path) -> Result<Vec<Value>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Value>(&content)? {
            Value::Array(entries) => Ok(entries),
            other => Err(MigrateError::State(format!(
                "{} does not hold a JSON array (found {})",
                path.display(),
                type_name(&other)
            ))),
        }
    }

    async fn write_entries(&self, path: &Path, entries: &[Value]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let content = serde_json::to_string(entries)
            .map_err(|e| MigrateError::State(format!("Failed to serialize ledger: {}", e)))?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl LedgerStore for FileLedgerStore {
    async fn load(&self, key: &str) -> Result<Vec<Value>> {
        self.read_entries(&self.path_for(key)).await
    }

    async fn append(&self, key: &str, entries: Vec<Value>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let path = self.path_for(key);
        let _guard = self.write_lock.lock().await;

        let mut existing = self.read_entries(&path).await?;
        let added = entries.len();
        existing.extend(entries);
        self.write_entries(&path, &existing).await?;

        debug!(key, added, total = existing.len(), "Appended to ledger");
        Ok(())
    }

    async fn append_unique(&self, key: &str, entries: Vec<Value>) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let path = self.path_for(key);
        let _guard = self.write_lock.lock().await;

        let mut existing = self.read_entries(&path).await?;
        let fresh = unseen_entries(&existing, entries);
        let added = fresh.len();
        if added > 0 {
            existing.extend(fresh);
            self.write_entries(&path, &existing).await?;
        }

        debug!(key, added, total = existing.len(), "Appended unique entries to ledger");
        Ok(added)
    }

    async fn reset(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        let _guard = self.write_lock.lock().await;
        self.write_entries(&path, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_key_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileLedgerStore::new(dir.path());
        assert!(store.load("contacts_migrated").await.unwrap().is_empty());
        assert_eq!(store.count("contacts_migrated").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let dir = TempDir::new().unwrap();
        let store = FileLedgerStore::new(dir.path().join("nested"));
        store.append("k", vec![json!(1), json!(2)]).await.unwrap();
        store.append("k", vec![json!(3)]).await.unwrap();

        assert_eq!(
            store.load("k").await.unwrap(),
            vec![json!(1), json!(2), json!(3)]
        );
        assert!(dir.path().join("nested").join("k.json").exists());
        assert!(!dir.path().join("nested").join("k.tmp").exists());
    }

    #[tokio::test]
    async fn test_reset_empties_ledger() {
        let dir = TempDir::new().unwrap();
        let store = FileLedgerStore::new(dir.path());
        store.append("k", vec![json!({"id": 1})]).await.unwrap();
        store.reset("k").await.unwrap();
        assert_eq!(store.count("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_ledger_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("k.json"), "{\"not\": \"an array\"}").unwrap();
        let store = FileLedgerStore::new(dir.path());
        assert!(matches!(
            store.load("k").await,
            Err(MigrateError::State(_))
        ));
        // Appending must not silently replace the corrupt file
        assert!(store.append("k", vec![json!(1)]).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_every_entry() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileLedgerStore::new(dir.path()));

        let mut handles = Vec::new();
        for batch in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let entries = (0..10).map(|i| json!(batch * 10 + i)).collect();
                store.append("shared", entries).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.count("shared").await.unwrap(), 80);
    }

    #[tokio::test]
    async fn test_concurrent_unique_appends_keep_one_entry_per_id() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileLedgerStore::new(dir.path()));

        let mut handles = Vec::new();
        for batch in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let entries = vec![json!({"id": 7, "batch": batch}), json!({"id": 7})];
                store.append_unique("calls_no_core_object", entries).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = store.load("calls_no_core_object").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["id"], json!(7));
    }
}
