//! In-memory ledger backend.
//!
//! Nothing survives the process. Used by tests and by callers that only
//! want to observe what a run would checkpoint.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::backend::{unseen_entries, LedgerStore};
use crate::error::Result;

/// Ledger store keeping every collection in a `HashMap`.
#[derive(Default)]
pub struct MemoryLedgerStore {
    ledgers: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn load(&self, key: &str) -> Result<Vec<Value>> {
        Ok(self
            .ledgers
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn append(&self, key: &str, entries: Vec<Value>) -> Result<()> {
        self.ledgers
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .extend(entries);
        Ok(())
    }

    async fn append_unique(&self, key: &str, entries: Vec<Value>) -> Result<usize> {
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers.entry(key.to_string()).or_default();
        let fresh = unseen_entries(ledger, entries);
        let added = fresh.len();
        ledger.extend(fresh);
        Ok(added)
    }

    async fn reset(&self, key: &str) -> Result<()> {
        self.ledgers.write().await.insert(key.to_string(), Vec::new());
        Ok(())
    }
}
