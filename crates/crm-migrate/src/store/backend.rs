//! Ledger backend trait for append-only JSON collections.
//!
//! The [`LedgerStore`] trait defines the interface for persisting the
//! cached source records, the checkpoint ledger and the no-core-object
//! ledger. Implementations:
//!
//! - **File**: one JSON array per key in a data directory (`file.rs`)
//! - **Memory**: process-local collections for tests and dry runs (`memory.rs`)
//!
//! The orchestrator and migrators work with `Arc<dyn LedgerStore>` without
//! knowing the concrete type.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;

use crate::error::Result;
use crate::record::{SourceId, SourceRecord};

/// Trait for ledger persistence backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` and must make concurrent
/// [`append`](LedgerStore::append) calls on the same key safe: sibling
/// batches checkpoint into the same ledger at the same time.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Load every entry stored under `key`, in append order.
    ///
    /// Returns an empty vector when nothing has been stored yet.
    async fn load(&self, key: &str) -> Result<Vec<Value>>;

    /// Append entries to the end of `key`. Existing entries are never
    /// rewritten or removed.
    async fn append(&self, key: &str, entries: Vec<Value>) -> Result<()>;

    /// Append the entries whose record id is neither stored under `key` nor
    /// repeated earlier in `entries`. The lookup and the append happen under
    /// the same write lock. Entries without an id are dropped.
    ///
    /// Returns the number of entries appended.
    async fn append_unique(&self, key: &str, entries: Vec<Value>) -> Result<usize>;

    /// Number of entries stored under `key`.
    async fn count(&self, key: &str) -> Result<usize> {
        Ok(self.load(key).await?.len())
    }

    /// Replace the collection under `key` with an empty one.
    ///
    /// Only used for the source record cache before a fresh extraction.
    async fn reset(&self, key: &str) -> Result<()>;
}

fn entry_id(entry: &Value) -> Option<SourceId> {
    SourceRecord::from_item(entry.clone())?.id()
}

/// The part of `entries` that [`LedgerStore::append_unique`] keeps.
pub(crate) fn unseen_entries(existing: &[Value], entries: Vec<Value>) -> Vec<Value> {
    let mut seen: HashSet<SourceId> = existing.iter().filter_map(entry_id).collect();
    entries
        .into_iter()
        .filter(|entry| entry_id(entry).is_some_and(|id| seen.insert(id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unseen_entries_skips_stored_and_repeated_ids() {
        let existing = vec![json!({"data": {"id": 1}, "meta": {}})];
        let kept = unseen_entries(
            &existing,
            vec![
                json!({"id": 1}),
                json!({"id": 2, "n": "first"}),
                json!({"id": "2", "n": "second"}),
                json!({"n": "no id"}),
                json!({"id": 3}),
            ],
        );
        assert_eq!(kept, vec![json!({"id": 2, "n": "first"}), json!({"id": 3})]);
    }
}
