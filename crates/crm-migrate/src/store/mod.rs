//! Durable ledgers: the source record cache, the checkpoint ledger and the
//! no-core-object side ledger.
//!
//! The checkpoint ledger is what makes repeated runs idempotent: a record
//! with an entry here is always classified as an update on later runs.

mod backend;
mod file;
mod memory;

pub use backend::LedgerStore;
pub use file::FileLedgerStore;
pub use memory::MemoryLedgerStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::error::Result;
use crate::object_type::ObjectType;
use crate::record::{deserialize_destination_id, SourceId, SourceRecord};

/// Outcome recorded for a migrated record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointAction {
    #[default]
    Created,
    Updated,
}

/// One successfully migrated record. Appended, never mutated.
///
/// Older ledgers hold bare `{zendeskID, hubID}` pairs; those read back as
/// `created` entries stamped with the epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointEntry {
    #[serde(alias = "zendeskID")]
    pub source_id: SourceId,
    #[serde(alias = "hubID", deserialize_with = "deserialize_destination_id")]
    pub destination_id: String,
    #[serde(default)]
    pub action: CheckpointAction,
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
}

impl CheckpointEntry {
    pub fn new(source_id: SourceId, destination_id: impl Into<String>, action: CheckpointAction) -> Self {
        Self {
            source_id,
            destination_id: destination_id.into(),
            action,
            timestamp: Utc::now(),
        }
    }
}

/// Typed access to the per-object-type ledgers on top of a [`LedgerStore`].
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Cached source records for an object type, envelopes unwrapped.
    pub async fn load_records(&self, object_type: ObjectType) -> Result<Vec<SourceRecord>> {
        let items = self.store.load(&object_type.data_key()).await?;
        let total = items.len();
        let records: Vec<SourceRecord> = items.into_iter().filter_map(SourceRecord::from_item).collect();
        if records.len() != total {
            warn!(
                object = %object_type,
                skipped = total - records.len(),
                "Ignoring cached items that are not JSON objects"
            );
        }
        Ok(records)
    }

    pub async fn append_records(&self, object_type: ObjectType, items: Vec<Value>) -> Result<()> {
        self.store.append(&object_type.data_key(), items).await
    }

    pub async fn count_records(&self, object_type: ObjectType) -> Result<usize> {
        self.store.count(&object_type.data_key()).await
    }

    pub async fn reset_records(&self, object_type: ObjectType) -> Result<()> {
        self.store.reset(&object_type.data_key()).await
    }

    /// Every checkpoint recorded so far for an object type.
    pub async fn load_checkpoints(&self, object_type: ObjectType) -> Result<Vec<CheckpointEntry>> {
        let raw = self.store.load(&object_type.migrated_key()).await?;
        let mut entries = Vec::with_capacity(raw.len());
        for value in raw {
            match serde_json::from_value::<CheckpointEntry>(value) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(object = %object_type, "Skipping malformed checkpoint entry: {}", e),
            }
        }
        Ok(entries)
    }

    pub async fn append_checkpoints(
        &self,
        object_type: ObjectType,
        entries: &[CheckpointEntry],
    ) -> Result<()> {
        let values = entries
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.store.append(&object_type.migrated_key(), values).await
    }

    pub async fn count_checkpoints(&self, object_type: ObjectType) -> Result<usize> {
        self.store.count(&object_type.migrated_key()).await
    }

    /// Record source records whose mandatory association could not be
    /// resolved. Ids already waiting are not recorded twice. Returns how many
    /// records were added.
    pub async fn append_diverted(&self, object_type: ObjectType, records: &[SourceRecord]) -> Result<usize> {
        let values = records
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.store.append_unique(&object_type.no_core_object_key(), values).await
    }

    pub async fn load_diverted(&self, object_type: ObjectType) -> Result<Vec<SourceRecord>> {
        let items = self.store.load(&object_type.no_core_object_key()).await?;
        Ok(items.into_iter().filter_map(SourceRecord::from_item).collect())
    }

    pub async fn count_diverted(&self, object_type: ObjectType) -> Result<usize> {
        self.store.count(&object_type.no_core_object_key()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(MemoryLedgerStore::new()))
    }

    #[test]
    fn test_checkpoint_json_shape() {
        let entry = CheckpointEntry::new(SourceId::from(12), "901", CheckpointAction::Created);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["sourceId"], json!("12"));
        assert_eq!(value["destinationId"], json!("901"));
        assert_eq!(value["action"], json!("created"));
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_checkpoint_accepts_numeric_ids() {
        let entry: CheckpointEntry = serde_json::from_value(json!({
            "sourceId": 12,
            "destinationId": 901,
            "action": "updated",
            "timestamp": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(entry.source_id, SourceId::from(12));
        assert_eq!(entry.destination_id, "901");
        assert_eq!(entry.action, CheckpointAction::Updated);
    }

    #[tokio::test]
    async fn test_checkpoint_round_trip_through_ledger() {
        let ledger = ledger();
        let entries = vec![
            CheckpointEntry::new(SourceId::from(1), "a", CheckpointAction::Created),
            CheckpointEntry::new(SourceId::from(2), "b", CheckpointAction::Updated),
        ];
        ledger.append_checkpoints(ObjectType::Deal, &entries).await.unwrap();

        let loaded = ledger.load_checkpoints(ObjectType::Deal).await.unwrap();
        assert_eq!(loaded, entries);
        assert_eq!(ledger.count_checkpoints(ObjectType::Contact).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_legacy_checkpoint_pairs_load() {
        let store = Arc::new(MemoryLedgerStore::new());
        store
            .append(
                "contacts_migrated",
                vec![
                    json!({"zendeskID": 42, "hubID": 9001}),
                    json!({"zendeskID": "43", "hubID": "9002"}),
                ],
            )
            .await
            .unwrap();
        let ledger = Ledger::new(store);

        let loaded = ledger.load_checkpoints(ObjectType::Contact).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].source_id, SourceId::from(42));
        assert_eq!(loaded[0].destination_id, "9001");
        assert_eq!(loaded[0].action, CheckpointAction::Created);
        assert_eq!(loaded[1].source_id, SourceId::from(43));
        assert_eq!(loaded[1].destination_id, "9002");
    }

    #[tokio::test]
    async fn test_diverted_ids_recorded_once() {
        let ledger = ledger();
        let note = |id: u64| SourceRecord::from_item(json!({"id": id, "content": "x"})).unwrap();

        let added = ledger
            .append_diverted(ObjectType::Note, &[note(1), note(2), note(1)])
            .await
            .unwrap();
        assert_eq!(added, 2);
        let added = ledger
            .append_diverted(ObjectType::Note, &[note(2), note(3)])
            .await
            .unwrap();
        assert_eq!(added, 1);
        assert_eq!(ledger.count_diverted(ObjectType::Note).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_malformed_checkpoints_skipped() {
        let store = Arc::new(MemoryLedgerStore::new());
        store
            .append("calls_migrated", vec![json!({"garbage": true})])
            .await
            .unwrap();
        let ledger = Ledger::new(store);
        assert!(ledger.load_checkpoints(ObjectType::Call).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_records_unwrapped_from_cache() {
        let ledger = ledger();
        ledger
            .append_records(
                ObjectType::Lead,
                vec![json!({"data": {"id": 3}, "meta": {}}), json!("junk")],
            )
            .await
            .unwrap();
        let records = ledger.load_records(ObjectType::Lead).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), Some(SourceId::from(3)));
    }
}
