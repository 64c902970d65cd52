//! Create-vs-update classification against the destination and the
//! checkpoint ledger.
//!
//! Passes compose: each pass only upgrades records to `update`, and a record
//! already marked `update` keeps the destination id of the earliest match.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::api::DestinationApi;
use crate::error::Result;
use crate::record::{ReconciledRecord, SourceId, SourceRecord};
use crate::retry::RetryPolicy;
use crate::store::CheckpointEntry;

/// How the natural key is derived from a source record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// The field's value, as text.
    Field(&'static str),
    /// The hostname of a URL held in the field.
    Hostname(&'static str),
}

impl KeySource {
    pub fn extract(&self, record: &SourceRecord) -> Option<String> {
        match self {
            KeySource::Field(field) => record.get_text(field).map(|s| s.trim().to_string()),
            KeySource::Hostname(field) => record.get_text(field).and_then(|url| hostname(&url)),
        }
    }
}

/// Hostname of a URL. Bare domains (`acme.com/about`) are accepted too.
pub fn hostname(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed = reqwest::Url::parse(raw).ok().filter(|u| u.has_host()).or_else(|| {
        if raw.contains("://") {
            None
        } else {
            reqwest::Url::parse(&format!("https://{}", raw)).ok()
        }
    })?;
    parsed.host_str().map(|h| h.to_lowercase())
}

/// One destination lookup: match `key` on the source side against
/// `destination_property` on the destination side.
#[derive(Debug, Clone)]
pub struct ResolutionPass {
    pub key: KeySource,
    pub destination_property: &'static str,
}

impl ResolutionPass {
    pub const fn new(key: KeySource, destination_property: &'static str) -> Self {
        Self {
            key,
            destination_property,
        }
    }
}

/// Classifies a batch against one destination collection.
pub struct ExistingObjectResolver<'a> {
    api: &'a dyn DestinationApi,
    retry: RetryPolicy,
    object: &'static str,
}

impl<'a> ExistingObjectResolver<'a> {
    pub fn new(api: &'a dyn DestinationApi, retry: RetryPolicy, object: &'static str) -> Self {
        Self { api, retry, object }
    }

    /// Run one destination pass over `records`.
    ///
    /// Records without the key are not sent. When nothing is sent, or
    /// nothing comes back, every unmatched record becomes a create.
    pub async fn resolve(&self, records: &mut [ReconciledRecord], pass: &ResolutionPass) -> Result<()> {
        let mut seen = HashSet::new();
        let keys: Vec<String> = records
            .iter()
            .filter_map(|r| pass.key.extract(&r.record))
            .filter(|k| seen.insert(k.to_lowercase()))
            .collect();

        if keys.is_empty() {
            debug!(object = self.object, property = pass.destination_property, "No lookup keys, skipping read");
            records.iter_mut().for_each(ReconciledRecord::mark_create_if_unmatched);
            return Ok(());
        }

        let existing = self
            .retry
            .execute(|| self.api.batch_read(self.object, pass.destination_property, &keys))
            .await?;

        debug!(
            object = self.object,
            property = pass.destination_property,
            requested = keys.len(),
            found = existing.len(),
            "Existing-object lookup"
        );

        let by_key: HashMap<String, &str> = existing
            .iter()
            .rev()
            .filter_map(|obj| {
                obj.property_text(pass.destination_property)
                    .map(|v| (v.trim().to_lowercase(), obj.id.as_str()))
            })
            .collect();

        for record in records.iter_mut() {
            let matched = pass
                .key
                .extract(&record.record)
                .and_then(|k| by_key.get(&k.to_lowercase()).copied());
            match matched {
                Some(id) => record.mark_update(id),
                None => record.mark_create_if_unmatched(),
            }
        }
        Ok(())
    }
}

/// Classify against the checkpoint ledger: a record with an entry is always
/// an update of the checkpointed destination object.
pub fn resolve_from_checkpoints(records: &mut [ReconciledRecord], checkpoints: &[CheckpointEntry]) {
    let mut migrated: HashMap<&SourceId, &str> = HashMap::with_capacity(checkpoints.len());
    for entry in checkpoints {
        migrated
            .entry(&entry.source_id)
            .or_insert(entry.destination_id.as_str());
    }

    for record in records.iter_mut() {
        match record.record.id().as_ref().and_then(|id| migrated.get(id)) {
            Some(destination_id) => record.mark_update(*destination_id),
            None => record.mark_create_if_unmatched(),
        }
    }
}
