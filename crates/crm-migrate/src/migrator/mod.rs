//! Per-type batch reconciliation.
//!
//! Every object type shares the same six-step routine in
//! [`Migrator::migrate_batch`]:
//!
//! 1. classify records as create or update (destination passes, then the
//!    checkpoint ledger),
//! 2. build destination properties,
//! 3. resolve associations and split the batch into eligible, diverted and
//!    skipped records,
//! 4. bucket eligible records by action,
//! 5. submit the create and update lists as separate batch writes,
//! 6. checkpoint every object the destination returned.
//!
//! What differs per type lives behind [`TypeRules`]: one module per type.

mod activity;
mod call;
mod company;
mod contact;
mod deal;
mod lead;
mod note;
mod task;

pub use call::CallRules;
pub use company::CompanyRules;
pub use contact::ContactRules;
pub use deal::DealRules;
pub use lead::LeadRules;
pub use note::NoteRules;
pub use task::TaskRules;

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::api::{CreateInput, DestinationApi, DestinationObject, UpdateInput};
use crate::error::{MigrateError, Result};
use crate::mapping::{transform::is_empty_value, CodeTable, MappingTables};
use crate::object_type::ObjectType;
use crate::record::{Action, ReconciledRecord, SourceId, SourceRecord};
use crate::resolver::{
    resolve_from_checkpoints, AssociationSpec, ExistingObjectResolver, ResolutionPass,
};
use crate::retry::RetryPolicy;
use crate::store::{CheckpointAction, CheckpointEntry, Ledger};

/// Destination property for the record owner.
pub const OWNER_PROPERTY: &str = "hubspot_owner_id";

/// Outcome of steps 2 and 3 for one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Ready to submit.
    Eligible {
        properties: Map<String, Value>,
        associations: Vec<AssociationSpec>,
    },
    /// A mandatory association target has not been migrated yet.
    Diverted(String),
    /// Cannot be migrated at all.
    Skipped(String),
}

/// Where the source id of a written object is recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlation {
    /// A property seeded with the bare source id.
    Property(&'static str),
    /// A body property seeded with `"{sourceId} - {body}"`.
    BodyPrefix(&'static str),
}

impl Correlation {
    /// Seed the marker for `source_id` into freshly built properties.
    pub fn seed(&self, properties: &mut Map<String, Value>, source_id: &SourceId, body: Option<&str>) {
        match self {
            Correlation::Property(property) => {
                properties.insert((*property).to_string(), Value::String(source_id.to_string()));
            }
            Correlation::BodyPrefix(property) => {
                let body = format!("{} - {}", source_id, body.unwrap_or_default());
                properties.insert((*property).to_string(), Value::String(body));
            }
        }
    }

    /// Recover the source id from a written object.
    pub fn source_id(&self, object: &DestinationObject) -> Option<SourceId> {
        match self {
            Correlation::Property(property) => {
                object.property_text(property).and_then(|v| SourceId::parse(&v))
            }
            Correlation::BodyPrefix(property) => {
                let body = object.property_text(property)?;
                let prefix = body.split_once('-').map(|(head, _)| head).unwrap_or(&body).trim();
                if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                SourceId::parse(prefix)
            }
        }
    }
}

/// The rules that make one object type different from another.
pub trait TypeRules: Send + Sync {
    fn object_type(&self) -> ObjectType;

    /// Destination lookups run before the checkpoint pass, in order.
    fn resolution_passes(&self) -> &[ResolutionPass] {
        &[]
    }

    fn correlation(&self) -> Correlation;

    /// Build properties and associations for one record.
    fn classify(&self, record: &SourceRecord, source_id: &SourceId, tables: &MappingTables) -> Classification;
}

/// Rules for an object type.
pub fn rules_for(object_type: ObjectType, deal_closed_won_stage_id: Option<i64>) -> Box<dyn TypeRules> {
    match object_type {
        ObjectType::Contact => Box::new(ContactRules),
        ObjectType::Company => Box::new(CompanyRules),
        ObjectType::Lead => Box::new(LeadRules),
        ObjectType::Deal => Box::new(DealRules::new(deal_closed_won_stage_id)),
        ObjectType::Note => Box::new(NoteRules),
        ObjectType::Task => Box::new(TaskRules),
        ObjectType::Call => Box::new(CallRules),
    }
}

/// A `[start, end)` slice of the cached records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchRange {
    pub start: usize,
    pub end: usize,
}

impl BatchRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for BatchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Success,
    Error,
}

/// Per-record tallies for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchCounts {
    pub created: usize,
    pub updated: usize,
    pub diverted: usize,
    pub skipped: usize,
}

/// Outcome of one batch. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub range_start: usize,
    pub range_end: usize,
    pub status: BatchStatus,
    pub detail: String,
    pub counts: BatchCounts,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        self.status == BatchStatus::Success
    }
}

/// Runs [`TypeRules`] for one object type against the destination.
pub struct Migrator {
    rules: Box<dyn TypeRules>,
    destination: Arc<dyn DestinationApi>,
    ledger: Ledger,
    tables: Arc<MappingTables>,
    retry: RetryPolicy,
}

struct Prepared {
    source_id: SourceId,
    action: Action,
    destination_id: Option<String>,
    properties: Map<String, Value>,
    associations: Vec<AssociationSpec>,
}

impl Migrator {
    pub fn new(
        rules: Box<dyn TypeRules>,
        destination: Arc<dyn DestinationApi>,
        ledger: Ledger,
        tables: Arc<MappingTables>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            rules,
            destination,
            ledger,
            tables,
            retry,
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.rules.object_type()
    }

    /// Migrate one batch. Any failure aborts the batch and is reported in
    /// the result rather than returned.
    pub async fn migrate_batch(&self, range: BatchRange, records: Vec<SourceRecord>) -> BatchResult {
        let object_type = self.object_type();
        let span = info_span!("batch", object = %object_type, range_start = range.start, range_end = range.end);

        async {
            match self.try_migrate_batch(records).await {
                Ok(counts) => {
                    let detail = format!(
                        "Batch of {} {} migrated: {} created, {} updated, {} diverted, {} skipped",
                        object_type.plural(),
                        range,
                        counts.created,
                        counts.updated,
                        counts.diverted,
                        counts.skipped
                    );
                    info!("{}", detail);
                    BatchResult {
                        range_start: range.start,
                        range_end: range.end,
                        status: BatchStatus::Success,
                        detail,
                        counts,
                    }
                }
                Err(e) => {
                    let err = MigrateError::batch(range.to_string(), e.to_string());
                    error!("{} ({})", err, object_type.plural());
                    BatchResult {
                        range_start: range.start,
                        range_end: range.end,
                        status: BatchStatus::Error,
                        detail: err.to_string(),
                        counts: BatchCounts::default(),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn try_migrate_batch(&self, records: Vec<SourceRecord>) -> Result<BatchCounts> {
        let object_type = self.object_type();
        let mut counts = BatchCounts::default();

        // Step 1: classify
        let mut reconciled: Vec<ReconciledRecord> = records.into_iter().map(ReconciledRecord::new).collect();
        let resolver = ExistingObjectResolver::new(
            self.destination.as_ref(),
            self.retry,
            object_type.destination_object(),
        );
        for pass in self.rules.resolution_passes() {
            resolver.resolve(&mut reconciled, pass).await?;
        }
        let checkpoints = self.ledger.load_checkpoints(object_type).await?;
        resolve_from_checkpoints(&mut reconciled, &checkpoints);

        // Steps 2-4: build, resolve associations, partition
        let mut prepared = Vec::with_capacity(reconciled.len());
        let mut diverted = Vec::new();
        for item in reconciled {
            let Some(source_id) = item.record.id() else {
                warn!("Skipping {} without an id", object_type);
                counts.skipped += 1;
                continue;
            };
            let action = item.action.unwrap_or(Action::Create);

            match self.rules.classify(&item.record, &source_id, &self.tables) {
                Classification::Eligible {
                    properties,
                    associations,
                } => {
                    info!("The {} with source id {} will be {}d", object_type, source_id, action);
                    prepared.push(Prepared {
                        source_id,
                        action,
                        destination_id: item.destination_id,
                        properties,
                        associations,
                    });
                }
                Classification::Diverted(reason) => {
                    info!("The {} {} has no core object on the destination: {}", object_type, source_id, reason);
                    diverted.push(item.record);
                }
                Classification::Skipped(reason) => {
                    warn!("Skipping {} {}: {}", object_type, source_id, reason);
                    counts.skipped += 1;
                }
            }
        }

        counts.diverted = diverted.len();
        self.divert(object_type, diverted).await?;

        let (creates, updates): (Vec<_>, Vec<_>) =
            prepared.into_iter().partition(|p| p.action == Action::Create);

        // Steps 5-6: write and checkpoint, creates first
        if !creates.is_empty() {
            let inputs: Vec<CreateInput> = creates
                .into_iter()
                .map(|p| CreateInput {
                    properties: p.properties,
                    associations: p.associations,
                })
                .collect();
            let written = self
                .retry
                .execute(|| self.destination.batch_create(object_type.destination_object(), &inputs))
                .await?;
            counts.created = self
                .checkpoint(object_type, &written, CheckpointAction::Created, &HashMap::new())
                .await?;
        }

        if !updates.is_empty() {
            let mut by_destination = HashMap::with_capacity(updates.len());
            let mut inputs = Vec::with_capacity(updates.len());
            for p in updates {
                let Some(id) = p.destination_id else {
                    return Err(MigrateError::State(format!(
                        "{} {} is marked for update without a destination id",
                        object_type, p.source_id
                    )));
                };
                by_destination.insert(id.clone(), p.source_id);
                inputs.push(UpdateInput {
                    id,
                    properties: p.properties,
                    associations: p.associations,
                });
            }
            let written = self
                .retry
                .execute(|| self.destination.batch_update(object_type.destination_object(), &inputs))
                .await?;
            counts.updated = self
                .checkpoint(object_type, &written, CheckpointAction::Updated, &by_destination)
                .await?;
        }

        Ok(counts)
    }

    /// Append diverted records not already waiting in the side ledger.
    async fn divert(&self, object_type: ObjectType, records: Vec<SourceRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let added = self.ledger.append_diverted(object_type, &records).await?;
        debug!("Diverted {} new {}", added, object_type.plural());
        Ok(())
    }

    async fn checkpoint(
        &self,
        object_type: ObjectType,
        written: &[DestinationObject],
        action: CheckpointAction,
        by_destination: &HashMap<String, SourceId>,
    ) -> Result<usize> {
        let correlation = self.rules.correlation();
        let entries: Vec<CheckpointEntry> = written
            .iter()
            .filter_map(|object| {
                let source_id = correlation
                    .source_id(object)
                    .or_else(|| by_destination.get(&object.id).cloned());
                if source_id.is_none() {
                    warn!(
                        "Destination {} {} carries no source id marker, not checkpointed",
                        object_type, object.id
                    );
                }
                source_id.map(|id| CheckpointEntry::new(id, object.id.clone(), action))
            })
            .collect();
        self.ledger.append_checkpoints(object_type, &entries).await?;
        Ok(entries.len())
    }
}

/// Insert a property unless its value is empty.
pub(crate) fn put(properties: &mut Map<String, Value>, name: &str, value: impl Into<Value>) {
    let value = value.into();
    if !is_empty_value(&value) {
        properties.insert(name.to_string(), value);
    }
}

/// Insert the label for the code held in `field`, if both exist.
pub(crate) fn put_label(
    properties: &mut Map<String, Value>,
    name: &str,
    record: &SourceRecord,
    field: &str,
    table: &CodeTable,
) {
    if let Some(label) = record.get_source_id(field).and_then(|code| table.label(&code)) {
        put(properties, name, label.clone());
    }
}
