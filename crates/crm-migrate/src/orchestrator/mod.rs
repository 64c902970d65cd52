//! Migration orchestrator - main workflow coordinator.
//!
//! Owns the API clients, the ledger and the mapping tables, and drives the
//! three operator workflows: extraction into the local cache, batched
//! migration of a cached range, and status reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::api::{DestinationApi, HubSpotClient, SellClient, SourceApi};
use crate::config::{clamp_batch_size, Config};
use crate::error::{MigrateError, Result};
use crate::mapping::MappingTables;
use crate::migrator::{rules_for, BatchCounts, BatchRange, BatchResult, BatchStatus, Migrator};
use crate::object_type::ObjectType;
use crate::record::SourceRecord;
use crate::store::{FileLedgerStore, Ledger, LedgerStore};

/// Consecutive failed pages after which extraction gives up.
pub const MAX_CONSECUTIVE_PAGE_FAILURES: usize = 3;

/// Split `[init, end)` into consecutive ranges of `batch_size`. The last
/// range may be shorter.
pub fn split_range(init: usize, end: usize, batch_size: usize) -> Vec<BatchRange> {
    let batch_size = batch_size.max(1);
    (init..end)
        .step_by(batch_size)
        .map(|start| BatchRange::new(start, (start + batch_size).min(end)))
        .collect()
}

/// Drop records whose id already appeared earlier in the cache. Records
/// without an id are kept. Returns the number dropped.
fn dedupe_by_id(records: &mut Vec<SourceRecord>) -> usize {
    let before = records.len();
    let mut seen = HashSet::new();
    records.retain(|record| record.id().map_or(true, |id| seen.insert(id)));
    before - records.len()
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    pub object_type: ObjectType,

    /// Final status.
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    pub batches_total: usize,
    pub batches_failed: usize,

    pub created: usize,
    pub updated: usize,
    pub diverted: usize,
    pub skipped: usize,

    /// Per-batch outcomes, in range order.
    pub batches: Vec<BatchResult>,
}

impl MigrationResult {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Result of an extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub object_type: ObjectType,
    /// Pages fetched and cached.
    pub pages: usize,
    /// Records appended to the cache.
    pub records: usize,
    /// Pages that failed and were skipped.
    pub failed_pages: Vec<u32>,
    /// Records in the cache afterwards.
    pub cached_total: usize,
}

impl ExtractionReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Ledger counts for one object type.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub object_type: ObjectType,
    pub cached: usize,
    pub migrated: usize,
    pub diverted: usize,
}

impl StatusReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} cached, {} checkpointed, {} without core object",
            self.object_type.plural(),
            self.cached,
            self.migrated,
            self.diverted
        )
    }
}

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn SourceApi>,
    destination: Arc<dyn DestinationApi>,
    ledger: Ledger,
    tables: Arc<MappingTables>,
}

impl Orchestrator {
    /// Create an orchestrator talking to the configured APIs, with ledgers
    /// under `migration.data_dir` and tables from `migration.mappings_dir`.
    pub fn new(config: Config) -> Result<Self> {
        let source = SellClient::new(&config.source)?;
        let destination = HubSpotClient::new(&config.destination)?;
        let store = FileLedgerStore::new(config.migration.data_dir.clone());
        let tables = MappingTables::load(&config.migration.mappings_dir)?;
        Ok(Self::with_components(
            config,
            Arc::new(source),
            Arc::new(destination),
            Arc::new(store),
            tables,
        ))
    }

    /// Create an orchestrator from explicit collaborators.
    pub fn with_components(
        config: Config,
        source: Arc<dyn SourceApi>,
        destination: Arc<dyn DestinationApi>,
        store: Arc<dyn LedgerStore>,
        tables: MappingTables,
    ) -> Self {
        Self {
            config,
            source,
            destination,
            ledger: Ledger::new(store),
            tables: Arc::new(tables),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Page through the source and append every item to the local cache.
    ///
    /// A failing page is logged and skipped; extraction aborts after
    /// [`MAX_CONSECUTIVE_PAGE_FAILURES`] failures in a row.
    pub async fn extract(&self, object_type: ObjectType, reset: bool) -> Result<ExtractionReport> {
        let per_page = self.config.source.per_page;
        let retry = self.config.migration.retry_policy();

        if reset {
            info!("Resetting cached {}", object_type.plural());
            self.ledger.reset_records(object_type).await?;
        }

        info!("Getting the {} from the source CRM...", object_type.plural());
        let mut report = ExtractionReport {
            object_type,
            pages: 0,
            records: 0,
            failed_pages: Vec::new(),
            cached_total: 0,
        };
        let mut page: u32 = 1;
        let mut consecutive_failures = 0;

        loop {
            info!("Getting the {} from page {}", object_type.plural(), page);
            match retry.execute(|| self.source.list(object_type, page, per_page)).await {
                Ok(fetched) => {
                    consecutive_failures = 0;
                    if fetched.meta.count == 0 || fetched.items.is_empty() {
                        break;
                    }
                    report.pages += 1;
                    report.records += fetched.items.len();
                    self.ledger.append_records(object_type, fetched.items).await?;
                }
                Err(e) => {
                    error!("Error getting the data for page {}: {}", page, e);
                    report.failed_pages.push(page);
                    consecutive_failures += 1;
                    if consecutive_failures >= MAX_CONSECUTIVE_PAGE_FAILURES {
                        error!(
                            "Aborting extraction of {} after {} consecutive failed pages",
                            object_type.plural(),
                            consecutive_failures
                        );
                        return Err(e);
                    }
                }
            }
            page += 1;
        }

        report.cached_total = self.ledger.count_records(object_type).await?;
        info!(
            "Extracted {} {} from {} pages ({} cached, {} pages failed)",
            report.records,
            object_type.plural(),
            report.pages,
            report.cached_total,
            report.failed_pages.len()
        );
        Ok(report)
    }

    /// Number of cached source records.
    pub async fn count(&self, object_type: ObjectType) -> Result<usize> {
        self.ledger.count_records(object_type).await
    }

    /// Ledger counts for an object type.
    pub async fn status(&self, object_type: ObjectType) -> Result<StatusReport> {
        Ok(StatusReport {
            object_type,
            cached: self.ledger.count_records(object_type).await?,
            migrated: self.ledger.count_checkpoints(object_type).await?,
            diverted: self.ledger.count_diverted(object_type).await?,
        })
    }

    /// Migrate cached records `[start, end)` in batches of `batch_size`.
    ///
    /// `end` defaults to, and is clamped to, the number of cached records.
    /// Every batch is spawned at once; a failed batch never cancels its
    /// siblings and is reported in the result.
    pub async fn migrate(
        &self,
        object_type: ObjectType,
        start: usize,
        end: Option<usize>,
        batch_size: usize,
    ) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let batch_size = clamp_batch_size(batch_size);

        let mut records = self.ledger.load_records(object_type).await?;
        let duplicates = dedupe_by_id(&mut records);
        if duplicates > 0 {
            warn!(
                "Ignoring {} cached {} whose id appears earlier in the cache",
                duplicates,
                object_type.plural()
            );
        }
        let end = end.unwrap_or(records.len()).min(records.len());
        if start >= end {
            warn!(
                "Nothing to migrate: range [{}, {}) is empty ({} {} cached)",
                start,
                end,
                records.len(),
                object_type.plural()
            );
        }
        let ranges = split_range(start, end, batch_size);

        info!(
            "Starting migration run {}: {} {} [{}, {}) in {} batches of {}",
            run_id,
            end.saturating_sub(start),
            object_type.plural(),
            start,
            end,
            ranges.len(),
            batch_size
        );

        let migrator = Arc::new(self.migrator_for(object_type).await?);
        let semaphore = self
            .config
            .migration
            .max_concurrent_batches
            .map(|n| Arc::new(Semaphore::new(n)));

        let mut handles = Vec::with_capacity(ranges.len());
        for range in ranges {
            let batch = records[range.start..range.end].to_vec();
            let migrator = migrator.clone();
            let semaphore = semaphore.clone();
            let handle = tokio::spawn(async move {
                let _permit = match semaphore {
                    Some(s) => s.acquire_owned().await.ok(),
                    None => None,
                };
                migrator.migrate_batch(range, batch).await
            });
            handles.push((range, handle));
        }

        let mut batches = Vec::with_capacity(handles.len());
        for (range, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    let err = MigrateError::batch(range.to_string(), format!("task panicked: {}", e));
                    error!("{}", err);
                    BatchResult {
                        range_start: range.start,
                        range_end: range.end,
                        status: BatchStatus::Error,
                        detail: err.to_string(),
                        counts: BatchCounts::default(),
                    }
                }
            };
            batches.push(result);
        }

        let completed_at = Utc::now();
        let batches_failed = batches.iter().filter(|b| !b.is_success()).count();
        let status = if batches_failed == 0 {
            "completed"
        } else {
            "completed_with_errors"
        };
        let result = MigrationResult {
            run_id,
            object_type,
            status: status.to_string(),
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            started_at,
            completed_at,
            batches_total: batches.len(),
            batches_failed,
            created: batches.iter().map(|b| b.counts.created).sum(),
            updated: batches.iter().map(|b| b.counts.updated).sum(),
            diverted: batches.iter().map(|b| b.counts.diverted).sum(),
            skipped: batches.iter().map(|b| b.counts.skipped).sum(),
            batches,
        };

        info!(
            "Migration {}: {} batches ({} failed), {} created, {} updated, {} diverted in {:.1}s",
            result.status,
            result.batches_total,
            result.batches_failed,
            result.created,
            result.updated,
            result.diverted,
            result.duration_seconds
        );
        for batch in result.batches.iter().filter(|b| !b.is_success()) {
            warn!("{}", batch.detail);
        }

        Ok(result)
    }

    /// Build the migrator for a run. Core objects checkpointed by earlier
    /// runs join the static id tables as association targets.
    async fn migrator_for(&self, object_type: ObjectType) -> Result<Migrator> {
        let mut tables = MappingTables::clone(&self.tables);
        for core in [ObjectType::Company, ObjectType::Contact, ObjectType::Lead, ObjectType::Deal] {
            let checkpoints = self.ledger.load_checkpoints(core).await?;
            tables.absorb_checkpoints(core, &checkpoints);
        }

        Ok(Migrator::new(
            rules_for(object_type, self.config.migration.deal_closed_won_stage_id),
            self.destination.clone(),
            self.ledger.clone(),
            Arc::new(tables),
            self.config.migration.retry_policy(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let record = |v| SourceRecord::from_item(v).unwrap();
        let mut records = vec![
            record(json!({"id": 1, "content": "first"})),
            record(json!({"id": 2})),
            record(json!({"id": "1", "content": "second"})),
            record(json!({"content": "no id"})),
            record(json!({"content": "no id"})),
        ];
        assert_eq!(dedupe_by_id(&mut records), 1);
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].get_str("content").as_deref(), Some("first"));
        assert_eq!(records[1].id(), Some(crate::record::SourceId::from(2)));
    }

    #[test]
    fn test_split_range_partition() {
        assert_eq!(
            split_range(0, 250, 100),
            vec![
                BatchRange::new(0, 100),
                BatchRange::new(100, 200),
                BatchRange::new(200, 250)
            ]
        );
    }

    #[test]
    fn test_split_range_edges() {
        assert!(split_range(10, 10, 100).is_empty());
        assert!(split_range(20, 10, 100).is_empty());
        assert_eq!(split_range(5, 8, 0).len(), 3);
        assert_eq!(split_range(0, 100, 100), vec![BatchRange::new(0, 100)]);
    }

    #[test]
    fn test_status_display() {
        let report = StatusReport {
            object_type: ObjectType::Note,
            cached: 3,
            migrated: 2,
            diverted: 1,
        };
        assert_eq!(report.to_string(), "notes: 3 cached, 2 checkpointed, 1 without core object");
    }
}
