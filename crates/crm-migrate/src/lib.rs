//! # crm-migrate
//!
//! Batch reconciliation engine for moving CRM records (contacts, companies,
//! leads, deals, notes, tasks, calls) from Zendesk Sell into HubSpot.
//!
//! The library provides:
//!
//! - **Paginated extraction** of source records into a local JSON cache
//! - **Idempotent upserts**: records are matched against the destination by
//!   natural key and against the checkpoint ledger before anything is written
//! - **Association resolution** through id-correlation tables, with records
//!   missing a mandatory target diverted to a side ledger
//! - **Concurrent batches** with exponential backoff under rate limiting
//! - **Checkpointing** of every written object so re-runs never duplicate work
//!
//! ## Example
//!
//! ```rust,no_run
//! use crm_migrate::{Config, ObjectType, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> crm_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config)?;
//!     orchestrator.extract(ObjectType::Contact, false).await?;
//!     let result = orchestrator.migrate(ObjectType::Contact, 0, None, 100).await?;
//!     println!("{} created, {} updated", result.created, result.updated);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod mapping;
pub mod migrator;
pub mod object_type;
pub mod orchestrator;
pub mod record;
pub mod resolver;
pub mod retry;
pub mod store;

// Re-exports for convenient access
pub use api::{DestinationApi, HubSpotClient, SellClient, SourceApi};
pub use config::{Config, DestinationConfig, MigrationConfig, SourceConfig};
pub use error::{MigrateError, Result};
pub use mapping::MappingTables;
pub use migrator::{BatchRange, BatchResult, BatchStatus, Migrator};
pub use object_type::ObjectType;
pub use orchestrator::{split_range, ExtractionReport, MigrationResult, Orchestrator, StatusReport};
pub use record::{Action, ReconciledRecord, SourceId, SourceRecord};
pub use retry::RetryPolicy;
pub use store::{CheckpointAction, CheckpointEntry, FileLedgerStore, Ledger, LedgerStore, MemoryLedgerStore};
