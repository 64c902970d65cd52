//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source CRM API configuration.
    pub source: SourceConfig,

    /// Destination CRM API configuration.
    pub destination: DestinationConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source CRM (the system records are read from).
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// API base URL (default: the Sell v2 endpoint).
    #[serde(default = "default_source_url")]
    pub base_url: String,

    /// Bearer token. May be left empty and supplied via `SOURCE_ACCESS_TOKEN`.
    #[serde(default)]
    pub access_token: String,

    /// Records per page when extracting (default: 100).
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

/// Destination CRM (the system records are written to).
#[derive(Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// API base URL (default: the HubSpot API host).
    #[serde(default = "default_destination_url")]
    pub base_url: String,

    /// Private app token. May be supplied via `DESTINATION_ACCESS_TOKEN`.
    #[serde(default)]
    pub access_token: String,
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Directory holding the cached source records and the ledgers.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory holding the static mapping tables.
    #[serde(default = "default_mappings_dir")]
    pub mappings_dir: PathBuf,

    /// Records per batch write (1..=100, default: 100).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Total attempts per remote call under rate limiting (default: 10).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds; doubles per attempt (default: 1000).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound on batches in flight at once. Unbounded when not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_batches: Option<usize>,

    /// Source stage id that means "closed won"; deals in it get a close date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_closed_won_stage_id: Option<i64>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            mappings_dir: default_mappings_dir(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_concurrent_batches: None,
            deal_closed_won_stage_id: None,
        }
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &"[REDACTED]")
            .field("per_page", &self.per_page)
            .finish()
    }
}

impl fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

// Default value functions for serde
fn default_source_url() -> String {
    "https://api.getbase.com".to_string()
}

fn default_destination_url() -> String {
    "https://api.hubapi.com".to_string()
}

fn default_per_page() -> usize {
    100
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_mappings_dir() -> PathBuf {
    PathBuf::from("mappings")
}

fn default_batch_size() -> usize {
    100
}

fn default_max_retries() -> u32 {
    10
}

fn default_initial_delay_ms() -> u64 {
    1000
}
