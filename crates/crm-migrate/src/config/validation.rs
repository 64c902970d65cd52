//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Largest batch the destination batch endpoints accept.
pub const MAX_BATCH_SIZE: usize = 100;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.base_url.is_empty() {
        return Err(MigrateError::Config("source.base_url is required".into()));
    }
    if config.source.access_token.is_empty() {
        return Err(MigrateError::Config(
            "source.access_token is required (or set SOURCE_ACCESS_TOKEN)".into(),
        ));
    }
    if config.source.per_page == 0 || config.source.per_page > MAX_BATCH_SIZE {
        return Err(MigrateError::Config(format!(
            "source.per_page must be between 1 and {}, got {}",
            MAX_BATCH_SIZE, config.source.per_page
        )));
    }

    // Destination validation
    if config.destination.base_url.is_empty() {
        return Err(MigrateError::Config(
            "destination.base_url is required".into(),
        ));
    }
    if config.destination.access_token.is_empty() {
        return Err(MigrateError::Config(
            "destination.access_token is required (or set DESTINATION_ACCESS_TOKEN)".into(),
        ));
    }

    if config.source.base_url == config.destination.base_url {
        return Err(MigrateError::Config(
            "source and destination cannot be the same API".into(),
        ));
    }

    // Migration config validation
    if config.migration.batch_size == 0 || config.migration.batch_size > MAX_BATCH_SIZE {
        return Err(MigrateError::Config(format!(
            "migration.batch_size must be between 1 and {}, got {}",
            MAX_BATCH_SIZE, config.migration.batch_size
        )));
    }
    if config.migration.max_retries == 0 {
        return Err(MigrateError::Config(
            "migration.max_retries must be at least 1".into(),
        ));
    }
    if let Some(0) = config.migration.max_concurrent_batches {
        return Err(MigrateError::Config(
            "migration.max_concurrent_batches must be at least 1".into(),
        ));
    }

    Ok(())
}

/// Clamp an operator-entered batch size the way the prompt flow does:
/// zero or anything above the endpoint limit falls back to the limit.
pub fn clamp_batch_size(requested: usize) -> usize {
    if requested == 0 || requested > MAX_BATCH_SIZE {
        MAX_BATCH_SIZE
    } else {
        requested
    }
}
