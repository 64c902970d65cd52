//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;
pub use validation::{clamp_batch_size, MAX_BATCH_SIZE};

use crate::error::Result;
use crate::retry::RetryPolicy;
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `source.access_token`.
pub const SOURCE_TOKEN_ENV: &str = "SOURCE_ACCESS_TOKEN";

/// Environment variable overriding `destination.access_token`.
pub const DESTINATION_TOKEN_ENV: &str = "DESTINATION_ACCESS_TOKEN";

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// A `.env` file in the working directory is read first, so tokens can
    /// stay out of the YAML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        dotenvy::dotenv().ok();
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string, applying environment overrides.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        let config = config.with_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Replace tokens with values from the environment when present.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(SOURCE_TOKEN_ENV).filter(|t| !t.is_empty()) {
            self.source.access_token = token;
        }
        if let Some(token) = lookup(DESTINATION_TOKEN_ENV).filter(|t| !t.is_empty()) {
            self.destination.access_token = token;
        }
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl MigrationConfig {
    /// Backoff policy derived from the configured retry settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_delay_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
source:
  access_token: from-file
destination:
  access_token: dest-file
migration:
  batch_size: 50
  deal_closed_won_stage_id: 117603
"#;

    #[test]
    fn test_defaults_applied() {
        let config: Config = serde_yaml::from_str(YAML).unwrap();
        assert_eq!(config.source.base_url, "https://api.getbase.com");
        assert_eq!(config.destination.base_url, "https://api.hubapi.com");
        assert_eq!(config.source.per_page, 100);
        assert_eq!(config.migration.batch_size, 50);
        assert_eq!(config.migration.max_retries, 10);
        assert_eq!(config.migration.initial_delay_ms, 1000);
        assert_eq!(config.migration.deal_closed_won_stage_id, Some(117603));
        assert!(config.migration.max_concurrent_batches.is_none());
    }

    #[test]
    fn test_env_overrides_tokens() {
        let config: Config = serde_yaml::from_str(YAML).unwrap();
        let config = config.with_env_overrides(|key| match key {
            SOURCE_TOKEN_ENV => Some("from-env".to_string()),
            _ => None,
        });
        assert_eq!(config.source.access_token, "from-env");
        assert_eq!(config.destination.access_token, "dest-file");
    }

    #[test]
    fn test_empty_env_value_ignored() {
        let config: Config = serde_yaml::from_str(YAML).unwrap();
        let config = config.with_env_overrides(|_| Some(String::new()));
        assert_eq!(config.source.access_token, "from-file");
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config: Config = serde_yaml::from_str(YAML).unwrap();
        let policy = config.migration.retry_policy();
        assert_eq!(policy.max_retries(), 10);
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
    }
}
