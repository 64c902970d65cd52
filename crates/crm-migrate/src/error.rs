//! Error types for the migration library.

use thiserror::Error;

/// HTTP status the destination and source APIs use to signal throttling.
pub const RATE_LIMIT_STATUS: u16 = 429;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote API refused the call because of rate limiting.
    #[error("Rate limited by remote API (status {status}): {body}")]
    RateLimited { status: u16, body: String },

    /// Remote API returned any other non-success status.
    #[error("Remote API error (status {status}): {body}")]
    Remote { status: u16, body: String },

    /// Transport-level HTTP failure (DNS, TLS, connection reset, decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A batch failed somewhere between classification and checkpointing.
    #[error("Batch {range} failed: {message}")]
    Batch { range: String, message: String },

    /// Ledger file error
    #[error("State file error: {0}")]
    State(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Build the error for a non-success HTTP status, separating throttling
    /// from every other remote failure.
    pub fn remote(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if status == RATE_LIMIT_STATUS {
            MigrateError::RateLimited { status, body }
        } else {
            MigrateError::Remote { status, body }
        }
    }

    /// Create a Batch error
    pub fn batch(range: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Batch {
            range: range.into(),
            message: message.into(),
        }
    }

    /// True when the failure is the throttling signal the retry executor
    /// is allowed to back off on.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            MigrateError::RateLimited { .. } => true,
            MigrateError::Http(e) => e
                .status()
                .map(|s| s.as_u16() == RATE_LIMIT_STATUS)
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 1,
            MigrateError::Remote { .. } | MigrateError::Http(_) | MigrateError::Batch { .. } => 2,
            MigrateError::RateLimited { .. } => 3,
            MigrateError::State(_) | MigrateError::Json(_) => 4,
            MigrateError::Io(_) => 7,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_429_is_rate_limited() {
        let err = MigrateError::remote(429, "slow down");
        assert!(err.is_rate_limited());
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_remote_500_is_not_rate_limited() {
        let err = MigrateError::remote(500, "boom");
        assert!(!err.is_rate_limited());
        assert!(matches!(err, MigrateError::Remote { status: 500, .. }));
    }

    #[test]
    fn test_missing_file_exit_code() {
        let err = MigrateError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = MigrateError::batch("[0, 100)", "destination unavailable");
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Batch [0, 100) failed"));
    }
}
