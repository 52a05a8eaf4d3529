//! Error types for the MIS CLI
//!
//! Messages are shown to operators as-is, so each one says what to check next.

use mis_pipeline::PipelineError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Another stage holds the instance lock
    #[error("Another MIS run is in progress ({holder}). Wait for it to finish, or delete '{path}' if that run is gone.")]
    Locked { path: String, holder: String },

    /// A pipeline stage failed
    #[error("{0}")]
    Pipeline(PipelineError),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check config/mis.toml and the MIS__* environment variables.")]
    Config(String),

    /// Configuration sources could not be read
    #[error("Failed to read configuration: {0}. Check the syntax of config/mis.toml.")]
    ConfigSource(#[from] config::ConfigError),

    /// Requested input does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operator prompt failed
    #[error("Prompt failed: {0}. Pass --yes to run without prompts.")]
    Prompt(#[from] inquire::InquireError),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// JSON output failed
    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::RunLocked { path, holder } => Self::Locked {
                path: path.display().to_string(),
                holder,
            },
            other => Self::Pipeline(other),
        }
    }
}

impl CliError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_lock_error_names_the_lock_file() {
        let err: CliError = PipelineError::RunLocked {
            path: PathBuf::from("/srv/mis/.mis-run.lock"),
            holder: "pid=42 stage=merge".to_string(),
        }
        .into();

        let message = err.to_string();
        assert!(message.contains("pid=42 stage=merge"));
        assert!(message.contains("/srv/mis/.mis-run.lock"));
    }

    #[test]
    fn test_pipeline_errors_pass_through() {
        let err: CliError = PipelineError::NoTerm("no terms found".to_string()).into();
        assert!(matches!(err, CliError::Pipeline(_)));
    }
}
