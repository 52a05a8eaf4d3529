//! Error types shared across the MIS workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, MisError>;

/// Errors raised by the shared utilities
#[derive(Error, Debug)]
pub enum MisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },
}
