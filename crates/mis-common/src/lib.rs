//! MIS Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities and error handling for the MIS submission workspace.
//!
//! # Overview
//!
//! This crate provides functionality used across all workspace members:
//!
//! - **Error Handling**: Common error type and result alias
//! - **Checksums**: Content digests used to compare stored artifacts
//! - **Logging**: Tracing subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use mis_common::{checksum, Result};
//!
//! fn fingerprint(path: &str) -> Result<()> {
//!     let digest = checksum::file_sha256(path)?;
//!     tracing::info!(%digest, "Computed digest");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{MisError, Result};
