//! Error types for the staging pipeline
//!
//! Errors fall into three classes that decide how a stage reacts:
//!
//! - **Input** errors concern one file. The stage reports it and moves on.
//! - **Structural** errors mean the instance is not in a state the stage can
//!   work with. The run stops and the operator fixes the tree.
//! - **Sink** errors come from the relational sink. The loader stops the whole
//!   run so checkpoint state stays consistent.

use crate::key::ArtifactKey;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error classes used to decide between skipping a file and stopping a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Input,
    Structural,
    Sink,
}

/// Main error type for pipeline stages
#[derive(Error, Debug)]
pub enum PipelineError {
    /// First record of a file does not carry a usable type/campus/term header
    #[error("Malformed record header '{line}': {reason}")]
    MalformedHeader { line: String, reason: String },

    /// Filename does not follow the versioned naming grammar
    #[error("Malformed file name '{name}': {reason}")]
    MalformedName { name: String, reason: String },

    /// Campus code is not on the district whitelist
    #[error("Unrecognized campus code '{campus}' in {file}")]
    UnknownCampus { campus: String, file: String },

    /// Record type has no registered layout
    #[error("No layout registered for record type '{0}'")]
    UnknownType(String),

    /// Filename key and header key disagree
    #[error("Key mismatch in {file}: name says {from_name}, first record says {from_header}")]
    KeyMismatch {
        file: String,
        from_name: ArtifactKey,
        from_header: ArtifactKey,
    },

    /// Two candidates claim the same version of the same key
    #[error("Ambiguous version {version} for {key}: {}", display_paths(.files))]
    AmbiguousVersion {
        key: ArtifactKey,
        version: u32,
        files: Vec<PathBuf>,
    },

    /// Base master file for a merge is absent
    #[error("Base master file not found: {0}. Stage or assemble the term before merging.")]
    MissingBaseFile(PathBuf),

    /// Required directory is absent
    #[error("Directory not found: {0}")]
    MissingDirectory(PathBuf),

    /// Attempt to rewrite an existing version with different content
    #[error("Version conflict: {0} already exists with different content")]
    VersionConflict(PathBuf),

    /// Another run holds the instance lock
    #[error("Instance is locked by another run ({holder}). Remove {path} if that run is gone.")]
    RunLocked { path: PathBuf, holder: String },

    /// Layout table failed validation
    #[error("Invalid layout for '{code}': {reason}")]
    InvalidLayout { code: String, reason: String },

    /// Pipeline settings failed validation
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// No term could be resolved for a stage
    #[error("No usable term: {0}")]
    NoTerm(String),

    /// Exception report is missing required columns
    #[error("Invalid exception report {path}: {reason}")]
    InvalidReport { path: PathBuf, reason: String },

    /// Relational sink failure
    #[error("Sink error: {0}")]
    Sink(#[from] rusqlite::Error),

    /// A loader run stopped on the named file
    #[error("Load aborted at {file}: {source}")]
    LoadAborted {
        file: String,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Common(#[from] mis_common::MisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_paths(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl PipelineError {
    /// Classify the error for skip/stop decisions
    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::MalformedHeader { .. }
            | PipelineError::MalformedName { .. }
            | PipelineError::UnknownCampus { .. }
            | PipelineError::UnknownType(_)
            | PipelineError::KeyMismatch { .. }
            | PipelineError::AmbiguousVersion { .. }
            | PipelineError::InvalidReport { .. }
            | PipelineError::Csv(_) => ErrorClass::Input,
            PipelineError::Sink(_) | PipelineError::LoadAborted { .. } => ErrorClass::Sink,
            _ => ErrorClass::Structural,
        }
    }

    /// Whether a stage may skip the offending file and continue
    pub fn is_skippable(&self) -> bool {
        self.class() == ErrorClass::Input
    }

    pub fn malformed_header(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedHeader {
            line: line.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_layout(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLayout {
            code: code.into(),
            reason: reason.into(),
        }
    }
}
