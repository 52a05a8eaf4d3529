//! District constants and stage tuning handed to every stage

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Width of the contact block embedded in the trailer self record
pub const CONTACT_BLOCK_WIDTH: usize = 163;

/// Contact block shipped until a district configures its own:
/// last name (16), first name (10), phone (10)
pub const DEFAULT_CONTACT_BLOCK: &str = "MIS             OFFICE    0000000000";

/// How the loader treats a checkpoint left by an interrupted run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumePolicy {
    /// Reload the interrupted file from its first line
    #[default]
    Restart,
    /// Continue after the last committed line of the interrupted file
    Resume,
}

impl std::str::FromStr for ResumePolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "restart" => Ok(ResumePolicy::Restart),
            "resume" => Ok(ResumePolicy::Resume),
            other => Err(PipelineError::InvalidSettings(format!(
                "unknown resume policy '{}' (expected restart or resume)",
                other
            ))),
        }
    }
}

/// Settings shared by the pipeline stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// District code written into trailer records
    pub district: String,

    /// Master file prefix (`U86` in `U86253CB.dat`)
    pub master_prefix: String,

    /// Master file extension
    pub master_extension: String,

    /// Campus whitelist
    pub campuses: Vec<String>,

    /// Exact record lengths enforced on versioned extracts
    pub record_lengths: BTreeMap<String, usize>,

    /// Contact block of the trailer self record
    pub contact_block: String,

    /// Rows per committed loader batch
    pub batch_size: usize,

    pub resume: ResumePolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            district: "860".to_string(),
            master_prefix: "U86".to_string(),
            master_extension: "dat".to_string(),
            campuses: ["860", "861", "862", "863"].iter().map(|c| c.to_string()).collect(),
            record_lengths: BTreeMap::from([("CB".to_string(), 220)]),
            contact_block: DEFAULT_CONTACT_BLOCK.to_string(),
            batch_size: 1000,
            resume: ResumePolicy::Restart,
        }
    }
}

fn is_code(value: &str) -> bool {
    value.len() == 3 && value.bytes().all(|b| b.is_ascii_digit())
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<()> {
        if !is_code(&self.district) {
            return Err(PipelineError::InvalidSettings(format!(
                "district '{}' must be three digits",
                self.district
            )));
        }
        if let Some(bad) = self.campuses.iter().find(|c| !is_code(c)) {
            return Err(PipelineError::InvalidSettings(format!(
                "campus '{}' must be three digits",
                bad
            )));
        }
        if self.campuses.is_empty() {
            return Err(PipelineError::InvalidSettings("campus list is empty".to_string()));
        }
        if self.master_prefix.is_empty() || !self.master_prefix.is_ascii() {
            return Err(PipelineError::InvalidSettings(
                "master prefix must be non-empty ASCII".to_string(),
            ));
        }
        if self.master_extension.is_empty() {
            return Err(PipelineError::InvalidSettings("master extension is empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidSettings("batch size must be positive".to_string()));
        }
        if self.contact_block.trim().is_empty() {
            return Err(PipelineError::InvalidSettings(
                "contact block is empty; the trailer self record needs one".to_string(),
            ));
        }
        if self.contact_block.len() > CONTACT_BLOCK_WIDTH {
            return Err(PipelineError::InvalidSettings(format!(
                "contact block exceeds {} bytes",
                CONTACT_BLOCK_WIDTH
            )));
        }
        Ok(())
    }

    /// Contact block right-padded to its fixed width
    pub fn contact_field(&self) -> String {
        format!("{:<width$}", self.contact_block, width = CONTACT_BLOCK_WIDTH)
    }

    /// Validate a term code
    pub fn check_term(term: &str) -> Result<()> {
        if is_code(term) {
            Ok(())
        } else {
            Err(PipelineError::InvalidSettings(format!("term '{}' must be three digits", term)))
        }
    }
}
