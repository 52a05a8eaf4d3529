//! Artifact keys and versioned file names
//!
//! A key is the `(type, campus, term)` triple that groups extracts. It can be
//! read from the first eight bytes of a record or from a versioned file name
//! such as `CB_861_253_02.txt`. Both parsers return `Result`, so a malformed
//! input is always reported with a reason instead of being coerced.

use crate::error::{PipelineError, Result};
use crate::layout::LayoutRegistry;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Header length shared by every record type
pub const HEADER_LEN: usize = 8;

/// Grouping identity of an extract
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub record_type: String,
    pub campus: String,
    pub term: String,
}

impl ArtifactKey {
    pub fn new(
        record_type: impl Into<String>,
        campus: impl Into<String>,
        term: impl Into<String>,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            campus: campus.into(),
            term: term.into(),
        }
    }

    /// Leading bytes shared by every record of this key (`CB861253`)
    pub fn prefix(&self) -> String {
        format!("{}{}{}", self.record_type, self.campus, self.term)
    }

    /// Same campus and term under a different record type
    pub fn with_type(&self, record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            campus: self.campus.clone(),
            term: self.term.clone(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.record_type, self.campus, self.term)
    }
}

/// Read a key from the header of a record
pub fn extract_key(line: &str) -> Result<ArtifactKey> {
    let header = line
        .get(..HEADER_LEN)
        .ok_or_else(|| PipelineError::malformed_header(line, "record is shorter than 8 bytes"))?;
    if !header.is_ascii() {
        return Err(PipelineError::malformed_header(line, "header is not ASCII"));
    }

    let (record_type, rest) = header.split_at(2);
    let (campus, term) = rest.split_at(3);

    if !record_type.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(PipelineError::malformed_header(line, "record type is not alphabetic"));
    }
    if !campus.bytes().chain(term.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(PipelineError::malformed_header(line, "campus and term must be digits"));
    }

    Ok(ArtifactKey::new(record_type, campus, term))
}

/// Read the key of a file from its first record
///
/// Returns `None` for an empty file.
pub fn read_header_key(path: &Path) -> Result<Option<ArtifactKey>> {
    let file = std::fs::File::open(path)?;
    let mut first = Vec::new();
    BufReader::new(file).read_until(b'\n', &mut first)?;
    let first = String::from_utf8_lossy(&first);
    let first = first.trim_end_matches(['\r', '\n']);
    if first.trim().is_empty() {
        return Ok(None);
    }
    extract_key(first).map(Some)
}

/// Reject campus codes outside the district whitelist
pub fn check_campus(key: &ArtifactKey, campuses: &[String], file: &str) -> Result<()> {
    if campuses.iter().any(|c| *c == key.campus) {
        Ok(())
    } else {
        Err(PipelineError::UnknownCampus {
            campus: key.campus.clone(),
            file: file.to_string(),
        })
    }
}

/// Parsed `TYPE_CAMPUS_TERM_VERSION(_rev)?.ext` file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedName {
    pub key: ArtifactKey,
    pub version: u32,
    /// Manually revised duplicate of the same version
    pub revised: bool,
    pub extension: String,
}

impl VersionedName {
    pub fn new(key: ArtifactKey, version: u32) -> Self {
        Self {
            key,
            version,
            revised: false,
            extension: "txt".to_string(),
        }
    }

    /// Parse a file name with the strict versioned grammar
    pub fn parse(name: &str) -> Result<Self> {
        let pattern = Regex::new(r"^([A-Za-z]+)_([0-9A-Za-z]+)_([0-9A-Za-z]+)_(\w+?)(_rev)?\.(\w+)$")?;
        let caps = pattern
            .captures(name)
            .ok_or_else(|| PipelineError::malformed_name(name, "expected TYPE_CAMPUS_TERM_NN.ext"))?;

        let part = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();
        let (record_type, campus, term, version) = (part(1), part(2), part(3), part(4));

        if record_type.len() != 2 || !record_type.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(PipelineError::malformed_name(name, "type must be two uppercase letters"));
        }
        if campus.len() != 3 || !campus.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PipelineError::malformed_name(name, "campus must be three digits"));
        }
        if term.len() != 3 || !term.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PipelineError::malformed_name(name, "term must be three digits"));
        }
        if version.len() < 2 || !version.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PipelineError::malformed_name(
                name,
                "version must be at least two digits",
            ));
        }
        let version = version
            .parse::<u32>()
            .map_err(|e| PipelineError::malformed_name(name, format!("version: {}", e)))?;

        Ok(Self {
            key: ArtifactKey::new(record_type, campus, term),
            version,
            revised: caps.get(5).is_some(),
            extension: part(6).to_string(),
        })
    }

    /// Canonical file name, version zero-padded to two digits
    pub fn file_name(&self) -> String {
        format!(
            "{}_{:02}{}.{}",
            self.key,
            self.version,
            if self.revised { "_rev" } else { "" },
            self.extension
        )
    }
}

impl std::str::FromStr for VersionedName {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Parse a versioned file and check that its first record agrees with the name
///
/// Members of a compound group agree with the group leader, so an `XB`
/// artifact may start with an `XE` record when the section file was empty.
pub fn verify_versioned_file(path: &Path, registry: &LayoutRegistry) -> Result<VersionedName> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PipelineError::malformed_name(path.display().to_string(), "not UTF-8"))?;
    let name = VersionedName::parse(file_name)?;

    if let Some(header) = read_header_key(path)? {
        let agrees = header.campus == name.key.campus
            && header.term == name.key.term
            && registry.group_leader(&header.record_type)
                == registry.group_leader(&name.key.record_type);
        if !agrees {
            return Err(PipelineError::KeyMismatch {
                file: file_name.to_string(),
                from_name: name.key,
                from_header: header,
            });
        }
    }

    Ok(name)
}
