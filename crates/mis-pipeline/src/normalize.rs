//! Fixed record length enforcement
//!
//! Some record types must be exactly a configured number of bytes. Short
//! lines are right-padded with spaces and long lines truncated; the file's
//! line-ending convention and trailing terminator are kept as they were.
//! Fixing a stored extract commits the fixed content as the next version so
//! existing versions stay untouched.

use crate::activity::ActivityLog;
use crate::context::PipelineContext;
use crate::error::{PipelineError, Result};
use crate::key::{ArtifactKey, VersionedName};
use crate::store::{Scope, VersionedStore};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Lines changed while fitting a file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LengthReport {
    pub padded: usize,
    pub truncated: usize,
}

impl LengthReport {
    pub fn changed(&self) -> usize {
        self.padded + self.truncated
    }
}

/// A stored extract replaced by a length-fixed version
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedExtract {
    pub source: PathBuf,
    pub committed: PathBuf,
    pub report: LengthReport,
}

fn split_on<'a>(content: &'a [u8], separator: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + separator.len() <= content.len() {
        if &content[i..i + separator.len()] == separator {
            parts.push(&content[start..i]);
            i += separator.len();
            start = i;
        } else {
            i += 1;
        }
    }
    parts.push(&content[start..]);
    parts
}

/// Pad or truncate every non-empty line to exactly `length` bytes
pub fn fit_to_length(content: &[u8], length: usize) -> (Vec<u8>, LengthReport) {
    let mut report = LengthReport::default();
    if content.is_empty() {
        return (Vec::new(), report);
    }

    let ending: &[u8] = if content.windows(2).any(|w| w == b"\r\n") {
        b"\r\n"
    } else {
        b"\n"
    };
    let terminated = content.ends_with(ending);
    let body = if terminated {
        &content[..content.len() - ending.len()]
    } else {
        content
    };

    let mut fitted = Vec::with_capacity(content.len());
    for (i, line) in split_on(body, ending).into_iter().enumerate() {
        if i > 0 {
            fitted.extend_from_slice(ending);
        }
        if line.len() > length {
            fitted.extend_from_slice(&line[..length]);
            report.truncated += 1;
        } else if !line.is_empty() && line.len() < length {
            fitted.extend_from_slice(line);
            fitted.resize(fitted.len() + length - line.len(), b' ');
            report.padded += 1;
        } else {
            fitted.extend_from_slice(line);
        }
    }
    if terminated {
        fitted.extend_from_slice(ending);
    }

    (fitted, report)
}

/// Fix the latest stored version of every extract with a length rule
pub fn normalize_extracts(ctx: &PipelineContext, log: &mut ActivityLog) -> Result<Vec<NormalizedExtract>> {
    let root = ctx.workspace.shared_export();
    if !root.is_dir() {
        return Err(PipelineError::MissingDirectory(root));
    }
    let store = VersionedStore::new(&root);

    let mut keys: BTreeSet<ArtifactKey> = BTreeSet::new();
    for entry in WalkDir::new(&root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(Ok(name)) = entry.file_name().to_str().map(VersionedName::parse) {
            if ctx.settings.record_lengths.contains_key(&name.key.record_type) {
                keys.insert(name.key);
            }
        }
    }

    let mut fixed = Vec::new();
    for key in keys {
        let Some(&length) = ctx.settings.record_lengths.get(&key.record_type) else {
            continue;
        };
        let Some(latest) = store.latest_of(&key, Scope::Campus)? else {
            continue;
        };

        let content = std::fs::read(&latest.path)?;
        let (fitted, report) = fit_to_length(&content, length);
        if report.changed() == 0 {
            continue;
        }

        let committed = store.commit_next(&key, Scope::Campus, &fitted)?;
        log.info(format!(
            "Fitted {} to {} bytes per line: {} padded, {} truncated -> {}",
            latest.name.file_name(),
            length,
            report.padded,
            report.truncated,
            committed.name.file_name()
        ));
        fixed.push(NormalizedExtract {
            source: latest.path,
            committed: committed.path,
            report,
        });
    }

    if fixed.is_empty() {
        log.info("All length-checked extracts already conform");
    }
    Ok(fixed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::settings::PipelineSettings;

    #[test]
    fn test_fit_preserves_crlf_and_terminator() {
        let (fitted, report) = fit_to_length(b"ABC\r\nABCDEFG\r\nABCDE\r\n", 5);
        assert_eq!(fitted, b"ABC  \r\nABCDE\r\nABCDE\r\n");
        assert_eq!(report, LengthReport { padded: 1, truncated: 1 });
    }

    #[test]
    fn test_fit_lf_without_final_terminator() {
        let (fitted, report) = fit_to_length(b"AB\nABCD", 4);
        assert_eq!(fitted, b"AB  \nABCD");
        assert_eq!(report.changed(), 1);
    }

    #[test]
    fn test_fit_leaves_empty_lines() {
        let (fitted, report) = fit_to_length(b"ABCD\n\nABCD\n", 4);
        assert_eq!(fitted, b"ABCD\n\nABCD\n");
        assert_eq!(report.changed(), 0);
    }

    #[test]
    fn test_normalize_commits_next_version() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = PipelineContext::new(dir.path(), PipelineSettings::default()).unwrap();
        let campus = ctx.workspace.shared_export().join("861");
        std::fs::create_dir_all(&campus).unwrap();
        std::fs::write(campus.join("CB_861_253_01.txt"), b"CB861253 short\r\n").unwrap();
        std::fs::write(campus.join("SB_861_253_01.txt"), b"SB861253 short\r\n").unwrap();

        let (mut log, _) = ActivityLog::in_memory("normalize");
        let fixed = normalize_extracts(&ctx, &mut log).unwrap();
        assert_eq!(fixed.len(), 1);

        let original = std::fs::read(campus.join("CB_861_253_01.txt")).unwrap();
        assert_eq!(original, b"CB861253 short\r\n");
        let fitted = std::fs::read(campus.join("CB_861_253_02.txt")).unwrap();
        assert_eq!(fitted.len(), 222);
        assert!(fitted.ends_with(b" \r\n"));

        // A second pass finds nothing to do
        assert!(normalize_extracts(&ctx, &mut log).unwrap().is_empty());
    }
}
