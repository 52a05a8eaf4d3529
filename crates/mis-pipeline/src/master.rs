//! Master file naming and term discovery

use crate::activity::ActivityLog;
use crate::error::{PipelineError, Result};
use crate::key::verify_versioned_file;
use crate::layout::LayoutRegistry;
use crate::selector::{select_latest, Candidate, Selection};
use crate::settings::PipelineSettings;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Type and term of a master file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MasterName {
    pub term: String,
    pub record_type: String,
}

/// Naming rule `PREFIX + TERM + TYPE . ext`, e.g. `U86253CB.dat`
#[derive(Debug, Clone)]
pub struct MasterNaming {
    prefix: String,
    extension: String,
    pattern: Regex,
}

impl MasterNaming {
    pub fn new(prefix: &str, extension: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r"^{}(\d{{3}})([A-Z]{{2}})\.(?i:{})$",
            regex::escape(prefix),
            regex::escape(extension)
        ))?;
        Ok(Self {
            prefix: prefix.to_string(),
            extension: extension.to_string(),
            pattern,
        })
    }

    pub fn from_settings(settings: &PipelineSettings) -> Result<Self> {
        Self::new(&settings.master_prefix, &settings.master_extension)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn file_name(&self, term: &str, record_type: &str) -> String {
        format!("{}{}{}.{}", self.prefix, term, record_type, self.extension)
    }

    /// Name a master goes by inside trailer records (`U86253CBDAT`)
    pub fn target_name(&self, term: &str, record_type: &str) -> String {
        format!(
            "{}{}{}{}",
            self.prefix,
            term,
            record_type,
            self.extension.to_uppercase()
        )
    }

    pub fn parse(&self, file_name: &str) -> Option<MasterName> {
        let caps = self.pattern.captures(file_name)?;
        Some(MasterName {
            term: caps.get(1)?.as_str().to_string(),
            record_type: caps.get(2)?.as_str().to_string(),
        })
    }

    /// Masters in `dir`, optionally limited to one term, sorted by type
    pub fn masters(&self, dir: &Path, term: Option<&str>) -> Result<Vec<(MasterName, PathBuf)>> {
        if !dir.is_dir() {
            return Err(PipelineError::MissingDirectory(dir.to_path_buf()));
        }

        let mut found = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().and_then(|n| self.parse(n)) else {
                continue;
            };
            if term.is_none_or(|t| t == name.term) && entry.file_type()?.is_file() {
                found.push((name, entry.path()));
            }
        }
        found.sort();
        Ok(found)
    }
}

/// Terms present among versioned extracts under `root`, most recent first
pub fn available_terms(root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        return Err(PipelineError::MissingDirectory(root.to_path_buf()));
    }

    let mut terms = BTreeSet::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(Ok(name)) = entry.file_name().to_str().map(crate::key::VersionedName::parse) {
            terms.insert(name.key.term);
        }
    }
    Ok(terms.into_iter().rev().collect())
}

/// Terms present among master files in `dir`, most recent first
pub fn target_terms(dir: &Path, naming: &MasterNaming) -> Result<Vec<String>> {
    let terms: BTreeSet<String> = naming
        .masters(dir, None)?
        .into_iter()
        .map(|(name, _)| name.term)
        .collect();
    Ok(terms.into_iter().rev().collect())
}

/// Terms found in both lists, most recent first
pub fn common_terms(a: &[String], b: &[String]) -> Vec<String> {
    let b: BTreeSet<&String> = b.iter().collect();
    let common: BTreeSet<&String> = a.iter().filter(|t| b.contains(t)).collect();
    common.into_iter().rev().cloned().collect()
}

/// Pick the requested term, or the most recent one when none was requested
pub fn resolve_term(requested: Option<&str>, terms: &[String]) -> Result<String> {
    match requested {
        Some(term) => {
            PipelineSettings::check_term(term)?;
            if terms.iter().any(|t| t == term) {
                Ok(term.to_string())
            } else {
                Err(PipelineError::NoTerm(format!(
                    "term {} not found (available: {})",
                    term,
                    if terms.is_empty() { "none".to_string() } else { terms.join(", ") }
                )))
            }
        }
        None => terms
            .first()
            .cloned()
            .ok_or_else(|| PipelineError::NoTerm("no terms found".to_string())),
    }
}

/// Latest versioned extract per key for one term
///
/// Files with malformed names or disagreeing headers are reported to the
/// activity log and left out of the pool, as are keys with an ambiguous
/// top version. Superseded files are logged against their replacement.
pub fn latest_extracts(
    root: &Path,
    term: &str,
    registry: &LayoutRegistry,
    log: &mut ActivityLog,
) -> Result<Selection> {
    if !root.is_dir() {
        return Err(PipelineError::MissingDirectory(root.to_path_buf()));
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        match verify_versioned_file(entry.path(), registry) {
            Ok(name) if name.key.term == term => candidates.push(Candidate {
                key: name.key,
                version: name.version,
                revised: name.revised,
                path: entry.into_path(),
            }),
            Ok(_) => {}
            Err(e) if e.is_skippable() => {
                log.warn(format!("Skipping {}: {}", entry.path().display(), e));
            }
            Err(e) => return Err(e),
        }
    }

    let selection = select_latest(candidates);
    selection.report(log);
    Ok(selection)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn naming() -> MasterNaming {
        MasterNaming::from_settings(&PipelineSettings::default()).unwrap()
    }

    #[test]
    fn test_master_names() {
        let naming = naming();
        assert_eq!(naming.file_name("253", "CB"), "U86253CB.dat");
        assert_eq!(naming.target_name("253", "CB"), "U86253CBDAT");
        assert_eq!(
            naming.parse("U86253XB.DAT"),
            Some(MasterName {
                term: "253".to_string(),
                record_type: "XB".to_string()
            })
        );
        assert!(naming.parse("U8625CB.dat").is_none());
        assert!(naming.parse("X86253CB.dat").is_none());
        assert!(naming.parse("U86253CB.txt").is_none());
    }

    #[test]
    fn test_terms() {
        let dir = tempfile::tempdir().unwrap();
        let export = dir.path().join("shared_export");
        std::fs::create_dir_all(export.join("861")).unwrap();
        std::fs::create_dir_all(export.join("862")).unwrap();
        std::fs::write(export.join("861").join("CB_861_243_01.txt"), "").unwrap();
        std::fs::write(export.join("862").join("CB_862_253_01.txt"), "").unwrap();
        std::fs::write(export.join("862").join("readme.md"), "").unwrap();

        let masters = dir.path().join("input_dat");
        std::fs::create_dir_all(&masters).unwrap();
        std::fs::write(masters.join("U86243CB.dat"), "").unwrap();

        let available = available_terms(&export).unwrap();
        assert_eq!(available, vec!["253", "243"]);
        let targets = target_terms(&masters, &naming()).unwrap();
        assert_eq!(targets, vec!["243"]);
        assert_eq!(common_terms(&available, &targets), vec!["243"]);

        assert_eq!(resolve_term(None, &available).unwrap(), "253");
        assert_eq!(resolve_term(Some("243"), &available).unwrap(), "243");
        assert!(matches!(resolve_term(Some("233"), &available), Err(PipelineError::NoTerm(_))));
        assert!(resolve_term(None, &[]).is_err());
    }

    #[test]
    fn test_latest_extracts_skips_bad_names() {
        let registry = LayoutRegistry::builtin().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let campus = dir.path().join("861");
        std::fs::create_dir_all(&campus).unwrap();
        std::fs::write(campus.join("CB_861_253_01.txt"), "CB861253 a\n").unwrap();
        std::fs::write(campus.join("CB_861_253_02.txt"), "CB861253 b\n").unwrap();
        std::fs::write(campus.join("CB_861_253_3.txt"), "CB861253 c\n").unwrap();
        std::fs::write(campus.join("CB_861_243_05.txt"), "CB861243 d\n").unwrap();

        let (mut log, sink) = ActivityLog::in_memory("test");
        let selection = latest_extracts(dir.path(), "253", &registry, &mut log).unwrap();
        assert_eq!(selection.selected.len(), 1);
        assert_eq!(selection.selected[0].version, 2);
        assert_eq!(selection.superseded.len(), 1);
        assert!(sink.contains("CB_861_253_3.txt"));
        assert!(sink.contains("Superseded: CB_861_253_01.txt by CB_861_253_02.txt"));
    }

    #[test]
    fn test_latest_extracts_skips_ambiguous_key() {
        let registry = LayoutRegistry::builtin().unwrap();
        let dir = tempfile::tempdir().unwrap();
        for campus in ["861", "862"] {
            std::fs::create_dir_all(dir.path().join(campus)).unwrap();
        }
        // Same version of one key filed under two campus folders
        std::fs::write(dir.path().join("861").join("SB_861_253_02.txt"), "SB861253 a\n").unwrap();
        std::fs::write(dir.path().join("862").join("SB_861_253_02.txt"), "SB861253 b\n").unwrap();
        std::fs::write(dir.path().join("862").join("CB_862_253_01.txt"), "CB862253 c\n").unwrap();

        let (mut log, sink) = ActivityLog::in_memory("test");
        let selection = latest_extracts(dir.path(), "253", &registry, &mut log).unwrap();
        assert_eq!(selection.selected.len(), 1);
        assert_eq!(selection.selected[0].key.record_type, "CB");
        assert_eq!(selection.ambiguous.len(), 1);
        assert!(sink.contains("Ambiguous version 2 for SB_861_253"));
    }
}
