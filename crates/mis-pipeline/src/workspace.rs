//! Directory layout of one instance

use crate::error::{PipelineError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Operator-cleanable areas of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    ManualDownload,
    SharedExport,
    InputDat,
    FinalDat,
    LoaderPending,
    ReportsPending,
}

impl std::str::FromStr for Area {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "manual-download" => Ok(Area::ManualDownload),
            "shared-export" => Ok(Area::SharedExport),
            "input-dat" => Ok(Area::InputDat),
            "final-dat" => Ok(Area::FinalDat),
            "loader-pending" => Ok(Area::LoaderPending),
            "reports-pending" => Ok(Area::ReportsPending),
            other => Err(PipelineError::InvalidSettings(format!("unknown area '{}'", other))),
        }
    }
}

/// Items removed and items left behind by a cleanup
#[derive(Debug, Default, Serialize)]
pub struct CleanReport {
    pub removed: usize,
    pub failures: Vec<(PathBuf, String)>,
}

/// Paths of every working directory under an instance root
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Producer files dropped by the operator
    pub fn manual_download(&self) -> PathBuf {
        self.root.join("manual_download")
    }

    /// Versioned extracts, one folder per campus
    pub fn shared_export(&self) -> PathBuf {
        self.root.join("shared_export")
    }

    /// Current masters
    pub fn input_dat(&self) -> PathBuf {
        self.root.join("input_dat")
    }

    /// Masters produced by the latest stage
    pub fn final_dat(&self) -> PathBuf {
        self.root.join("final_dat")
    }

    pub fn history_dat(&self) -> PathBuf {
        self.root.join("history_dat")
    }

    pub fn loader_pending(&self) -> PathBuf {
        self.root.join("dat_loader").join("pending")
    }

    pub fn loader_completed(&self) -> PathBuf {
        self.root.join("dat_loader").join("completed")
    }

    pub fn loader_log(&self) -> PathBuf {
        self.root.join("dat_loader").join("log")
    }

    pub fn reports_pending(&self) -> PathBuf {
        self.root.join("error_report_loader").join("pending")
    }

    pub fn reports_completed(&self) -> PathBuf {
        self.root.join("error_report_loader").join("completed")
    }

    pub fn reports_log(&self) -> PathBuf {
        self.root.join("error_report_loader").join("log")
    }

    /// Instance-wide activity log
    pub fn master_log(&self) -> PathBuf {
        self.root.join("mis-cli.log")
    }

    /// Activity log of the current staging session
    pub fn session_log(&self) -> PathBuf {
        self.root.join("history.log")
    }

    pub fn area(&self, area: Area) -> PathBuf {
        match area {
            Area::ManualDownload => self.manual_download(),
            Area::SharedExport => self.shared_export(),
            Area::InputDat => self.input_dat(),
            Area::FinalDat => self.final_dat(),
            Area::LoaderPending => self.loader_pending(),
            Area::ReportsPending => self.reports_pending(),
        }
    }

    /// Create every working directory
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [
            self.manual_download(),
            self.shared_export(),
            self.input_dat(),
            self.final_dat(),
            self.history_dat(),
            self.loader_pending(),
            self.loader_completed(),
            self.loader_log(),
            self.reports_pending(),
            self.reports_completed(),
            self.reports_log(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Empty `dir`: remove its files and the contents of its sub-folders
    ///
    /// Sub-folders themselves are kept. Items that cannot be removed are
    /// reported and skipped.
    pub fn clean_dir(dir: &Path) -> Result<CleanReport> {
        if !dir.is_dir() {
            return Err(PipelineError::MissingDirectory(dir.to_path_buf()));
        }

        let mut report = CleanReport::default();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                for child in std::fs::read_dir(&path)? {
                    let child = child?.path();
                    let removed = if child.is_dir() {
                        std::fs::remove_dir_all(&child)
                    } else {
                        std::fs::remove_file(&child)
                    };
                    record_removal(&mut report, child, removed);
                }
            } else {
                let removed = std::fs::remove_file(&path);
                record_removal(&mut report, path, removed);
            }
        }
        Ok(report)
    }
}

fn record_removal(report: &mut CleanReport, path: PathBuf, outcome: std::io::Result<()>) {
    match outcome {
        Ok(()) => report.removed += 1,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not delete");
            report.failures.push((path, e.to_string()));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_layout() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        ws.ensure_layout().unwrap();
        assert!(ws.loader_pending().is_dir());
        assert!(ws.reports_completed().is_dir());
        assert!(ws.history_dat().is_dir());
        assert_eq!(ws.area(Area::FinalDat), dir.path().join("final_dat"));
    }

    #[test]
    fn test_clean_dir_keeps_subfolders() {
        let dir = tempfile::tempdir().unwrap();
        let export = dir.path().join("shared_export");
        std::fs::create_dir_all(export.join("861").join("old")).unwrap();
        std::fs::write(export.join("861").join("CB_861_253_01.txt"), "x").unwrap();
        std::fs::write(export.join("stray.txt"), "x").unwrap();

        let report = Workspace::clean_dir(&export).unwrap();
        assert_eq!(report.removed, 3);
        assert!(report.failures.is_empty());
        assert!(export.join("861").is_dir());
        assert_eq!(std::fs::read_dir(export.join("861")).unwrap().count(), 0);
    }

    #[test]
    fn test_area_names() {
        assert_eq!("final-dat".parse::<Area>().unwrap(), Area::FinalDat);
        assert!("everything".parse::<Area>().is_err());
    }
}
