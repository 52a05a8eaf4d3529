//! Analyst exception reports (`error_NN.csv`)
//!
//! Each row names a record of a master file by its type and 1-based record
//! number. Analysts flag rows for removal in the `STRIP` column; the strip
//! stage turns the flagged rows into a per-type removal plan.

use crate::error::{PipelineError, Result};
use crate::layout::LayoutRegistry;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub const ERROR_TYPE: &str = "Error Type";
pub const FILE_TYPE: &str = "File Type";
pub const RECORD_NUMBER: &str = "Record Number";
pub const STRIP: &str = "STRIP";

const STRIP_VALUES: [&str; 4] = ["Y", "YES", "1", "TRUE"];

/// Record numbers to remove, per master type
pub type StripPlan = BTreeMap<String, BTreeSet<usize>>;

/// Report number of an `error_NN.csv` file name
pub fn report_number(file_name: &str) -> Option<u32> {
    let pattern = Regex::new(r"^error_(\d+)\.csv$").ok()?;
    pattern.captures(file_name)?.get(1)?.as_str().parse().ok()
}

/// Reports in `dir`, ordered by report number
pub fn list_reports(dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
    if !dir.is_dir() {
        return Err(PipelineError::MissingDirectory(dir.to_path_buf()));
    }

    let mut reports = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(number) = entry.file_name().to_str().and_then(report_number) {
            reports.push((number, entry.path()));
        }
    }
    reports.sort();
    Ok(reports)
}

/// Highest-numbered report in `dir`
pub fn latest_report(dir: &Path) -> Result<Option<PathBuf>> {
    Ok(list_reports(dir)?.pop().map(|(_, path)| path))
}

/// Path of report `number` in `dir`
pub fn report_path(dir: &Path, number: u32) -> PathBuf {
    dir.join(format!("error_{:02}.csv", number))
}

/// An exception report held in memory
#[derive(Debug, Clone)]
pub struct ExceptionReport {
    path: PathBuf,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    error_type: usize,
    file_type: usize,
    record_number: usize,
}

fn find_column(headers: &[String], name: &str) -> Option<usize> {
    let name = name.to_uppercase();
    headers.iter().position(|h| h.to_uppercase().contains(&name))
}

impl ExceptionReport {
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

        let column = |name: &str| {
            find_column(&headers, name).ok_or_else(|| PipelineError::InvalidReport {
                path: path.to_path_buf(),
                reason: format!("missing column '{}'", name),
            })
        };
        let error_type = column(ERROR_TYPE)?;
        let file_type = column(FILE_TYPE)?;
        let record_number = column(RECORD_NUMBER)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let mut row: Vec<String> = record?.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            rows,
            error_type,
            file_type,
            record_number,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn strip_column(&self) -> Option<usize> {
        find_column(&self.headers, STRIP)
    }

    /// Distinct error types in the report
    pub fn error_types(&self) -> BTreeSet<String> {
        self.rows
            .iter()
            .map(|row| row[self.error_type].trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Distinct file types among rows with one of `error_types`
    pub fn file_types(&self, error_types: &[String]) -> BTreeSet<String> {
        self.rows
            .iter()
            .filter(|row| error_types.iter().any(|t| t == row[self.error_type].trim()))
            .map(|row| row[self.file_type].trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Flag rows matching both filters, adding the `STRIP` column when missing
    pub fn mark_for_strip(&mut self, error_types: &[String], file_types: &[String]) -> usize {
        let strip = match self.strip_column() {
            Some(index) => index,
            None => {
                self.headers.push(STRIP.to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
                self.headers.len() - 1
            }
        };

        let mut marked = 0;
        for row in &mut self.rows {
            let error_matches = error_types.iter().any(|t| t == row[self.error_type].trim());
            let file_matches = file_types.iter().any(|t| t == row[self.file_type].trim());
            if error_matches && file_matches {
                row[strip] = "Y".to_string();
                marked += 1;
            }
        }
        marked
    }

    /// Number of rows currently flagged
    pub fn marked(&self) -> usize {
        let Some(strip) = self.strip_column() else {
            return 0;
        };
        self.rows
            .iter()
            .filter(|row| STRIP_VALUES.contains(&row[strip].trim().to_uppercase().as_str()))
            .count()
    }

    /// Save the report back to where it was read from
    pub fn write(&self) -> Result<()> {
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Record numbers flagged for removal, per master type
    ///
    /// Rows of a compound group member are filed under the group leader,
    /// whose master holds the whole group.
    pub fn strip_plan(&self, registry: &LayoutRegistry) -> StripPlan {
        let mut plan = StripPlan::new();
        let Some(strip) = self.strip_column() else {
            return plan;
        };

        for row in &self.rows {
            if !STRIP_VALUES.contains(&row[strip].trim().to_uppercase().as_str()) {
                continue;
            }
            let file_type = row[self.file_type].trim().to_uppercase();
            let Ok(number) = row[self.record_number].trim().parse::<usize>() else {
                continue;
            };
            if file_type.is_empty() {
                continue;
            }
            plan.entry(registry.group_leader(&file_type).to_string())
                .or_default()
                .insert(number);
        }
        plan
    }
}
