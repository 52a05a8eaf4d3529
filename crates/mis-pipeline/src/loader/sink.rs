//! Relational sink backends for the loaders

use crate::error::Result;
use crate::layout::RecordLayout;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

/// Columns indexed on record tables when the layout has them
pub const INDEXED_COLUMNS: [&str; 4] = [
    "GI01_DISTRICT_COLLEGE_ID",
    "GI03_TERM_ID",
    "SB00_STUDENT_ID",
    "EB00_EMPLOYEE_ID",
];

/// Destination of parsed master records
pub trait RecordSink {
    /// Create `table` for `layout` unless it exists. Returns whether it was created.
    fn ensure_table(&mut self, table: &str, layout: &RecordLayout) -> Result<bool>;

    /// Delete every row of `term`, returning the number removed
    fn delete_term(&mut self, table: &str, term: &str) -> Result<usize>;

    /// Insert `rows` and commit them as one transaction
    fn insert_batch(&mut self, table: &str, layout: &RecordLayout, rows: &[Vec<String>]) -> Result<()>;
}

/// Destination of exception report rows
pub trait ReportSink {
    /// Create `table` with `columns`, or add the ones it lacks. Returns the added columns.
    fn ensure_report_table(&mut self, table: &str, columns: &[String]) -> Result<Vec<String>>;

    /// Delete the rows of one report for one term and college
    fn delete_report_rows(&mut self, table: &str, report_no: &str, term: &str, college: &str) -> Result<usize>;

    /// Insert `rows` and commit them as one transaction
    fn insert_report_rows(&mut self, table: &str, columns: &[String], rows: &[Vec<String>]) -> Result<()>;
}

/// Quote an SQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Embedded SQLite sink
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "Opened sink database");
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Column names of `table` in declaration order
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    pub fn count_rows(&self, table: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn insert_rows(&mut self, table: &str, columns: &[&str], rows: &[Vec<String>]) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
            (1..=columns.len()).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
        );

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;
        debug!(table, rows = rows.len(), "Committed batch");
        Ok(())
    }
}

impl RecordSink for SqliteSink {
    fn ensure_table(&mut self, table: &str, layout: &RecordLayout) -> Result<bool> {
        if self.table_exists(table)? {
            return Ok(false);
        }

        let columns = layout
            .fields()
            .iter()
            .map(|f| format!("{} VARCHAR({})", quote_ident(f.name), f.width()))
            .collect::<Vec<_>>()
            .join(", ");
        self.conn
            .execute(&format!("CREATE TABLE {} ({})", quote_ident(table), columns), [])?;

        for column in INDEXED_COLUMNS.iter().filter(|c| layout.has_field(c)) {
            self.conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                    quote_ident(&format!("IDX_{}_{}", table, column)),
                    quote_ident(table),
                    quote_ident(column)
                ),
                [],
            )?;
        }
        info!(table, "Created sink table");
        Ok(true)
    }

    fn delete_term(&mut self, table: &str, term: &str) -> Result<usize> {
        let deleted = self.conn.execute(
            &format!("DELETE FROM {} WHERE \"GI03_TERM_ID\" = ?1", quote_ident(table)),
            [term],
        )?;
        Ok(deleted)
    }

    fn insert_batch(&mut self, table: &str, layout: &RecordLayout, rows: &[Vec<String>]) -> Result<()> {
        let columns: Vec<&str> = layout.fields().iter().map(|f| f.name).collect();
        self.insert_rows(table, &columns, rows)
    }
}

impl ReportSink for SqliteSink {
    fn ensure_report_table(&mut self, table: &str, columns: &[String]) -> Result<Vec<String>> {
        if !self.table_exists(table)? {
            let defs = columns
                .iter()
                .map(|c| format!("{} VARCHAR(4000)", quote_ident(c)))
                .collect::<Vec<_>>()
                .join(", ");
            self.conn
                .execute(&format!("CREATE TABLE {} ({})", quote_ident(table), defs), [])?;
            info!(table, "Created report table");
            return Ok(Vec::new());
        }

        let existing: Vec<String> = self.columns(table)?.iter().map(|c| c.to_uppercase()).collect();
        let mut added = Vec::new();
        for column in columns {
            if existing.contains(&column.to_uppercase()) || added.contains(column) {
                continue;
            }
            self.conn.execute(
                &format!(
                    "ALTER TABLE {} ADD COLUMN {} VARCHAR(4000)",
                    quote_ident(table),
                    quote_ident(column)
                ),
                [],
            )?;
            added.push(column.clone());
        }
        Ok(added)
    }

    fn delete_report_rows(&mut self, table: &str, report_no: &str, term: &str, college: &str) -> Result<usize> {
        let deleted = self.conn.execute(
            &format!(
                "DELETE FROM {} WHERE \"REPORT_NO\" = ?1 AND \"TERM_ID\" = ?2 AND \"COLLEGE_ID\" = ?3",
                quote_ident(table)
            ),
            [report_no, term, college],
        )?;
        Ok(deleted)
    }

    fn insert_report_rows(&mut self, table: &str, columns: &[String], rows: &[Vec<String>]) -> Result<()> {
        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        self.insert_rows(table, &columns, rows)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::layout::LayoutRegistry;

    #[test]
    fn test_record_table_bootstrap() {
        let registry = LayoutRegistry::builtin().unwrap();
        let layout = registry.layout("SB").unwrap();
        let mut sink = SqliteSink::in_memory().unwrap();

        assert!(sink.ensure_table("MIS_SB", layout).unwrap());
        assert!(!sink.ensure_table("MIS_SB", layout).unwrap());
        assert_eq!(sink.columns("MIS_SB").unwrap().len(), layout.fields().len());

        let indexes: i64 = sink
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND tbl_name = 'MIS_SB'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(indexes, 3);
    }

    #[test]
    fn test_insert_and_delete_term() {
        let registry = LayoutRegistry::builtin().unwrap();
        let layout = registry.layout("PP").unwrap();
        let mut sink = SqliteSink::in_memory().unwrap();
        sink.ensure_table("MIS_PP", layout).unwrap();

        let row = |term: &str| layout.parse(format!("PP861{}", term).as_bytes());
        sink.insert_batch("MIS_PP", layout, &[row("253"), row("253"), row("243")])
            .unwrap();
        assert_eq!(sink.count_rows("MIS_PP").unwrap(), 3);
        assert_eq!(sink.delete_term("MIS_PP", "253").unwrap(), 2);
        assert_eq!(sink.count_rows("MIS_PP").unwrap(), 1);
    }

    #[test]
    fn test_report_table_gains_columns() {
        let mut sink = SqliteSink::in_memory().unwrap();
        let columns: Vec<String> = ["REPORT_NO", "TERM_ID", "COLLEGE_ID"].map(String::from).to_vec();
        assert!(sink.ensure_report_table("MIS_ERROR_REPORTS", &columns).unwrap().is_empty());

        let mut wider = columns.clone();
        wider.push("STRIP".to_string());
        assert_eq!(
            sink.ensure_report_table("MIS_ERROR_REPORTS", &wider).unwrap(),
            vec!["STRIP".to_string()]
        );
        assert_eq!(sink.columns("MIS_ERROR_REPORTS").unwrap().len(), 4);
    }
}
