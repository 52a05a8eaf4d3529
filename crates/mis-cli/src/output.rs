//! Terminal output helpers

use crate::error::Result;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use mis_pipeline::Selection;
use serde::Serialize;

/// Table with the CLI's standard styling
pub fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header.to_vec());
    table
}

/// Print a stage report as pretty JSON
pub fn print_json<T: Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Print a section title
pub fn title(text: &str) {
    println!("{}", text.cyan().bold());
}

/// Print a success line
pub fn success(text: impl AsRef<str>) {
    println!("{} {}", "✓".green(), text.as_ref());
}

/// Print a warning line
pub fn warning(text: impl AsRef<str>) {
    println!("{} {}", "!".yellow(), text.as_ref());
}

/// Print superseded files and skipped keys ahead of a confirmation
pub fn selection(selection: &Selection) {
    for old in &selection.superseded {
        if let Some(winner) = selection.winner_of(&old.key) {
            println!("  Superseded: {} by {}", old.file_name(), winner.file_name());
        }
    }
    for conflict in &selection.ambiguous {
        warning(format!("Skipping {}: {}", conflict.key, conflict.to_error()));
    }
}

/// Comma-joined list, or `-` when empty
pub fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_table_renders_header_and_rows() {
        let mut t = table(&["Type", "Records"]);
        t.add_row(vec!["CB", "12"]);
        let rendered = t.to_string();
        assert!(rendered.contains("Type"));
        assert!(rendered.contains("CB"));
        assert!(rendered.contains("12"));
    }

    #[test]
    fn test_join_or_dash() {
        assert_eq!(join_or_dash(&[]), "-");
        assert_eq!(join_or_dash(&["a".to_string(), "b".to_string()]), "a, b");
    }
}
