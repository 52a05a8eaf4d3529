//! Byte-level line helpers shared by the stages
//!
//! Record files are handled as raw bytes so that encodings and line endings
//! pass through untouched.

use std::io::Write;
use std::path::Path;

/// Split content into lines, each keeping its terminator
pub fn split_lines(content: &[u8]) -> Vec<Vec<u8>> {
    content
        .split_inclusive(|b| *b == b'\n')
        .map(<[u8]>::to_vec)
        .collect()
}

/// Line content without its trailing `\r`/`\n` bytes
pub fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}

/// Whether a line starts like a record (two alphabetic bytes)
pub fn has_record_prefix(line: &[u8]) -> bool {
    line.len() >= 2 && line[0].is_ascii_alphabetic() && line[1].is_ascii_alphabetic()
}

/// Whether a line is blank once its terminator is removed
pub fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| b.is_ascii_whitespace())
}

/// Number of record lines in `content`
pub fn count_records(content: &[u8]) -> usize {
    content
        .split(|b| *b == b'\n')
        .filter(|line| has_record_prefix(line))
        .count()
}

/// Write `content` to a sibling temporary file and rename it over `path`
pub fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let partial = dir.join(format!(".{}.partial", name));

    let mut file = std::fs::File::create(&partial)?;
    file.write_all(content)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&partial, path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_terminators() {
        let lines = split_lines(b"CB1\r\nCB2\nCB3");
        assert_eq!(lines, vec![b"CB1\r\n".to_vec(), b"CB2\n".to_vec(), b"CB3".to_vec()]);
        assert_eq!(lines.concat(), b"CB1\r\nCB2\nCB3");
        assert!(split_lines(b"").is_empty());
    }

    #[test]
    fn test_line_predicates() {
        assert_eq!(trim_line_end(b"CB861\r\n"), b"CB861");
        assert!(has_record_prefix(b"CB861"));
        assert!(!has_record_prefix(b"8CB"));
        assert!(!has_record_prefix(b"C"));
        assert!(is_blank(b"  \r\n"));
        assert_eq!(count_records(b"CB1\r\n\r\n12\nSB2\n"), 2);
    }

    #[test]
    fn test_write_atomic_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("U86253CB.dat");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"two");
        assert!(!dir.path().join(".U86253CB.dat.partial").exists());
    }
}
