//! Append-only JSONL journals for observations and session summaries.
//!
//! One record per line, each serialized independently. A torn or corrupt
//! line only loses that record: readers skip anything that fails to parse.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::MindResult;

/// Append one record as a single JSON line, creating the file if needed.
pub fn append_record<T: Serialize>(path: &Path, record: &T) -> MindResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut line = serde_json::to_string(record)?;
    line.push('\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    // One write per record.
    file.write_all(line.as_bytes())?;
    Ok(())
}

/// Read every parseable record from a JSONL file, in file order.
///
/// A missing file yields an empty vector.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to open journal {}: {e}", path.display());
            }
            return Vec::new();
        }
    };

    let mut records = Vec::new();
    let mut skipped = 0usize;

    // Raw bytes: a torn line may not be valid UTF-8, and must not end the read.
    for (lineno, line) in BufReader::new(file).split(b'\n').enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Stopped reading {} at line {}: {e}", path.display(), lineno + 1);
                break;
            }
        };
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                tracing::debug!("Skipping line {} of {}: {e}", lineno + 1, path.display());
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(
            "Skipped {skipped} unparseable record(s) in {}",
            path.display()
        );
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        n: u32,
    }

    #[test]
    fn test_append_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("log.jsonl");

        append_record(&path, &Entry { n: 1 }).unwrap();
        append_record(&path, &Entry { n: 2 }).unwrap();

        let entries: Vec<Entry> = read_records(&path);
        assert_eq!(entries, vec![Entry { n: 1 }, Entry { n: 2 }]);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let entries: Vec<Entry> = read_records(&dir.path().join("absent.jsonl"));
        assert!(entries.is_empty());
    }

    #[test]
    fn test_corrupt_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        std::fs::write(&path, "{\"n\":1}\nnot json\n\n{\"n\":3}\n{\"n\":").unwrap();

        let entries: Vec<Entry> = read_records(&path);
        assert_eq!(entries, vec![Entry { n: 1 }, Entry { n: 3 }]);
    }

    #[test]
    fn test_invalid_utf8_line_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        std::fs::write(&path, b"{\"n\":1}\n{\"n\":\xff\xfe}\n{\"n\":3}\n{\"n\":4}\n").unwrap();

        let entries: Vec<Entry> = read_records(&path);
        assert_eq!(entries, vec![Entry { n: 1 }, Entry { n: 3 }, Entry { n: 4 }]);
    }
}
