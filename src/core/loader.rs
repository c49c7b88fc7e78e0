//! Loading helpers for word lists and JSON record files

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::error::{RagError, Result};

/// Supported record file formats, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// One JSON document holding an array
    JsonArray,
    /// One JSON object per line (`.jsonl`, `.ndjson`)
    JsonLines,
}

impl RecordFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = extension(path)?;
        match ext.as_str() {
            "json" => Ok(Self::JsonArray),
            "jsonl" | "ndjson" => Ok(Self::JsonLines),
            "parquet" | "csv" | "xlsx" => Err(RagError::malformed(
                path,
                format!(
                    "Tabular .{} files are not read directly. Export the rows to JSON Lines (.jsonl) first",
                    ext
                ),
            )),
            other => Err(RagError::malformed(
                path,
                format!(
                    "Unsupported file type: .{}. Supported formats: json, jsonl, ndjson",
                    other
                ),
            )),
        }
    }
}

fn extension(path: &Path) -> Result<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| RagError::malformed(path, "File has no extension"))
}

/// Read a UTF-8 `.txt` file
pub fn load_text(path: &Path) -> Result<String> {
    RagError::ensure_exists(path)?;

    if extension(path)? != "txt" {
        return Err(RagError::malformed(path, "Expected a .txt file"));
    }

    info!("Loading text file: {}", path.display());
    let bytes = std::fs::read(path)?;
    String::from_utf8(bytes).map_err(|e| RagError::malformed(path, e))
}

/// Non-empty trimmed lines of a text file
pub fn load_lines(path: &Path) -> Result<Vec<String>> {
    Ok(load_text(path)?
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

/// Load every record of a JSON array or JSON Lines file
pub fn load_records(path: &Path) -> Result<Vec<Value>> {
    RagError::ensure_exists(path)?;
    let format = RecordFormat::from_path(path)?;
    info!("Loading records: {}", path.display());

    let reader = BufReader::new(File::open(path)?);
    match format {
        RecordFormat::JsonArray => {
            serde_json::from_reader(reader).map_err(|e| RagError::malformed(path, e))
        }
        RecordFormat::JsonLines => {
            let mut records = Vec::new();
            for (line_no, line) in reader.lines().enumerate() {
                let line = line.map_err(|e| RagError::malformed(path, e))?;
                if line.trim().is_empty() {
                    continue;
                }
                let record = serde_json::from_str(&line).map_err(|e| {
                    RagError::malformed(path, format!("line {}: {}", line_no + 1, e))
                })?;
                records.push(record);
            }
            Ok(records)
        }
    }
}

/// Write records in the format implied by the extension of `path`
pub fn save_records(path: &Path, records: &[Value]) -> Result<()> {
    let format = RecordFormat::from_path(path)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    match format {
        RecordFormat::JsonArray => {
            serde_json::to_writer_pretty(&mut writer, records)
                .map_err(|e| RagError::malformed(path, e))?;
        }
        RecordFormat::JsonLines => {
            for record in records {
                serde_json::to_writer(&mut writer, record).map_err(|e| RagError::malformed(path, e))?;
                writer.write_all(b"\n")?;
            }
        }
    }
    writer.flush()?;

    info!("Saved {} records to {}", records.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_lines_skips_blanks() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("stopwords.txt");
        fs::write(&path, "the\n\n  and \nof\n")?;

        assert_eq!(load_lines(&path)?, vec!["the", "and", "of"]);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = load_text(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }

    #[test]
    fn test_tabular_source_points_to_jsonl() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("chunks.parquet");
        fs::write(&path, b"PAR1")?;

        let err = RecordFormat::from_path(&path).unwrap_err();
        assert!(matches!(err, RagError::Malformed { .. }));
        assert!(err.to_string().contains("Export the rows to JSON Lines"));
        Ok(())
    }

    #[test]
    fn test_unsupported_extension() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("data.txt");
        fs::write(&path, "a,b\n1,2\n")?;

        let err = load_records(&path).unwrap_err();
        assert!(matches!(err, RagError::Malformed { .. }));
        assert!(err.to_string().contains("Unsupported file type: .txt"));

        let bare = dir.path().join("README");
        fs::write(&bare, "x")?;
        assert!(load_records(&bare)
            .unwrap_err()
            .to_string()
            .contains("no extension"));
        Ok(())
    }

    #[test]
    fn test_undecodable_text() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("latin1.txt");
        fs::write(&path, [0x66, 0x6f, 0xff, 0xfe])?;

        assert!(matches!(
            load_text(&path).unwrap_err(),
            RagError::Malformed { .. }
        ));
        Ok(())
    }

    #[test]
    fn test_load_records_both_formats() -> anyhow::Result<()> {
        let dir = TempDir::new()?;

        let array = dir.path().join("rows.json");
        fs::write(&array, r#"[{"a": 1}, {"a": 2}]"#)?;
        assert_eq!(load_records(&array)?.len(), 2);

        let lines = dir.path().join("rows.jsonl");
        fs::write(&lines, "{\"a\": 1}\n\n{\"a\": 2}\n{\"a\": 3}\n")?;
        let records = load_records(&lines)?;
        assert_eq!(records.len(), 3);
        assert_eq!(records[2]["a"], 3);

        let broken = dir.path().join("broken.jsonl");
        fs::write(&broken, "{\"a\": 1}\n{not json\n")?;
        let err = load_records(&broken).unwrap_err();
        assert!(err.to_string().contains("line 2"));
        Ok(())
    }

    #[test]
    fn test_save_records_round_trip_jsonl() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("out/clean.jsonl");
        let records = vec![
            serde_json::json!({"narrative": "late fee", "id": 1}),
            serde_json::json!({"narrative": "wire delayed", "id": 2}),
        ];

        save_records(&path, &records)?;
        assert_eq!(fs::read_to_string(&path)?.lines().count(), 2);
        assert_eq!(load_records(&path)?, records);
        Ok(())
    }
}
