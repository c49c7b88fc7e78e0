//! Batch source for index builds
//!
//! Rows carry a precomputed embedding, an optional chunk text and the nested
//! metadata object. JSON Lines sources are streamed; a `.json` array is read whole.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::loader::RecordFormat;
use crate::core::schema::ChunkMetadata;
use crate::error::{RagError, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceRow {
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub chunk_text: Option<String>,
    #[serde(default)]
    pub metadata: Option<ChunkMetadata>,
}

/// Rows of a source file in file order
pub struct SourceRows {
    path: PathBuf,
    inner: RowsInner,
}

enum RowsInner {
    Lines {
        lines: Lines<BufReader<File>>,
        line_no: usize,
    },
    Buffered(std::vec::IntoIter<SourceRow>),
}

impl SourceRows {
    /// Open `path`; fails before reading anything if the file is absent
    pub fn open(path: &Path) -> Result<Self> {
        RagError::ensure_exists(path)?;
        let format = RecordFormat::from_path(path)?;
        let reader = BufReader::new(File::open(path)?);

        let inner = match format {
            RecordFormat::JsonLines => RowsInner::Lines {
                lines: reader.lines(),
                line_no: 0,
            },
            RecordFormat::JsonArray => {
                let rows: Vec<SourceRow> =
                    serde_json::from_reader(reader).map_err(|e| RagError::malformed(path, e))?;
                RowsInner::Buffered(rows.into_iter())
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }
}

impl Iterator for SourceRows {
    type Item = Result<SourceRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            RowsInner::Buffered(rows) => rows.next().map(Ok),
            RowsInner::Lines { lines, line_no } => loop {
                let line = lines.next()?;
                *line_no += 1;
                let line = match line {
                    Ok(l) => l,
                    Err(e) => return Some(Err(RagError::malformed(&self.path, e))),
                };
                if line.trim().is_empty() {
                    continue;
                }
                let n = *line_no;
                return Some(serde_json::from_str(&line).map_err(|e| {
                    RagError::malformed(&self.path, format!("line {}: {}", n, e))
                }));
            },
        }
    }
}
