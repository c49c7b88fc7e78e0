//! Vector store
//!
//! Owns one similarity index and the parallel `texts` / `metadatas` sequences. Row
//! `i` of the index, `texts[i]` and `metadatas[i]` always describe the same chunk.
//! Persisted as two artifacts: the binary index file and a JSON payload
//! `{"texts": [...], "metadatas": [...]}`.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::index::{normalize_l2, normalize_rows, FlatIndex, Metric, SimilarityIndex, EMBEDDING_DIM};
use super::source::SourceRows;
use crate::core::config::BuildConfig;
use crate::core::schema::ChunkMetadata;
use crate::error::{RagError, Result};

/// One joined search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub score: f32,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Build knobs for [`VectorStore::from_batch_source`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    pub batch_size: usize,
    pub normalize: bool,
    pub checkpoint_every: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            batch_size: 5000,
            normalize: true,
            checkpoint_every: 5,
        }
    }
}

impl From<&BuildConfig> for BuildOptions {
    fn from(config: &BuildConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            normalize: config.normalize,
            checkpoint_every: config.checkpoint_every,
        }
    }
}

/// Index statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub vector_count: usize,
    pub dimension: usize,
    pub metric: Metric,
}

#[derive(Serialize)]
struct PayloadRef<'a> {
    texts: &'a [String],
    metadatas: &'a [ChunkMetadata],
}

#[derive(Deserialize)]
struct Payload {
    texts: Vec<String>,
    metadatas: Vec<ChunkMetadata>,
}

/// Similarity index plus its parallel text and metadata stores
#[derive(Debug, Clone)]
pub struct VectorStore<I = FlatIndex> {
    index: I,
    texts: Vec<String>,
    metadatas: Vec<ChunkMetadata>,
}

impl<I: SimilarityIndex> VectorStore<I> {
    /// Assemble a store, rejecting parts of different lengths
    pub fn new(index: I, texts: Vec<String>, metadatas: Vec<ChunkMetadata>) -> Result<Self> {
        check_aligned(index.len(), texts.len(), metadatas.len())?;
        Ok(Self {
            index,
            texts,
            metadatas,
        })
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn metadatas(&self) -> &[ChunkMetadata] {
        &self.metadatas
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Whether rows were unit-normalized at build time, which queries must mirror
    pub fn is_normalized(&self) -> bool {
        self.index.metric() == Metric::InnerProduct
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            vector_count: self.index.len(),
            dimension: self.index.dim(),
            metric: self.index.metric(),
        }
    }

    /// Top-`k` chunks for one query vector, best first
    ///
    /// `normalize` must match the policy the store was built with. Padding slots
    /// from the index are dropped, so fewer than `k` results come back when the
    /// store is smaller than `k`.
    pub fn search(&self, query: &[f32], k: usize, normalize: bool) -> Result<Vec<SearchResult>> {
        if query.len() != self.index.dim() {
            return Err(RagError::DimensionMismatch {
                expected: self.index.dim(),
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        if normalize {
            normalize_l2(&mut query);
        }

        let neighbors = self.index.search(&query, k)?;
        let mut results = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            if !neighbor.is_match() {
                continue;
            }
            let position = usize::try_from(neighbor.position).map_err(|_| {
                RagError::Integrity(format!("index returned position {}", neighbor.position))
            })?;
            let (text, metadata) = self
                .texts
                .get(position)
                .zip(self.metadatas.get(position))
                .ok_or_else(|| {
                    RagError::Integrity(format!(
                        "index returned position {} but the store holds {} chunks",
                        position,
                        self.texts.len()
                    ))
                })?;

            results.push(SearchResult {
                score: neighbor.score,
                text: text.clone(),
                metadata: metadata.clone(),
            });
        }

        Ok(results)
    }

    /// Write `{texts, metadatas}` as JSON, creating parent directories
    fn write_payload(&self, meta_path: &Path) -> Result<()> {
        ensure_parent(meta_path)?;
        let mut writer = BufWriter::new(File::create(meta_path)?);
        let payload = PayloadRef {
            texts: &self.texts,
            metadatas: &self.metadatas,
        };
        serde_json::to_writer(&mut writer, &payload).map_err(|e| RagError::malformed(meta_path, e))?;
        writer.flush()?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        Ok(())
    }
}

impl VectorStore<FlatIndex> {
    /// Empty store ready to receive batches
    pub fn empty(normalize: bool) -> Self {
        Self {
            index: FlatIndex::new(EMBEDDING_DIM, Metric::for_normalized(normalize)),
            texts: Vec::new(),
            metadatas: Vec::new(),
        }
    }

    /// Build a store from a batch source, checkpointing to disk as it goes
    pub fn from_batch_source(
        source_path: &Path,
        index_path: &Path,
        meta_path: &Path,
        options: BuildOptions,
    ) -> Result<Self> {
        let rows = SourceRows::open(source_path)?;
        let batch_size = options.batch_size.max(1);
        let checkpoint_every = options.checkpoint_every.max(1);

        info!(
            "Building vector index from {} (batch size {}, normalize: {})",
            source_path.display(),
            batch_size,
            options.normalize
        );

        let mut store = Self::empty(options.normalize);
        let mut rows = rows.peekable();
        let mut batch_no = 0;
        let bar = build_progress_bar();

        while rows.peek().is_some() {
            let mut batch = Vec::with_capacity(batch_size);
            while batch.len() < batch_size {
                match rows.next() {
                    Some(row) => batch.push(row?),
                    None => break,
                }
            }
            batch_no += 1;

            let mut matrix = Vec::with_capacity(batch.len() * EMBEDDING_DIM);
            for row in &batch {
                if row.embedding.len() != EMBEDDING_DIM {
                    return Err(RagError::DimensionMismatch {
                        expected: EMBEDDING_DIM,
                        actual: row.embedding.len(),
                    });
                }
                matrix.extend_from_slice(&row.embedding);
            }
            if options.normalize {
                normalize_rows(&mut matrix, EMBEDDING_DIM);
            }

            store.index.add(&matrix)?;
            for row in batch {
                store.texts.push(row.chunk_text.unwrap_or_default());
                store.metadatas.push(row.metadata.unwrap_or_default());
            }
            debug!("Batch {} added, {} vectors total", batch_no, store.len());
            bar.set_position(store.len() as u64);
            bar.set_message(format!("batch {}", batch_no));

            let is_last = rows.peek().is_none();
            if batch_no % checkpoint_every == 0 || is_last {
                store.persist(index_path, meta_path)?;
                info!(
                    "Checkpoint after batch {}: {} vectors saved",
                    batch_no,
                    store.len()
                );
            }
        }

        bar.finish_and_clear();

        if batch_no == 0 {
            // Still leave loadable artifacts behind for an empty source
            store.persist(index_path, meta_path)?;
        }

        info!("Vector index saved to {}", index_path.display());
        info!("Metadata saved to {}", meta_path.display());

        Ok(store)
    }

    /// Persist both artifacts
    ///
    /// Both files are staged next to their targets and renamed into place only once
    /// both writes succeed, so a failed or interrupted write leaves the previous
    /// pair intact.
    pub fn persist(&self, index_path: &Path, meta_path: &Path) -> Result<()> {
        ensure_parent(index_path)?;
        let index_tmp = staging_path(index_path);
        let meta_tmp = staging_path(meta_path);

        let staged = self
            .index
            .write_to(&index_tmp)
            .and_then(|()| self.write_payload(&meta_tmp));
        if let Err(e) = staged {
            for tmp in [&index_tmp, &meta_tmp] {
                if tmp.is_file() {
                    let _ = fs::remove_file(tmp);
                }
            }
            return Err(e);
        }

        fs::rename(&index_tmp, index_path)?;
        fs::rename(&meta_tmp, meta_path)?;
        Ok(())
    }

    /// Restore a store from the artifacts written by [`VectorStore::persist`]
    pub fn load(index_path: &Path, meta_path: &Path) -> Result<Self> {
        RagError::ensure_exists(index_path)?;
        RagError::ensure_exists(meta_path)?;

        let index = FlatIndex::read_from(index_path)?;
        let reader = BufReader::new(File::open(meta_path)?);
        let payload: Payload =
            serde_json::from_reader(reader).map_err(|e| RagError::malformed(meta_path, e))?;

        info!(
            "Loaded vector store: {} vectors from {}",
            index.len(),
            index_path.display()
        );

        Self::new(index, payload.texts, payload.metadatas)
    }
}

/// Per-batch build progress on stderr, hidden when nobody is watching
fn build_progress_bar() -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template("{spinner} [{pos} vectors] Building vector index {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    ProgressBar::new_spinner().with_style(style)
}

fn check_aligned(vectors: usize, texts: usize, metadatas: usize) -> Result<()> {
    if vectors == texts && texts == metadatas {
        Ok(())
    } else {
        Err(RagError::Integrity(format!(
            "parallel stores disagree: {} vectors, {} texts, {} metadatas",
            vectors, texts, metadatas
        )))
    }
}

/// Sibling path a file is written to before being renamed over `path`
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
