//! Similarity index
//!
//! [`SimilarityIndex`] is the seam the vector store talks to: add vectors in
//! batches, ask for the k nearest. [`FlatIndex`] is the exact implementation used in
//! production. It scans every stored row, which is what a flat FAISS index does,
//! and keeps results padded to `k` with [`NO_MATCH`] positions.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::{RagError, Result};

/// Embedding dimension shared by the index, the store and every embedder
pub const EMBEDDING_DIM: usize = 384;

/// Position emitted when the index holds fewer than `k` vectors
pub const NO_MATCH: i64 = -1;

const MAGIC: &[u8; 4] = b"CRIX";
const FORMAT_VERSION: u32 = 1;

/// Ranking metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Higher is better; cosine similarity for unit vectors
    InnerProduct,
    /// Squared Euclidean distance, lower is better
    L2,
}

impl Metric {
    /// Metric implied by the normalization policy of a build
    pub fn for_normalized(normalize: bool) -> Self {
        if normalize {
            Self::InnerProduct
        } else {
            Self::L2
        }
    }

    fn tag(self) -> u8 {
        match self {
            Self::InnerProduct => 0,
            Self::L2 => 1,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::InnerProduct),
            1 => Some(Self::L2),
            _ => None,
        }
    }

    /// Score used to fill slots past the last real neighbour
    fn worst_score(self) -> f32 {
        match self {
            Self::InnerProduct => f32::NEG_INFINITY,
            Self::L2 => f32::INFINITY,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InnerProduct => write!(f, "inner product"),
            Self::L2 => write!(f, "L2"),
        }
    }
}

/// One slot of a k-NN answer; `position` is [`NO_MATCH`] for padding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub score: f32,
    pub position: i64,
}

impl Neighbor {
    pub fn is_match(&self) -> bool {
        self.position != NO_MATCH
    }
}

/// Nearest-neighbour index over fixed-dimension `f32` vectors
pub trait SimilarityIndex {
    fn dim(&self) -> usize;

    /// Number of stored vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn metric(&self) -> Metric;

    /// Append a row-major batch of `vectors.len() / dim` vectors
    fn add(&mut self, vectors: &[f32]) -> Result<()>;

    /// Exactly `k` slots, best first, padded with [`NO_MATCH`]
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;
}

/// Exact index storing every vector row-major
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dim: usize,
    metric: Metric,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dim: usize, metric: Metric) -> Self {
        Self {
            dim,
            metric,
            data: Vec::new(),
        }
    }

    /// Stored vector at `position`
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    fn score(&self, query: &[f32], row: &[f32]) -> f32 {
        match self.metric {
            Metric::InnerProduct => dot(query, row),
            Metric::L2 => query
                .iter()
                .zip(row)
                .map(|(a, b)| (a - b) * (a - b))
                .sum(),
        }
    }

    /// Write the index to `path` in its binary form
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&[self.metric.tag()])?;
        writer.write_all(&(self.dim as u32).to_le_bytes())?;
        writer.write_all(&(self.len() as u64).to_le_bytes())?;
        writer.write_all(&vectors_to_blob(&self.data))?;
        writer.flush()?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        Ok(())
    }

    /// Read an index written by [`FlatIndex::write_to`]
    pub fn read_from(path: &Path) -> Result<Self> {
        RagError::ensure_exists(path)?;
        let mut reader = BufReader::new(File::open(path)?);

        let mut header = [0u8; 21];
        reader
            .read_exact(&mut header)
            .map_err(|e| RagError::malformed(path, format!("truncated header: {}", e)))?;

        if &header[0..4] != MAGIC {
            return Err(RagError::malformed(path, "not a vector index file"));
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != FORMAT_VERSION {
            return Err(RagError::malformed(
                path,
                format!("unsupported index format version {}", version),
            ));
        }
        let metric = Metric::from_tag(header[8])
            .ok_or_else(|| RagError::malformed(path, format!("unknown metric tag {}", header[8])))?;
        let dim = u32::from_le_bytes([header[9], header[10], header[11], header[12]]) as usize;
        if dim == 0 {
            return Err(RagError::malformed(path, "zero vector dimension"));
        }
        let count = u64::from_le_bytes(
            header[13..21]
                .try_into()
                .map_err(|_| RagError::malformed(path, "truncated header"))?,
        );
        let expected = usize::try_from(count)
            .ok()
            .and_then(|n| n.checked_mul(dim))
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| RagError::malformed(path, "vector count overflows"))?;

        let mut blob = Vec::new();
        reader.read_to_end(&mut blob)?;
        if blob.len() != expected {
            return Err(RagError::malformed(
                path,
                format!("expected {} bytes of vector data, found {}", expected, blob.len()),
            ));
        }

        Ok(Self {
            dim,
            metric,
            data: blob_to_vectors(&blob),
        })
    }
}

impl SimilarityIndex for FlatIndex {
    fn dim(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn add(&mut self, vectors: &[f32]) -> Result<()> {
        if vectors.len() % self.dim != 0 {
            return Err(RagError::DimensionMismatch {
                expected: self.dim,
                actual: vectors.len(),
            });
        }
        self.data.extend_from_slice(vectors);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dim {
            return Err(RagError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }

        let mut scored: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(position, row)| Neighbor {
                score: self.score(query, row),
                position: position as i64,
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        match self.metric {
            Metric::InnerProduct => scored.sort_by(|a, b| b.score.total_cmp(&a.score)),
            Metric::L2 => scored.sort_by(|a, b| a.score.total_cmp(&b.score)),
        }
        scored.truncate(k);
        scored.resize(
            k,
            Neighbor {
                score: self.metric.worst_score(),
                position: NO_MATCH,
            },
        );

        Ok(scored)
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scale `vector` to unit length in place; zero vectors are left alone
pub fn normalize_l2(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Normalize every `dim`-wide row of a row-major matrix
pub fn normalize_rows(matrix: &mut [f32], dim: usize) {
    for row in matrix.chunks_exact_mut(dim) {
        normalize_l2(row);
    }
}

/// Convert f32 vectors to a little-endian blob
fn vectors_to_blob(vectors: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vectors.len() * 4);
    for &val in vectors {
        blob.extend_from_slice(&val.to_le_bytes());
    }
    blob
}

/// Convert a little-endian blob back to f32 values
fn blob_to_vectors(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn test_blob_conversion() {
        let vectors = vec![1.0, 2.0, 3.0, -0.5];
        let blob = vectors_to_blob(&vectors);
        assert_eq!(blob_to_vectors(&blob), vectors);
    }

    #[test]
    fn test_inner_product_ranking() -> Result<()> {
        let mut index = FlatIndex::new(3, Metric::InnerProduct);
        index.add(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.6, 0.8, 0.0])?;
        assert_eq!(index.len(), 3);

        let hits = index.search(&[1.0, 0.0, 0.0], 3)?;
        let positions: Vec<i64> = hits.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![0, 2, 1]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - 0.6).abs() < 1e-6);
        assert!(hits[2].score.abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_l2_ranking_is_ascending() -> Result<()> {
        let mut index = FlatIndex::new(2, Metric::L2);
        index.add(&[0.0, 0.0, 3.0, 4.0, 1.0, 0.0])?;

        let hits = index.search(&[0.0, 0.0], 3)?;
        let positions: Vec<i64> = hits.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![0, 2, 1]);
        assert_eq!(hits[2].score, 25.0);
        Ok(())
    }

    #[test]
    fn test_pads_with_no_match() -> Result<()> {
        let mut index = FlatIndex::new(4, Metric::InnerProduct);
        index.add(&unit(4, 1))?;

        let hits = index.search(&unit(4, 1), 5)?;
        assert_eq!(hits.len(), 5);
        assert!(hits[0].is_match());
        assert!(hits[1..].iter().all(|n| n.position == NO_MATCH));

        let empty = FlatIndex::new(4, Metric::InnerProduct);
        assert!(empty.search(&unit(4, 0), 2)?.iter().all(|n| !n.is_match()));
        Ok(())
    }

    #[test]
    fn test_dimension_checks() {
        let mut index = FlatIndex::new(4, Metric::InnerProduct);
        assert!(matches!(
            index.add(&[1.0, 2.0, 3.0]),
            Err(RagError::DimensionMismatch { expected: 4, .. })
        ));
        assert!(matches!(
            index.search(&[1.0, 2.0], 1),
            Err(RagError::DimensionMismatch {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize_l2(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0; 3];
        normalize_l2(&mut zero);
        assert_eq!(zero, vec![0.0; 3]);

        let mut m = vec![2.0, 0.0, 0.0, 5.0];
        normalize_rows(&mut m, 2);
        assert_eq!(m, vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_persistence_roundtrip() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("test.index");

        let mut index = FlatIndex::new(EMBEDDING_DIM, Metric::InnerProduct);
        let mut batch = unit(EMBEDDING_DIM, 0);
        batch.extend(unit(EMBEDDING_DIM, 7));
        index.add(&batch)?;
        index.write_to(&path)?;

        let loaded = FlatIndex::read_from(&path)?;
        assert_eq!(loaded, index);
        assert_eq!(
            loaded.search(&unit(EMBEDDING_DIM, 7), 1)?,
            index.search(&unit(EMBEDDING_DIM, 7), 1)?
        );
        Ok(())
    }

    #[test]
    fn test_read_rejects_garbage() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("bad.index");
        std::fs::write(&path, b"definitely not an index file")?;

        assert!(matches!(
            FlatIndex::read_from(&path),
            Err(RagError::Malformed { .. })
        ));
        assert!(matches!(
            FlatIndex::read_from(&dir.path().join("missing.index")),
            Err(RagError::NotFound(_))
        ));
        Ok(())
    }

    fn header(dim: u32, count: u64) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.push(Metric::InnerProduct.tag());
        bytes.extend_from_slice(&dim.to_le_bytes());
        bytes.extend_from_slice(&count.to_le_bytes());
        bytes
    }

    #[test]
    fn test_read_rejects_oversized_header() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("huge.index");
        std::fs::write(&path, header(EMBEDDING_DIM as u32, u64::MAX / 2))?;

        match FlatIndex::read_from(&path) {
            Err(err @ RagError::Malformed { .. }) => assert!(err.to_string().contains("overflows")),
            other => panic!("expected malformed index, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_read_rejects_zero_dimension() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("flat.index");
        std::fs::write(&path, header(0, 3))?;

        assert!(matches!(
            FlatIndex::read_from(&path),
            Err(RagError::Malformed { .. })
        ));
        Ok(())
    }
}
