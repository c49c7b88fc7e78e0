//! Retrieval over complaint chunks
//!
//! - `index`: similarity index trait and the exact flat index
//! - `source`: precomputed-embedding batch source for builds
//! - `vectordb`: index plus parallel texts and metadata, persistence
//! - `embedding`: text embedders
//! - `retriever`: question to ranked chunks

pub mod embedding;
pub mod index;
pub mod retriever;
pub mod source;
pub mod vectordb;

pub use embedding::{Embedder, HarmonicEmbedder, EMBEDDING_DIM};
pub use index::{FlatIndex, Metric, SimilarityIndex};
pub use retriever::{build_retriever, Retriever};
pub use vectordb::{BuildOptions, SearchResult, StoreStats, VectorStore};
