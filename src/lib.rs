//! complaint-rag library
//!
//! Retrieval-augmented question answering over customer complaint narratives.
//!
//! # Modules
//!
//! - `core`: configuration, artifact paths, chunk metadata, loaders, preprocessing
//! - `search`: similarity index, vector store, embedders, retriever
//! - `generate`: context building, analyst prompt, language model seam
//! - `ollama`: HTTP client for the local embedding and completion models
//! - `pipeline`: retrieve-then-generate orchestration
//! - `evaluation`: fixed question set and report rendering
//! - `mcp`: MCP server exposing the pipeline as tools

pub mod core;
pub mod error;
pub mod evaluation;
pub mod generate;
#[cfg(feature = "mcp")]
pub mod mcp;
pub mod ollama;
pub mod pipeline;
pub mod search;

// Re-exports for convenience
pub use core::config::Config;
pub use core::paths::StorePaths;
pub use core::schema::ChunkMetadata;
pub use error::RagError;
pub use generate::{Generator, LanguageModel, TokenStream};
pub use pipeline::{format_sources, Answer, RagPipeline};
pub use search::{Embedder, Retriever, SearchResult, VectorStore, EMBEDDING_DIM};
