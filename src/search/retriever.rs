//! Retriever - question in, joined search hits out

use anyhow::{Context, Result};
use std::path::Path;

use super::embedding::{Embedder, HarmonicEmbedder, EMBEDDING_DIM};
use super::vectordb::{SearchResult, VectorStore};
use crate::core::config::{Config, EmbedderKind};
use crate::core::paths::StorePaths;
use crate::error::RagError;
use crate::ollama::OllamaEmbedder;

/// Loaded vector store plus the embedder that produced its vectors
pub struct Retriever {
    store: VectorStore,
    embedder: Box<dyn Embedder>,
}

impl Retriever {
    pub fn new(store: VectorStore, embedder: Box<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Embed a question, rejecting vectors of the wrong width
    pub fn embed_question(&self, question: &str) -> Result<Vec<f32>> {
        let vector = self
            .embedder
            .encode(question)
            .context("Failed to embed question")?;

        if vector.len() != EMBEDDING_DIM {
            return Err(RagError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: vector.len(),
            }
            .into());
        }
        Ok(vector)
    }

    /// Top-`k` chunks for `question`, best first
    ///
    /// The query is normalized only when the store was built normalized.
    pub fn retrieve(&self, question: &str, k: usize) -> Result<Vec<SearchResult>> {
        let vector = self.embed_question(question)?;
        Ok(self.store.search(&vector, k, self.store.is_normalized())?)
    }
}

/// Embedder selected by `retrieval.embedder`
pub fn build_embedder(config: &Config) -> Result<Box<dyn Embedder>> {
    Ok(match config.retrieval.embedder {
        EmbedderKind::Ollama => Box::new(OllamaEmbedder::from_config(&config.ollama)?),
        EmbedderKind::Harmonic => Box::new(HarmonicEmbedder::new()),
    })
}

/// Load the persisted store under `root` and attach the configured embedder
pub fn build_retriever(config: &Config, root: &Path) -> Result<Retriever> {
    let paths = StorePaths::from_config(root, &config.store);
    let store = VectorStore::load(&paths.index, &paths.metadata).with_context(|| {
        format!(
            "Failed to load vector store from {}. Run 'complaint-rag build' first",
            paths.data_dir.display()
        )
    })?;

    Ok(Retriever::new(store, build_embedder(config)?))
}
