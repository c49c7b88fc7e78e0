//! End-to-end question answering: retrieve, then generate

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::core::config::Config;
use crate::generate::{Generator, LanguageModel, TokenStream};
use crate::ollama::OllamaGenerator;
use crate::search::{build_retriever, Retriever, SearchResult};

/// Answer text together with the chunks it was grounded on
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SearchResult>,
}

/// Retriever and generator loaded once and shared by every request
pub struct RagPipeline {
    retriever: Retriever,
    generator: Generator,
}

impl RagPipeline {
    pub fn new(retriever: Retriever, model: Box<dyn LanguageModel>) -> Self {
        Self {
            retriever,
            generator: Generator::new(model),
        }
    }

    /// Store under `root`, configured embedder, Ollama completion model
    pub fn from_config(config: &Config, root: &Path) -> Result<Self> {
        let retriever = build_retriever(config, root)?;
        let model = OllamaGenerator::from_config(&config.ollama, &config.generation)?;
        info!(
            "RAG pipeline ready: {} chunks, generation model {}",
            retriever.store().len(),
            config.ollama.generation_model
        );
        Ok(Self::new(retriever, Box::new(model)))
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    pub fn retrieve(&self, question: &str, k: usize) -> Result<Vec<SearchResult>> {
        self.retriever.retrieve(question, k)
    }

    pub fn run(&self, question: &str, k: usize) -> Result<Answer> {
        let sources = self.retriever.retrieve(question, k)?;
        let answer = self.generator.generate(question, &sources)?;
        Ok(Answer { answer, sources })
    }

    /// Sources up front, answer as a token stream
    pub fn stream(&self, question: &str, k: usize) -> Result<(Vec<SearchResult>, TokenStream)> {
        let sources = self.retriever.retrieve(question, k)?;
        let tokens = self.generator.generate_stream(question, &sources)?;
        Ok((sources, tokens))
    }
}

/// Citation block appended under an answer
pub fn format_sources(records: &[SearchResult]) -> String {
    let mut out = String::from("\n\n**Sources:**\n");
    for r in records {
        out.push_str(&format!("- {}\n", r.metadata.citation()));
    }
    out
}
