//! Answer generation
//!
//! Retrieved chunks become a numbered context block, the context and question fill
//! the analyst prompt, and a [`LanguageModel`] completes it either in one piece or
//! as a [`TokenStream`].

pub mod prompt;

use anyhow::Result;
use tracing::debug;

use crate::search::SearchResult;

pub use prompt::{format_rag_prompt, INSUFFICIENT_CONTEXT_ANSWER};

/// Lazy, finite, non-restartable sequence of answer fragments
pub type TokenStream = Box<dyn Iterator<Item = Result<String>>>;

/// A completion backend
pub trait LanguageModel: Send + Sync {
    /// Whole completion for `prompt`
    fn complete(&self, prompt: &str) -> Result<String>;

    /// Completion for `prompt` as incremental fragments
    fn stream(&self, prompt: &str) -> Result<TokenStream>;
}

impl<M: LanguageModel + ?Sized> LanguageModel for std::sync::Arc<M> {
    fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt)
    }

    fn stream(&self, prompt: &str) -> Result<TokenStream> {
        (**self).stream(prompt)
    }
}

/// Number the records in input order, one header line per excerpt
///
/// `[Excerpt {i}] Company: {company} | Issue: {issue}` followed by the chunk text;
/// excerpts are separated by a blank line.
pub fn build_context(records: &[SearchResult]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[Excerpt {}] Company: {} | Issue: {}\n{}",
                i + 1,
                r.metadata.company,
                r.metadata.issue,
                r.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prompt assembly in front of a language model
pub struct Generator {
    model: Box<dyn LanguageModel>,
}

impl Generator {
    pub fn new(model: Box<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub fn prompt_for(&self, question: &str, records: &[SearchResult]) -> String {
        format_rag_prompt(&build_context(records), question)
    }

    /// Complete answer with surrounding whitespace trimmed
    pub fn generate(&self, question: &str, records: &[SearchResult]) -> Result<String> {
        let prompt = self.prompt_for(question, records);
        debug!("Generating answer from {} excerpts ({} prompt chars)", records.len(), prompt.len());
        Ok(self.model.complete(&prompt)?.trim().to_string())
    }

    pub fn generate_stream(&self, question: &str, records: &[SearchResult]) -> Result<TokenStream> {
        let prompt = self.prompt_for(question, records);
        debug!("Streaming answer from {} excerpts", records.len());
        self.model.stream(&prompt)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::schema::ChunkMetadata;
    use std::sync::Mutex;

    /// Echoes a fixed reply and records every prompt it sees
    pub(crate) struct ScriptedModel {
        pub reply: String,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub(crate) fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl LanguageModel for ScriptedModel {
        fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }

        fn stream(&self, prompt: &str) -> Result<TokenStream> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let tokens: Vec<Result<String>> = self
                .reply
                .split_inclusive(' ')
                .map(|t| Ok(t.to_string()))
                .collect();
            Ok(Box::new(tokens.into_iter()))
        }
    }

    fn record(company: &str, issue: &str, text: &str) -> SearchResult {
        SearchResult {
            score: 0.5,
            text: text.to_string(),
            metadata: ChunkMetadata {
                company: company.to_string(),
                issue: issue.to_string(),
                ..ChunkMetadata::default()
            },
        }
    }

    #[test]
    fn test_build_context_numbers_in_order() {
        let records = vec![
            record("Acme Bank", "Late fee", "charged twice"),
            record("Beta Credit", "Billing dispute", "no refund"),
        ];

        assert_eq!(
            build_context(&records),
            "[Excerpt 1] Company: Acme Bank | Issue: Late fee\ncharged twice\n\n\
             [Excerpt 2] Company: Beta Credit | Issue: Billing dispute\nno refund"
        );
    }

    #[test]
    fn test_build_context_empty() {
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_build_context_missing_metadata() {
        let r = SearchResult {
            score: 0.0,
            text: "body".to_string(),
            metadata: ChunkMetadata::default(),
        };
        assert_eq!(build_context(&[r]), "[Excerpt 1] Company: N/A | Issue: N/A\nbody");
    }

    #[test]
    fn test_generate_trims_and_uses_prompt() -> Result<()> {
        let model = std::sync::Arc::new(ScriptedModel::replying("  Customers cite fees.\n"));
        let generator = Generator::new(Box::new(model.clone()));
        let records = vec![record("Acme Bank", "Late fee", "charged twice")];

        let answer = generator.generate("Why fees?", &records)?;
        assert_eq!(answer, "Customers cite fees.");

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("[Excerpt 1] Company: Acme Bank | Issue: Late fee"));
        assert!(prompts[0].contains("Question:\nWhy fees?"));
        Ok(())
    }

    #[test]
    fn test_generate_stream_concatenates() -> Result<()> {
        let generator = Generator::new(Box::new(ScriptedModel::replying("fees were charged twice")));
        let tokens: Vec<String> = generator
            .generate_stream("q", &[record("A", "B", "c")])?
            .collect::<Result<_>>()?;

        assert!(tokens.len() > 1);
        assert_eq!(tokens.concat(), "fees were charged twice");
        Ok(())
    }
}
