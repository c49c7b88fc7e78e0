//! Qualitative evaluation over a fixed question set
//!
//! Each question is answered by the pipeline and recorded with a short summary of
//! its sources. Scores and comments are left for a reviewer to fill in; the report
//! renders as a Markdown table or serializes to JSON.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::display::{single_line, truncate_chars};
use crate::pipeline::RagPipeline;
use crate::search::SearchResult;

pub const EVALUATION_QUESTIONS: [&str; 8] = [
    // Credit card
    "Why do customers report being charged unexpected fees on their credit cards?",
    "What are the common complaints regarding credit card customer service or dispute handling?",
    // Personal loan
    "Why are some personal loan applications denied, according to customer complaints?",
    "What issues do customers report about personal loan repayment or interest rates?",
    // Savings account
    "What problems do customers report with opening or managing savings accounts?",
    "Are there complaints about delayed transactions or account access issues in savings accounts?",
    // Money transfers
    "What are the most frequent complaints customers have about domestic or international money transfers?",
    "Why do customers report delays or failures when making money transfers?",
];

/// Sources listed per answer in [`summarize_sources`]
pub const DEFAULT_MAX_SOURCES: usize = 2;

const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub question: String,
    pub answer: String,
    pub sources_summary: String,
    /// Reviewer score, 1 to 5
    #[serde(default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub comments: String,
}

impl EvaluationResult {
    pub fn new(question: impl Into<String>, answer: impl Into<String>, sources_summary: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            sources_summary: sources_summary.into(),
            score: None,
            comments: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationSettings {
    pub num_questions: usize,
    pub retrieval_k: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub results: Vec<EvaluationResult>,
    pub settings: EvaluationSettings,
    pub generated_at: DateTime<Utc>,
}

impl EvaluationReport {
    pub fn new(settings: EvaluationSettings) -> Self {
        Self {
            results: Vec::new(),
            settings,
            generated_at: Utc::now(),
        }
    }

    /// Mean over scored results, 0.0 when nothing is scored
    pub fn average_score(&self) -> f64 {
        let scored: Vec<f64> = self
            .results
            .iter()
            .filter_map(|r| r.score.map(f64::from))
            .collect();
        if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<f64>() / scored.len() as f64
        }
    }

    pub fn num_evaluated(&self) -> usize {
        self.results.iter().filter(|r| r.score.is_some()).count()
    }
}

/// `[id] product: <preview>...` for the first `max_sources` records, joined by ` | `
pub fn summarize_sources(records: &[SearchResult], max_sources: usize) -> String {
    if records.is_empty() {
        return "No sources retrieved".to_string();
    }

    records
        .iter()
        .take(max_sources)
        .map(|r| {
            let preview: String = r.text.chars().take(PREVIEW_CHARS).collect();
            format!(
                "[{}] {}: {}...",
                r.metadata.complaint_id,
                r.metadata.product,
                preview.replace('\n', " ")
            )
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Answer every question with `k` retrieved chunks
pub fn run_evaluation(pipeline: &RagPipeline, questions: &[&str], k: usize) -> Result<EvaluationReport> {
    let mut report = EvaluationReport::new(EvaluationSettings {
        num_questions: questions.len(),
        retrieval_k: k,
    });

    for (i, question) in questions.iter().enumerate() {
        info!("[{}/{}] {}", i + 1, questions.len(), truncate_chars(question, 50));

        let sources = pipeline.retrieve(question, k)?;
        let answer = pipeline.generator().generate(question, &sources)?;
        info!("Answer: {}", truncate_chars(&single_line(&answer), 100));

        report.results.push(EvaluationResult::new(
            *question,
            answer,
            summarize_sources(&sources, DEFAULT_MAX_SOURCES),
        ));
    }

    Ok(report)
}

fn cell(text: &str, max: usize) -> String {
    truncate_chars(&single_line(text), max).replace('|', "\\|")
}

/// Markdown table with an average score and evaluated-count footer
pub fn to_markdown_table(report: &EvaluationReport) -> String {
    let mut lines = vec![
        "| # | Question | Generated Answer | Sources | Score | Comments |".to_string(),
        "|---|----------|------------------|---------|-------|----------|".to_string(),
    ];

    for (i, r) in report.results.iter().enumerate() {
        let score = r.score.map_or_else(|| "-".to_string(), |s| s.to_string());
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {} |",
            i + 1,
            cell(&r.question, 40),
            cell(&r.answer, 60),
            cell(&r.sources_summary, 40),
            score,
            cell(&r.comments, 30)
        ));
    }

    lines.push(String::new());
    lines.push(format!("**Average Score:** {:.2} / 5.0", report.average_score()));
    lines.push(format!(
        "**Questions Evaluated:** {} / {}",
        report.num_evaluated(),
        report.results.len()
    ));
    lines.join("\n")
}
