//! Search command - retrieval only, no generation

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use complaint_rag::core::display::{single_line, truncate_width};
use complaint_rag::search::{build_retriever, Metric};
use complaint_rag::Config;

use super::{colored_score, resolve_k};

pub fn run(config: &Config, root: &Path, question: &str, k: Option<usize>, json: bool) -> Result<()> {
    let k = resolve_k(k, config)?;
    let retriever = build_retriever(config, root)?;
    let results = retriever.retrieve(question, k)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("{} No results found for: {}", "→".dimmed(), question.cyan());
        return Ok(());
    }

    println!(
        "{} {} results for: {}",
        "→".dimmed(),
        results.len(),
        question.cyan()
    );
    println!();

    let similarity = retriever.store().stats().metric == Metric::InnerProduct;
    for (i, result) in results.iter().enumerate() {
        let score = if similarity {
            colored_score(result.score)
        } else {
            format!("{:.2}", result.score).dimmed()
        };
        let meta = &result.metadata;

        println!(
            "{}. [{}] {}",
            (i + 1).to_string().bold(),
            score,
            meta.citation().cyan()
        );
        println!(
            "   {}",
            truncate_width(&single_line(&result.text), 100).dimmed()
        );
        println!(
            "   {} | {} | {}",
            meta.company, meta.state, meta.date_received
        );
        println!();
    }

    Ok(())
}
