//! Evaluate command - answer the fixed question set and render a report

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use complaint_rag::evaluation::{run_evaluation, to_markdown_table, EVALUATION_QUESTIONS};
use complaint_rag::{Config, RagPipeline};

use super::resolve_k;

pub fn run(
    config: &Config,
    root: &Path,
    k: Option<usize>,
    json: bool,
    output: Option<&Path>,
) -> Result<()> {
    let k = resolve_k(k, config)?;
    let pipeline = RagPipeline::from_config(config, root)?;

    if !json {
        println!(
            "{} Evaluating {} questions (k = {})...",
            "→".dimmed(),
            EVALUATION_QUESTIONS.len(),
            k
        );
    }

    let report = run_evaluation(&pipeline, &EVALUATION_QUESTIONS, k)?;
    let rendered = if json {
        serde_json::to_string_pretty(&report)?
    } else {
        to_markdown_table(&report)
    };

    match output {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !json {
                println!(
                    "{} Report for {} questions saved to: {}",
                    "✓".green().bold(),
                    report.results.len(),
                    path.display()
                );
            }
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
