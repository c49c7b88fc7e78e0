//! Clean command - preprocess the narrative column of a record file

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use complaint_rag::core::loader::{load_records, save_records};
use complaint_rag::core::preprocess::ComplaintPreprocessor;

pub fn run(
    input: &Path,
    column: &str,
    output: &Path,
    boilerplate: Option<&Path>,
    stopwords: Option<&Path>,
) -> Result<()> {
    let preprocessor = ComplaintPreprocessor::from_files(boilerplate, stopwords)?;
    let records = load_records(input)
        .with_context(|| format!("Failed to load records from {}", input.display()))?;

    let (cleaned, stats) = preprocessor.preprocess(records, column)?;
    save_records(output, &cleaned)?;

    println!(
        "{} Cleaned {} of {} records",
        "✓".green().bold(),
        stats.rows_after.to_string().cyan(),
        stats.rows_before
    );
    if stats.rows_removed() > 0 {
        println!(
            "  {} {} records empty after cleaning, removed",
            "→".dimmed(),
            stats.rows_removed()
        );
    }
    if stats.rows_with_placeholders > 0 {
        println!(
            "  {} {} records contained redaction placeholders",
            "→".dimmed(),
            stats.rows_with_placeholders
        );
    }
    println!("  {} Saved to: {}", "→".dimmed(), output.display());

    Ok(())
}
