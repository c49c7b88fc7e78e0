//! Build command - vector store from precomputed chunk embeddings

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use colored::Colorize;

use complaint_rag::search::{BuildOptions, VectorStore};
use complaint_rag::{Config, StorePaths};

pub fn run(
    config: &Config,
    root: &Path,
    source: &Path,
    batch_size: Option<usize>,
    no_normalize: bool,
    json: bool,
) -> Result<()> {
    let paths = StorePaths::from_config(root, &config.store);

    let mut options = BuildOptions::from(&config.build);
    if let Some(size) = batch_size {
        if size == 0 {
            bail!("--batch-size must be at least 1");
        }
        options.batch_size = size;
    }
    if no_normalize {
        options.normalize = false;
    }

    if !json {
        println!(
            "{} Building vector store from {}...",
            "→".dimmed(),
            source.display()
        );
    }

    let start = Instant::now();
    let store = VectorStore::from_batch_source(source, &paths.index, &paths.metadata, options)
        .with_context(|| format!("Failed to build vector store from {}", source.display()))?;
    let duration_ms = start.elapsed().as_millis();
    let stats = store.stats();

    if json {
        println!(
            "{}",
            serde_json::json!({
                "vector_count": stats.vector_count,
                "dimension": stats.dimension,
                "metric": stats.metric,
                "normalized": options.normalize,
                "index_path": paths.index.display().to_string(),
                "metadata_path": paths.metadata.display().to_string(),
                "duration_ms": duration_ms,
            })
        );
        return Ok(());
    }

    println!();
    println!(
        "{} Indexed {} chunks in {:.2}s",
        "✓".green().bold(),
        stats.vector_count.to_string().cyan(),
        duration_ms as f64 / 1000.0
    );
    println!(
        "  {} {} dimensions, {} ({})",
        "→".dimmed(),
        stats.dimension,
        stats.metric,
        if options.normalize { "normalized" } else { "raw vectors" }
    );
    println!("  {} Index saved to: {}", "→".dimmed(), paths.index.display());
    println!(
        "  {} Metadata saved to: {}",
        "→".dimmed(),
        paths.metadata.display()
    );

    Ok(())
}
