use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local};
use colored::*;
use serde::Serialize;

use complaint_rag::core::config::EmbedderKind;
use complaint_rag::ollama::{model_listed, OllamaClient};
use complaint_rag::search::{StoreStats, VectorStore};
use complaint_rag::{Config, StorePaths};

#[derive(Serialize)]
struct StoreStatus {
    timestamp: String,
    data_dir: String,
    index: ArtifactStatus,
    metadata: ArtifactStatus,
    stats: Option<StoreStats>,
    load_error: Option<String>,
    ollama: OllamaStatus,
}

#[derive(Serialize)]
struct ArtifactStatus {
    path: String,
    exists: bool,
    size_bytes: Option<u64>,
    modified: Option<String>,
}

#[derive(Serialize)]
struct OllamaStatus {
    url: String,
    reachable: bool,
    embedder: EmbedderKind,
    embedding_model: String,
    embedding_model_available: Option<bool>,
    generation_model: String,
    generation_model_available: Option<bool>,
}

pub fn run(config: &Config, root: &Path, json: bool) -> Result<()> {
    let paths = StorePaths::from_config(root, &config.store);

    let (stats, load_error) = if paths.exists() {
        match VectorStore::load(&paths.index, &paths.metadata) {
            Ok(store) => (Some(store.stats()), None),
            Err(e) => (None, Some(e.to_string())),
        }
    } else {
        (None, None)
    };

    let status = StoreStatus {
        timestamp: Local::now().to_rfc3339(),
        data_dir: paths.data_dir.display().to_string(),
        index: artifact(&paths.index),
        metadata: artifact(&paths.metadata),
        stats,
        load_error,
        ollama: ollama_status(config),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }

    Ok(())
}

fn artifact(path: &Path) -> ArtifactStatus {
    let meta = fs::metadata(path).ok();
    ArtifactStatus {
        path: path.display().to_string(),
        exists: meta.is_some(),
        size_bytes: meta.as_ref().map(|m| m.len()),
        modified: meta
            .and_then(|m| m.modified().ok())
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string()),
    }
}

/// Single-attempt probe so an absent server does not stall the report
fn ollama_status(config: &Config) -> OllamaStatus {
    let client = OllamaClient::from_config(&config.ollama).map(|c| {
        c.with_retry_attempts(1)
            .with_timeout(Duration::from_secs(5))
    });

    let models = client.as_ref().ok().and_then(|c| c.list_models().ok());
    let available = |name: &str| models.as_ref().map(|list| model_listed(list, name));

    OllamaStatus {
        url: client
            .as_ref()
            .map(|c| c.base_url().to_string())
            .unwrap_or_else(|e| e.to_string()),
        reachable: models.is_some(),
        embedder: config.retrieval.embedder,
        embedding_model: config.ollama.embedding_model.clone(),
        embedding_model_available: available(&config.ollama.embedding_model),
        generation_model: config.ollama.generation_model.clone(),
        generation_model_available: available(&config.ollama.generation_model),
    }
}

fn print_status(status: &StoreStatus) {
    println!("{}", "Complaint Vector Store".bold());
    println!("{}", "=".repeat(50));
    println!();
    println!("Checked at: {}", status.timestamp);
    println!("Data dir:   {}", status.data_dir);
    println!();

    println!("{}", "Artifacts".cyan());
    println!("{}", "-".repeat(30));
    for (label, a) in [("index", &status.index), ("metadata", &status.metadata)] {
        if a.exists {
            println!(
                "   {:<10} {} {} ({}, {})",
                label,
                "✓".green(),
                a.path,
                format_size(a.size_bytes.unwrap_or(0)),
                a.modified.as_deref().unwrap_or("unknown")
            );
        } else {
            println!("   {:<10} {} {} (missing)", label, "✗".red(), a.path);
        }
    }
    println!();

    println!("{}", "Index".cyan());
    println!("{}", "-".repeat(30));
    match (&status.stats, &status.load_error) {
        (Some(stats), _) => {
            println!("   {:<10} {:>8}", "vectors", stats.vector_count);
            println!("   {:<10} {:>8}", "dimension", stats.dimension);
            println!("   {:<10} {}", "metric", stats.metric);
        }
        (None, Some(err)) => println!("   {} {}", "Failed to load:".red(), err),
        (None, None) => println!(
            "   {} Not built. Run 'complaint-rag build --source <file>'",
            "!".yellow()
        ),
    }
    println!();

    let o = &status.ollama;
    println!("{}", "Ollama".cyan());
    println!("{}", "-".repeat(30));
    let reach = if o.reachable { "reachable".green() } else { "unreachable".red() };
    println!("   {:<10} {} ({})", "server", o.url, reach);
    println!("   {:<10} {:?}", "embedder", o.embedder);
    print_model("embedding", &o.embedding_model, o.embedding_model_available);
    print_model("generation", &o.generation_model, o.generation_model_available);
    println!();
    println!("{}", "=".repeat(50));
}

fn print_model(label: &str, name: &str, available: Option<bool>) {
    let mark = match available {
        Some(true) => "✓".green(),
        Some(false) => "✗ not pulled".red(),
        None => "?".dimmed(),
    };
    println!("   {:<10} {} {}", label, name, mark);
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
