mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use complaint_rag::Config;

#[derive(Parser)]
#[command(name = "complaint-rag")]
#[command(about = "Question answering over customer complaint narratives", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "Config file (default: ./complaint-rag.yaml)")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Debug logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // ===== Vector store =====
    /// Build the vector store from precomputed chunk embeddings
    Build {
        #[arg(long, help = "Batch source (.jsonl, .ndjson or .json)")]
        source: PathBuf,
        #[arg(long, help = "Rows per batch")]
        batch_size: Option<usize>,
        #[arg(long, help = "Keep raw vectors and rank by L2 distance")]
        no_normalize: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show vector store status
    Status {
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== Question answering =====
    /// Retrieve the chunks closest to a question
    Search {
        question: String,
        #[arg(short, long, help = "Number of chunks")]
        k: Option<usize>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Answer a question from retrieved complaints
    Ask {
        question: String,
        #[arg(short, long, help = "Number of chunks")]
        k: Option<usize>,
        #[arg(long, help = "Print the answer only when complete")]
        no_stream: bool,
    },
    /// Run the evaluation question set
    Evaluate {
        #[arg(short, long, help = "Number of chunks per question")]
        k: Option<usize>,
        #[arg(long, help = "JSON output")]
        json: bool,
        #[arg(long, help = "Write the report to a file")]
        output: Option<PathBuf>,
    },

    // ===== Preprocessing =====
    /// Clean a narrative column of JSON records
    Clean {
        #[arg(long, help = "Input records (.json or .jsonl)")]
        input: PathBuf,
        #[arg(long, help = "Text column to clean")]
        column: String,
        #[arg(long, help = "Output file (.json or .jsonl)")]
        output: PathBuf,
        #[arg(long, help = "Boilerplate sentences, one per line")]
        boilerplate: Option<PathBuf>,
        #[arg(long, help = "Stop words, one per line")]
        stopwords: Option<PathBuf>,
    },

    // ===== MCP Server =====
    /// Start MCP server for Claude integration
    #[cfg(feature = "mcp")]
    Mcp {
        #[arg(long, help = "Show Claude configuration instructions")]
        install: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;
    let root = std::env::current_dir()?;

    match cli.command {
        Commands::Build {
            source,
            batch_size,
            no_normalize,
            json,
        } => commands::build::run(&config, &root, &source, batch_size, no_normalize, json),
        Commands::Status { json } => commands::status::run(&config, &root, json),
        Commands::Search { question, k, json } => {
            commands::search::run(&config, &root, &question, k, json)
        }
        Commands::Ask {
            question,
            k,
            no_stream,
        } => commands::ask::run(&config, &root, &question, k, !no_stream),
        Commands::Evaluate { k, json, output } => {
            commands::evaluate::run(&config, &root, k, json, output.as_deref())
        }
        Commands::Clean {
            input,
            column,
            output,
            boilerplate,
            stopwords,
        } => commands::clean::run(
            &input,
            &column,
            &output,
            boilerplate.as_deref(),
            stopwords.as_deref(),
        ),

        #[cfg(feature = "mcp")]
        Commands::Mcp { install } => {
            if install {
                print_mcp_install_instructions(cli.config.as_deref());
                Ok(())
            } else {
                let runtime = tokio::runtime::Runtime::new()?;
                runtime.block_on(complaint_rag::mcp::run_mcp_server(config, root))
            }
        }
    }
}

#[cfg(feature = "mcp")]
fn print_mcp_install_instructions(config: Option<&std::path::Path>) {
    use colored::Colorize;

    let work_dir = std::env::current_dir()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "/path/to/project".to_string());

    let binary_path = std::env::current_exe()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "complaint-rag".to_string());

    let mut args = vec!["\"mcp\"".to_string()];
    if let Some(path) = config {
        args.push("\"--config\"".to_string());
        args.push(format!("\"{}\"", path.display()));
    }

    println!("{}", "MCP Server Installation Guide".bold().cyan());
    println!();
    println!("Add the following to your Claude configuration:");
    println!();
    println!("{}", "For Claude Desktop (~/.config/claude/claude_desktop_config.json):".dimmed());
    println!(r#"{{
  "mcpServers": {{
    "complaint-rag": {{
      "command": "{}",
      "args": [{}],
      "cwd": "{}"
    }}
  }}
}}"#, binary_path, args.join(", "), work_dir);
    println!();
    println!("{}", "Available tools:".bold());
    println!("  • {} - Retrieve complaint excerpts for a question", "complaints_search".green());
    println!("  • {} - Answer a question with cited complaints", "complaints_ask".green());
    println!("  • {} - Vector store statistics", "complaints_status".green());
}
