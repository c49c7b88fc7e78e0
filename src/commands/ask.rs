//! Ask command - retrieve, then answer with citations

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use complaint_rag::{format_sources, Config, RagPipeline};

use super::resolve_k;

pub fn run(config: &Config, root: &Path, question: &str, k: Option<usize>, stream: bool) -> Result<()> {
    let k = resolve_k(k, config)?;
    let pipeline = RagPipeline::from_config(config, root)?;

    let sources = if stream {
        let (sources, tokens) = pipeline.stream(question, k)?;
        let mut stdout = std::io::stdout().lock();
        for token in tokens {
            stdout.write_all(token?.as_bytes())?;
            stdout.flush()?;
        }
        writeln!(stdout)?;
        sources
    } else {
        let answer = pipeline.run(question, k)?;
        println!("{}", answer.answer);
        answer.sources
    };

    if sources.is_empty() {
        println!("{} No complaint excerpts were retrieved", "!".yellow());
    } else {
        print!("{}", format_sources(&sources));
    }

    Ok(())
}
