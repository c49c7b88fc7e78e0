pub mod ask;
pub mod build;
pub mod clean;
pub mod evaluate;
pub mod search;
pub mod status;

use anyhow::{bail, Result};
use colored::{ColoredString, Colorize};

use complaint_rag::core::config::MAX_TOP_K;
use complaint_rag::Config;

/// `-k` if given, else the configured default; must be 1..=MAX_TOP_K
fn resolve_k(k: Option<usize>, config: &Config) -> Result<usize> {
    let k = k.unwrap_or(config.retrieval.top_k);
    if k == 0 || k > MAX_TOP_K {
        bail!("k must be between 1 and {} (got {})", MAX_TOP_K, k);
    }
    Ok(k)
}

fn colored_score(score: f32) -> ColoredString {
    let text = format!("{:.2}", score);
    if score > 0.8 {
        text.green()
    } else if score > 0.6 {
        text.yellow()
    } else {
        text.dimmed()
    }
}
