//! Application configuration
//!
//! Loaded from `complaint-rag.yaml` in the working directory unless another path is
//! given. A missing file means defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "complaint-rag.yaml";

pub const MAX_TOP_K: usize = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub build: BuildConfig,
    pub retrieval: RetrievalConfig,
    pub ollama: OllamaConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub index_file: String,
    pub metadata_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuildConfig {
    pub batch_size: usize,
    pub normalize: bool,
    /// Persist after this many batches (the final batch is always persisted)
    pub checkpoint_every: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    Ollama,
    Harmonic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub embedder: EmbedderKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub generation_model: String,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid batch size: {0} (must be at least 1)")]
    InvalidBatchSize(usize),
    #[error("Invalid checkpoint interval: {0} (must be at least 1)")]
    InvalidCheckpoint(usize),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid port: {0}")]
    InvalidPort(u16),
    #[error("Invalid model name for {0} (cannot be empty)")]
    InvalidModel(&'static str),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid Ollama URL: {0}")]
    InvalidUrl(String),
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/vector_store"),
            index_file: "complaints.index".to_string(),
            metadata_file: "metadata.json".to_string(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            batch_size: 5000,
            normalize: true,
            checkpoint_every: 5,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            embedder: EmbedderKind::Ollama,
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: "all-minilm".to_string(),
            generation_model: "mistral".to_string(),
            timeout_secs: 120,
            retry_attempts: 3,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.0,
        }
    }
}

impl OllamaConfig {
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let raw = format!("http://{}:{}", self.host, self.port);
        Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", raw, e)))
    }
}

impl Config {
    /// Load from `path`, or from the default file in the working directory
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => {
                if !p.exists() {
                    anyhow::bail!("Config file not found: {}", p.display());
                }
                p.to_path_buf()
            }
            None => {
                let default_path = std::env::current_dir()
                    .context("Failed to determine working directory")?
                    .join(DEFAULT_CONFIG_FILE);
                if !default_path.exists() {
                    return Ok(Self::default());
                }
                default_path
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(self.build.batch_size));
        }
        if self.build.checkpoint_every == 0 {
            return Err(ConfigError::InvalidCheckpoint(self.build.checkpoint_every));
        }
        if self.retrieval.top_k == 0 || self.retrieval.top_k > MAX_TOP_K {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }
        if self.ollama.port == 0 {
            return Err(ConfigError::InvalidPort(self.ollama.port));
        }
        if self.ollama.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel("embedding_model"));
        }
        if self.ollama.generation_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel("generation_model"));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::InvalidTemperature(self.generation.temperature));
        }
        self.ollama.base_url()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.build.batch_size, 5000);
        assert_eq!(config.build.checkpoint_every, 5);
        assert!(config.build.normalize);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.ollama.embedding_model, "all-minilm");
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = Config::from_yaml(
            r#"
retrieval:
  top_k: 8
  embedder: harmonic
ollama:
  port: 12000
"#,
        )
        .unwrap();

        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.retrieval.embedder, EmbedderKind::Harmonic);
        assert_eq!(config.ollama.port, 12000);
        assert_eq!(config.ollama.host, "localhost");
        assert_eq!(config.build.batch_size, 5000);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(matches!(
            Config::from_yaml("build:\n  batch_size: 0\n"),
            Err(ConfigError::InvalidBatchSize(0))
        ));
        assert!(matches!(
            Config::from_yaml("retrieval:\n  top_k: 500\n"),
            Err(ConfigError::InvalidTopK(500))
        ));
        assert!(matches!(
            Config::from_yaml("ollama:\n  generation_model: \"\"\n"),
            Err(ConfigError::InvalidModel("generation_model"))
        ));
        assert!(matches!(
            Config::from_yaml("generation:\n  temperature: 3.5\n"),
            Err(ConfigError::InvalidTemperature(_))
        ));
    }

    #[test]
    fn test_load_explicit_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("custom.yaml");
        fs::write(&path, "store:\n  data_dir: /tmp/store\n")?;

        let config = Config::load(Some(&path))?;
        assert_eq!(config.store.data_dir, PathBuf::from("/tmp/store"));

        let missing = dir.path().join("nope.yaml");
        assert!(Config::load(Some(&missing)).is_err());
        Ok(())
    }

    #[test]
    fn test_yaml_roundtrip() -> Result<()> {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config)?;
        let back = Config::from_yaml(&yaml)?;
        assert_eq!(back, config);
        Ok(())
    }

    #[test]
    fn test_base_url() {
        let url = OllamaConfig::default().base_url().unwrap();
        assert_eq!(url.as_str(), "http://localhost:11434/");
    }
}
