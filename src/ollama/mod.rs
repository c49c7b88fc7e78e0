//! Ollama HTTP client
//!
//! Blocking `ureq` client for the local model server. Embeddings come from
//! `/api/embed`, completions from `/api/generate` either as one JSON body or as a
//! newline-delimited stream of partial responses.

use std::io::{BufRead, BufReader, Lines};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::core::config::{GenerationConfig, OllamaConfig};
use crate::generate::{LanguageModel, TokenStream};
use crate::search::Embedder;

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Sampling options forwarded to `/api/generate`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub num_predict: u32,
}

impl From<&GenerationConfig> for GenerateOptions {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            num_predict: config.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

/// One generate body, or one line of a streamed one
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

impl OllamaClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            agent: build_agent(Duration::from_secs(120)),
            retry_attempts: 3,
        }
    }

    pub fn from_config(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .base_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self::new(base_url)
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_retry_attempts(config.retry_attempts))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Names of the locally available models
    pub fn list_models(&self) -> Result<Vec<String>> {
        let url = self.endpoint("/api/tags")?;
        debug!("Fetching available models from {}", url);

        let body = self
            .make_request_with_retry(|| {
                self.agent
                    .get(url.as_str())
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to fetch models")?;

        let parsed: ModelsResponse =
            serde_json::from_str(&body).context("Failed to parse models response")?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    /// Embedding of a single text
    pub fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let url = self.endpoint("/api/embed")?;
        let request = serde_json::to_string(&EmbedRequest { model, input: text })
            .context("Failed to serialize embedding request")?;

        let body = self
            .make_request_with_retry(|| {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&request)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to generate embedding")?;

        let parsed: EmbedResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;

        parsed
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Embedding response contained no vectors"))
    }

    /// Whole completion in one response body
    pub fn generate(&self, model: &str, prompt: &str, options: GenerateOptions) -> Result<String> {
        let url = self.endpoint("/api/generate")?;
        let request = self.generate_request(model, prompt, false, options)?;

        let body = self
            .make_request_with_retry(|| {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&request)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to generate completion")?;

        let chunk: GenerateChunk =
            serde_json::from_str(&body).context("Failed to parse generate response")?;
        if let Some(message) = chunk.error {
            return Err(anyhow!("Ollama error: {}", message));
        }
        Ok(chunk.response)
    }

    /// Completion as a lazy stream of response fragments
    ///
    /// Only opening the stream is retried; a failure mid-stream ends it with an error.
    pub fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<TokenStream> {
        let url = self.endpoint("/api/generate")?;
        let request = self.generate_request(model, prompt, true, options)?;

        let response = self
            .make_request_with_retry(|| {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&request)
            })
            .context("Failed to start completion stream")?;

        let reader = BufReader::new(response.into_body().into_reader());
        Ok(Box::new(GenerateStream::new(reader)))
    }

    fn generate_request(
        &self,
        model: &str,
        prompt: &str,
        stream: bool,
        options: GenerateOptions,
    ) -> Result<String> {
        debug!(
            "Requesting completion from {} (prompt length: {}, stream: {})",
            model,
            prompt.len(),
            stream
        );
        serde_json::to_string(&GenerateRequest {
            model,
            prompt,
            stream,
            options,
        })
        .context("Failed to serialize generate request")
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Failed to build URL for {}", path))
    }

    fn make_request_with_retry<T, F>(&self, mut request_fn: F) -> Result<T>
    where
        F: FnMut() -> Result<T, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) if *status >= 500 => {
                            warn!(
                                "Server error (status {}), attempt {}/{}",
                                status, attempt, self.retry_attempts
                            );
                            true
                        }
                        ureq::Error::StatusCode(status) => {
                            warn!("Client error (status {}), not retrying", status);
                            return Err(anyhow!("Client error: HTTP {}", status));
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => false,
                    };

                    if !should_retry {
                        return Err(anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay =
                            Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);
        Err(last_error.unwrap_or_else(|| anyhow!("Request failed after retries")))
    }
}

/// True when `model` appears in `models`, with or without an explicit `:latest` tag
pub fn model_listed(models: &[String], model: &str) -> bool {
    models
        .iter()
        .any(|name| name == model || name.strip_suffix(":latest") == Some(model))
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Response fragments read from a newline-delimited generate stream
///
/// Ends after the line flagged `done`, at end of input, or after the first error.
pub struct GenerateStream<R> {
    lines: Lines<R>,
    finished: bool,
}

impl<R: BufRead> GenerateStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            finished: false,
        }
    }

    fn fail(&mut self, err: anyhow::Error) -> Option<Result<String>> {
        self.finished = true;
        Some(Err(err))
    }
}

impl<R: BufRead> Iterator for GenerateStream<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return self.fail(anyhow!(e).context("Failed to read completion stream")),
            };
            if line.trim().is_empty() {
                continue;
            }

            let chunk: GenerateChunk = match serde_json::from_str(&line) {
                Ok(chunk) => chunk,
                Err(e) => {
                    return self.fail(anyhow!(e).context("Failed to parse completion stream line"))
                }
            };
            if let Some(message) = chunk.error {
                return self.fail(anyhow!("Ollama error: {}", message));
            }
            if chunk.done {
                self.finished = true;
            }
            if !chunk.response.is_empty() {
                return Some(Ok(chunk.response));
            }
        }
        None
    }
}

/// Sentence-transformer embeddings served by Ollama
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        let model = model.into();
        info!("Using Ollama embedding model {} at {}", model, client.base_url());
        Self { client, model }
    }

    pub fn from_config(config: &OllamaConfig) -> Result<Self> {
        Ok(Self::new(
            OllamaClient::from_config(config)?,
            config.embedding_model.clone(),
        ))
    }
}

impl Embedder for OllamaEmbedder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(&self.model, text)
    }
}

/// Completion model served by Ollama
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: OllamaClient,
    model: String,
    options: GenerateOptions,
}

impl OllamaGenerator {
    pub fn new(client: OllamaClient, model: impl Into<String>, options: GenerateOptions) -> Self {
        Self {
            client,
            model: model.into(),
            options,
        }
    }

    pub fn from_config(ollama: &OllamaConfig, generation: &GenerationConfig) -> Result<Self> {
        Ok(Self::new(
            OllamaClient::from_config(ollama)?,
            ollama.generation_model.clone(),
            GenerateOptions::from(generation),
        ))
    }
}

impl LanguageModel for OllamaGenerator {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.client.generate(&self.model, prompt, self.options)
    }

    fn stream(&self, prompt: &str) -> Result<TokenStream> {
        self.client.generate_stream(&self.model, prompt, self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OllamaClient {
        let url = Url::parse(&server.uri()).unwrap();
        OllamaClient::new(url)
            .with_timeout(Duration::from_secs(5))
            .with_retry_attempts(1)
    }

    fn options() -> GenerateOptions {
        GenerateOptions {
            temperature: 0.0,
            num_predict: 64,
        }
    }

    #[test]
    fn test_client_from_config() -> Result<()> {
        let config = OllamaConfig {
            host: "test-host".to_string(),
            port: 1234,
            retry_attempts: 5,
            ..OllamaConfig::default()
        };
        let client = OllamaClient::from_config(&config)?;

        assert_eq!(client.base_url.host_str(), Some("test-host"));
        assert_eq!(client.base_url.port(), Some(1234));
        assert_eq!(client.retry_attempts, 5);
        Ok(())
    }

    #[test]
    fn test_retry_attempts_at_least_one() {
        let client = OllamaClient::new(Url::parse("http://localhost:11434").unwrap())
            .with_retry_attempts(0);
        assert_eq!(client.retry_attempts, 1);
    }

    #[test]
    fn test_generate_options_from_config() {
        let opts = GenerateOptions::from(&GenerationConfig {
            max_tokens: 256,
            temperature: 0.3,
        });
        assert_eq!(opts.num_predict, 256);
        assert_eq!(opts.temperature, 0.3);
    }

    #[test]
    fn test_stream_stops_at_done() -> Result<()> {
        let body = concat!(
            r#"{"response":"Late ","done":false}"#,
            "\n",
            r#"{"response":"fees.","done":false}"#,
            "\n\n",
            r#"{"response":"","done":true}"#,
            "\n",
            r#"{"response":"ignored","done":false}"#,
            "\n"
        );

        let tokens: Vec<String> = GenerateStream::new(Cursor::new(body)).collect::<Result<_>>()?;
        assert_eq!(tokens, vec!["Late ", "fees."]);
        Ok(())
    }

    #[test]
    fn test_stream_error_line_ends_stream() {
        let body = concat!(
            r#"{"response":"partial","done":false}"#,
            "\n",
            r#"{"error":"model not found"}"#,
            "\n",
            r#"{"response":"after","done":false}"#,
            "\n"
        );

        let items: Vec<Result<String>> = GenerateStream::new(Cursor::new(body)).collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(items[1].as_ref().unwrap_err().to_string().contains("model not found"));
    }

    #[test]
    fn test_stream_garbage_line_is_error() {
        let items: Vec<Result<String>> = GenerateStream::new(Cursor::new("not json\n")).collect();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    #[tokio::test]
    async fn test_embed_returns_first_vector() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(json!({"model": "all-minilm", "input": "late fee"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "all-minilm",
                "embeddings": [[0.25, -0.5, 1.0]]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(client_for(&server), "all-minilm");
        let vector = tokio::task::spawn_blocking(move || embedder.encode("late fee")).await??;

        assert_eq!(vector, vec![0.25, -0.5, 1.0]);
        Ok(())
    }

    #[tokio::test]
    async fn test_embed_empty_response_is_error() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embeddings": []})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = tokio::task::spawn_blocking(move || client.embed("all-minilm", "x")).await?;
        assert!(result.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_generate_non_streaming() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({
                "model": "mistral",
                "stream": false,
                "options": {"num_predict": 64}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "Customers report duplicate fees.",
                "done": true
            })))
            .mount(&server)
            .await;

        let generator = OllamaGenerator::new(client_for(&server), "mistral", options());
        let answer = tokio::task::spawn_blocking(move || generator.complete("prompt")).await??;

        assert_eq!(answer, "Customers report duplicate fees.");
        Ok(())
    }

    #[tokio::test]
    async fn test_generate_streaming() -> Result<()> {
        let server = MockServer::start().await;
        let body = concat!(
            r#"{"response":"Duplicate","done":false}"#,
            "\n",
            r#"{"response":" fees","done":false}"#,
            "\n",
            r#"{"response":"","done":true}"#,
            "\n"
        );
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&server)
            .await;

        let generator = OllamaGenerator::new(client_for(&server), "mistral", options());
        let tokens = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            generator.stream("prompt")?.collect()
        })
        .await??;

        assert_eq!(tokens, vec!["Duplicate", " fees"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).with_retry_attempts(3);
        let result =
            tokio::task::spawn_blocking(move || client.generate("missing", "p", options())).await?;

        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("HTTP 404"));
        Ok(())
    }

    #[tokio::test]
    async fn test_model_listed_accepts_latest_tag() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{"name": "all-minilm:latest"}, {"name": "mistral:7b"}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let models = tokio::task::spawn_blocking(move || client.list_models()).await??;

        assert_eq!(models, vec!["all-minilm:latest", "mistral:7b"]);
        assert!(model_listed(&models, "all-minilm"));
        assert!(!model_listed(&models, "mistral"));
        assert!(!model_listed(&models, "llama3"));
        Ok(())
    }
}
