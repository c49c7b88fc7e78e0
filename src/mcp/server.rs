//! Complaint RAG MCP Server implementation

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::config::{Config, MAX_TOP_K};
use crate::core::display::truncate_chars;
use crate::pipeline::{format_sources, Answer, RagPipeline};
use crate::search::{SearchResult, StoreStats};

/// Parameters for complaints_search and complaints_ask
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QuestionParams {
    /// Natural language question (e.g., "Why are personal loan applications denied?")
    #[schemars(description = "Natural language question about customer complaints")]
    pub question: String,
    /// Number of complaint excerpts to retrieve (default: 5)
    #[schemars(description = "Number of complaint excerpts to retrieve (default: 5, max: 100)")]
    #[serde(default = "default_k")]
    pub k: usize,
}

fn default_k() -> usize {
    5
}

/// Keep k within 1..=MAX_TOP_K
fn clamp_k(k: usize) -> usize {
    k.clamp(1, MAX_TOP_K)
}

/// Search hit for JSON output
#[derive(Debug, Serialize)]
struct ExcerptJson {
    score: f32,
    complaint_id: String,
    product: String,
    issue: String,
    company: String,
    state: String,
    date_received: String,
    text: String,
}

impl From<SearchResult> for ExcerptJson {
    fn from(r: SearchResult) -> Self {
        let m = r.metadata;
        Self {
            score: r.score,
            complaint_id: m.complaint_id,
            product: m.product,
            issue: m.issue,
            company: m.company,
            state: m.state,
            date_received: m.date_received,
            text: r.text,
        }
    }
}

fn search_output(results: Vec<SearchResult>) -> serde_json::Result<String> {
    let excerpts: Vec<ExcerptJson> = results.into_iter().map(ExcerptJson::from).collect();
    serde_json::to_string_pretty(&excerpts)
}

fn ask_output(answer: &Answer) -> String {
    format!("{}{}", answer.answer, format_sources(&answer.sources))
}

fn status_output(stats: &StoreStats) -> String {
    format!(
        "Complaint vector store: {} chunks, {} dimensions, {} metric",
        stats.vector_count, stats.dimension, stats.metric
    )
}

fn internal(context: &str, err: impl std::fmt::Display) -> McpError {
    McpError::internal_error(format!("{}: {}", context, err), None)
}

/// MCP service around one loaded pipeline
#[derive(Clone)]
pub struct ComplaintService {
    pipeline: Arc<RagPipeline>,
    tool_router: ToolRouter<Self>,
}

impl ComplaintService {
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self {
            pipeline,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl ComplaintService {
    /// Retrieve complaint excerpts without generating an answer
    #[tool(description = "Search customer complaint narratives by semantic similarity. Returns the closest complaint excerpts with product, issue, company and score.")]
    async fn complaints_search(
        &self,
        params: Parameters<QuestionParams>,
    ) -> Result<CallToolResult, McpError> {
        let QuestionParams { question, k } = params.0;
        let k = clamp_k(k);
        let pipeline = Arc::clone(&self.pipeline);

        let results = tokio::task::spawn_blocking(move || pipeline.retrieve(&question, k))
            .await
            .map_err(|e| internal("Search task failed", e))?
            .map_err(|e| internal("Search failed", format!("{:#}", e)))?;

        let output = search_output(results).map_err(|e| internal("JSON serialization failed", e))?;
        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    /// Answer a question grounded in retrieved complaints
    #[tool(description = "Answer a question about customer complaints using only retrieved complaint excerpts. Returns the answer followed by cited sources.")]
    async fn complaints_ask(
        &self,
        params: Parameters<QuestionParams>,
    ) -> Result<CallToolResult, McpError> {
        let QuestionParams { question, k } = params.0;
        let k = clamp_k(k);
        info!("complaints_ask: {} (k = {})", truncate_chars(&question, 60), k);
        let pipeline = Arc::clone(&self.pipeline);

        let answer = tokio::task::spawn_blocking(move || pipeline.run(&question, k))
            .await
            .map_err(|e| internal("Generation task failed", e))?
            .map_err(|e| internal("Generation failed", format!("{:#}", e)))?;

        Ok(CallToolResult::success(vec![Content::text(ask_output(&answer))]))
    }

    /// Vector store statistics
    #[tool(description = "Get complaint vector store statistics: chunk count, embedding dimension and similarity metric.")]
    async fn complaints_status(&self) -> Result<CallToolResult, McpError> {
        let stats = self.pipeline.retriever().store().stats();
        Ok(CallToolResult::success(vec![Content::text(status_output(&stats))]))
    }
}

#[tool_handler]
impl ServerHandler for ComplaintService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Complaint RAG MCP Server. Retrieves customer complaint excerpts and answers questions grounded in them.".to_string()
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Load the pipeline once and serve it over stdio
pub async fn run_mcp_server(config: Config, root: PathBuf) -> Result<()> {
    use tokio::io::{stdin, stdout};

    let pipeline = tokio::task::spawn_blocking(move || RagPipeline::from_config(&config, &root)).await??;
    info!("MCP server starting on stdio");

    let service = ComplaintService::new(Arc::new(pipeline));
    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}
