//! `multi_recall_search`: the retrieval pipeline as an agent-callable tool.
//! Always answers with a structured response; failures go into `message`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::retrieval::{RetrievalPipeline, RetrievedChunk};

pub const TOOL_NAME: &str = "multi_recall_search";
pub const TOOL_DESCRIPTION: &str = "Search the employee rules handbook using hybrid retrieval (vector + keyword). \
Use it to find information about company policies, benefits, leave policies, conduct guidelines, and other employee-related topics.";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RetrievalRequest {
    pub query: String,
    #[serde(rename = "topK", default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolMetadata {
    pub source: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub rank: usize,
    pub text: String,
    pub metadata: ToolMetadata,
    pub score: f64,
}

impl From<RetrievedChunk> for ToolResult {
    fn from(c: RetrievedChunk) -> Self {
        Self {
            rank: c.rank,
            text: c.text,
            metadata: ToolMetadata {
                source: c.metadata.source,
                chunk_index: c.metadata.chunk_index,
                total_chunks: c.metadata.total_chunks,
            },
            score: c.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResponse {
    pub results: Vec<ToolResult>,
    pub message: String,
}

impl RetrievalResponse {
    fn failed(reason: impl std::fmt::Display) -> Self {
        Self { results: Vec::new(), message: format!("Search failed: {}", reason) }
    }
}

#[derive(Clone)]
pub struct RetrievalTool {
    pipeline: Arc<RetrievalPipeline>,
    default_top_k: usize,
    max_top_k: usize,
}

impl RetrievalTool {
    pub fn new(pipeline: Arc<RetrievalPipeline>, default_top_k: usize, max_top_k: usize) -> Self {
        let max_top_k = max_top_k.max(1);
        Self { pipeline, default_top_k: default_top_k.clamp(1, max_top_k), max_top_k }
    }

    /// Requested `topK`, defaulted and clamped to `1..=max_top_k`.
    pub fn effective_top_k(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_top_k).clamp(1, self.max_top_k)
    }

    pub async fn call(&self, request: RetrievalRequest) -> RetrievalResponse {
        let top_k = self.effective_top_k(request.top_k);
        info!(tool = TOOL_NAME, query = %request.query, top_k, "tool call");
        match self.pipeline.retrieve(&request.query, top_k).await {
            Ok(chunks) if chunks.is_empty() => RetrievalResponse {
                results: Vec::new(),
                message: "No relevant sections found in the employee handbook.".to_string(),
            },
            Ok(chunks) => {
                let results: Vec<ToolResult> = chunks.into_iter().map(ToolResult::from).collect();
                let message = format!("Found {} relevant sections from the employee handbook.", results.len());
                RetrievalResponse { results, message }
            }
            Err(e) => {
                error!(tool = TOOL_NAME, error = %e, "tool call failed");
                RetrievalResponse::failed(e)
            }
        }
    }

    /// JSON in, JSON out, for agent frameworks that speak raw values.
    pub async fn call_json(&self, input: serde_json::Value) -> serde_json::Value {
        let response = match serde_json::from_value::<RetrievalRequest>(input) {
            Ok(request) => self.call(request).await,
            Err(e) => RetrievalResponse::failed(format!("invalid input: {}", e)),
        };
        serde_json::to_value(&response).unwrap_or_else(|e| {
            serde_json::json!({ "results": [], "message": format!("Search failed: {}", e) })
        })
    }
}
