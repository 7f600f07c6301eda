use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ruledb_core::config::EmbeddingSettings;
use ruledb_core::traits::Embedder;
use ruledb_core::{Error, Result};

/// Inputs per HTTP request; larger batches are split and concatenated.
const MAX_INPUTS_PER_REQUEST: usize = 256;

/// Bearer credential. Only printable ASCII is accepted.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(raw: &str) -> Result<Self> {
        let key = raw.trim();
        if key.is_empty() {
            return Err(Error::InvalidConfig("embedding.api_key is empty".into()));
        }
        if !key.chars().all(|c| c.is_ascii_graphic()) {
            return Err(Error::InvalidConfig(
                "embedding.api_key must contain only printable ASCII characters".into(),
            ));
        }
        Ok(Self(key.to_string()))
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `POST {base_url}/embeddings` endpoint.
#[derive(Debug)]
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    model: String,
    model_id: String,
    api_key: ApiKey,
    dim: usize,
}

impl OpenAiEmbedder {
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let api_key = ApiKey::new(&settings.api_key)?;
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| Error::EmbeddingProvider(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            model_id: format!("openai:{}", settings.model),
            api_key,
            dim: settings.dimension,
        })
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(&EmbeddingsRequest { model: &self.model, input })
            .send()
            .await
            .map_err(|e| Error::EmbeddingProvider(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "embedding request rejected");
            return Err(Error::EmbeddingProvider(describe_status(status, &body)));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| Error::EmbeddingProvider(format!("malformed response: {}", e)))?;
        self.order_by_index(parsed, input.len())
    }

    fn order_by_index(&self, mut parsed: EmbeddingsResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
        if parsed.data.len() != expected {
            return Err(Error::EmbeddingProvider(format!(
                "malformed response: expected {} embeddings, got {}",
                expected,
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        let mut out = Vec::with_capacity(expected);
        for (position, item) in parsed.data.into_iter().enumerate() {
            if item.index != position {
                return Err(Error::EmbeddingProvider(format!(
                    "malformed response: missing embedding for input {}",
                    position
                )));
            }
            if item.embedding.len() != self.dim {
                return Err(Error::EmbeddingProvider(format!(
                    "malformed response: embedding has dimension {}, expected {}",
                    item.embedding.len(),
                    self.dim
                )));
            }
            out.push(item.embedding);
        }
        Ok(out)
    }
}

fn describe_status(status: StatusCode, body: &str) -> String {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            format!("authentication rejected (HTTP {})", status.as_u16())
        }
        StatusCode::TOO_MANY_REQUESTS => "rate limited (HTTP 429)".to_string(),
        _ => format!("HTTP {}: {}", status.as_u16(), body.trim()),
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_INPUTS_PER_REQUEST) {
            debug!(model = %self.model, inputs = batch.len(), "requesting embeddings");
            vectors.extend(self.request(batch).await?);
        }
        Ok(vectors)
    }
}
