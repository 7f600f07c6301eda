//! Embedding providers: an OpenAI-compatible HTTP client and a deterministic
//! hashing embedder for tests and offline runs.

mod fake;
mod openai;

pub use fake::FakeEmbedder;
pub use openai::{ApiKey, OpenAiEmbedder};

use ruledb_core::config::{EmbeddingProviderKind, EmbeddingSettings};
use ruledb_core::traits::Embedder;
use ruledb_core::Result;
use tracing::info;

/// Build the configured provider. Credentials are validated here, before any request.
pub fn embedder_from_settings(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    let embedder: Box<dyn Embedder> = match settings.provider {
        EmbeddingProviderKind::OpenAi => Box::new(OpenAiEmbedder::from_settings(settings)?),
        EmbeddingProviderKind::Fake => Box::new(FakeEmbedder::new(settings.dimension)),
    };
    info!(model = embedder.model_id(), dim = embedder.dim(), "embedder ready");
    Ok(embedder)
}
