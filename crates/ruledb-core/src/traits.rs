use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChunkMetadata, DeleteOutcome, QueryResult};

/// Converts texts into fixed-dimension vectors.
///
/// `embed_many` is one logical batch: the output has the same length and
/// order as `texts`, and any failure fails the whole batch.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier of the provider/model, e.g. `openai:text-embedding-3-small`.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// A named vector collection backend.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Create `name` if absent. An existing collection with the same
    /// dimension is left untouched; a different dimension is a
    /// `DimensionMismatch`.
    async fn create_index(&self, name: &str, dimension: usize) -> Result<()>;

    /// Insert or replace one entry per `(vector, metadata)` pair. Entry ids
    /// come from [`ChunkMetadata::entry_id`]. Returns the number written.
    async fn upsert(&self, name: &str, vectors: &[Vec<f32>], metadata: &[ChunkMetadata]) -> Result<usize>;

    /// Up to `top_k` entries, best match first (descending score).
    async fn query(&self, name: &str, vector: &[f32], top_k: usize) -> Result<Vec<QueryResult>>;

    /// Drop the collection. Missing collections report `NotFound`, never an error.
    async fn delete_collection(&self, name: &str) -> Result<DeleteOutcome>;

    /// Number of entries; 0 for a missing collection.
    async fn count(&self, name: &str) -> Result<usize>;
}

/// Extracts plain text from a non-text document format (e.g. PDF).
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String>;
}
