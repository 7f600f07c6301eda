//! Domain types shared by the loader, chunker, stores and pipelines.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub type EntryId = String;

/// A source document read into memory. Lives only for one indexing run.
#[derive(Debug, Clone)]
pub struct Document {
    /// Short source identifier stored with every chunk (the file name).
    pub source: String,
    pub path: PathBuf,
    pub text: String,
}

/// A bounded segment of a [`Document`], the unit of embedding and storage.
///
/// - `chunk_index`/`total_chunks`: position within the parent document,
///   `0 <= chunk_index < total_chunks`
/// - all chunks of one run share the same `total_chunks`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

impl Chunk {
    pub fn id(&self) -> EntryId {
        entry_id(&self.source, self.chunk_index)
    }

    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            text: self.text.clone(),
            source: self.source.clone(),
            chunk_index: self.chunk_index,
            total_chunks: self.total_chunks,
        }
    }
}

/// Identity of a stored entry: unique within a single-document collection.
pub fn entry_id(source: &str, chunk_index: usize) -> EntryId {
    format!("{}:{}", source, chunk_index)
}

/// The durable per-entry schema. Downstream readers treat `text` as the
/// primary content field, so field names must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub text: String,
    pub source: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

impl ChunkMetadata {
    pub fn entry_id(&self) -> EntryId {
        entry_id(&self.source, self.chunk_index)
    }
}

/// One hit returned by an index store query.
///
/// `score` is a similarity where higher is always better
/// (`1 - cosine_distance`). Rank is the position in the result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: EntryId,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// Outcome of deleting a collection. A missing collection is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}
