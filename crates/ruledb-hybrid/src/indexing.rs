//! Load → chunk → embed → replace the collection → upsert.
//!
//! Embedding happens before the collection lock is taken, so a slow or
//! failing provider never leaves the collection missing. The replace/upsert
//! section runs under the per-collection lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use ruledb_core::chunker::Chunker;
use ruledb_core::loader::{resolve_document, DocumentLoader};
use ruledb_core::traits::{Embedder, IndexStore};
use ruledb_core::types::{Chunk, ChunkMetadata};
use ruledb_core::{Error, IndexStage, Result};

use crate::locks::CollectionLocks;
use crate::timeout::bounded;

#[derive(Debug, Clone, Copy)]
pub struct IndexingTimeouts {
    pub embed: Duration,
    pub store: Duration,
}

impl Default for IndexingTimeouts {
    fn default() -> Self {
        Self { embed: Duration::from_secs(30), store: Duration::from_secs(10) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub path: PathBuf,
    pub collection: String,
    pub chunks: usize,
    pub written: usize,
    pub embedding_model: String,
}

pub struct IndexingPipeline {
    loader: DocumentLoader,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn IndexStore>,
    locks: CollectionLocks,
    timeouts: IndexingTimeouts,
}

impl IndexingPipeline {
    pub fn new(
        loader: DocumentLoader,
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn IndexStore>,
        locks: CollectionLocks,
        timeouts: IndexingTimeouts,
    ) -> Self {
        Self { loader, chunker, embedder, store, locks, timeouts }
    }

    /// Index `<base>.txt` (or `<base>.pdf`). `Ok(None)` when neither exists.
    pub async fn index_from_base(&self, base: &Path, collection: &str) -> Result<Option<IndexReport>> {
        match resolve_document(base) {
            Some(path) => self.index_document(&path, collection).await.map(Some),
            None => {
                info!(base = %base.display(), "no .txt or .pdf document found, nothing to index");
                Ok(None)
            }
        }
    }

    /// Replace `collection` with the chunks of the document at `path`.
    pub async fn index_document(&self, path: &Path, collection: &str) -> Result<IndexReport> {
        let document = self.loader.load(path).map_err(|e| e.at_stage(path, IndexStage::Load))?;
        let chunks = self.chunker.chunk_document(&document);
        info!(path = %path.display(), chunks = chunks.len(), "chunked document");

        let vectors = self.embed_chunks(&chunks).await.map_err(|e| e.at_stage(path, IndexStage::Embed))?;
        let metadata: Vec<ChunkMetadata> = chunks.iter().map(Chunk::metadata).collect();

        let _guard = self.locks.acquire(collection).await;
        self.replace(collection).await.map_err(|e| e.at_stage(path, IndexStage::Replace))?;

        let written = if metadata.is_empty() {
            0
        } else {
            match self.store_call(self.store.upsert(collection, &vectors, &metadata), "upsert").await {
                Ok(n) => n,
                Err(e) => {
                    self.discard(collection).await;
                    return Err(e.at_stage(path, IndexStage::Upsert));
                }
            }
        };

        info!(path = %path.display(), collection, written, "indexing complete");
        Ok(IndexReport {
            path: path.to_path_buf(),
            collection: collection.to_string(),
            chunks: chunks.len(),
            written,
            embedding_model: self.embedder.model_id().to_string(),
        })
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let limit = self.timeouts.embed;
        let vectors = bounded(limit, self.embedder.embed_many(&texts), || {
            Error::EmbeddingProvider(format!("embedding timed out after {:?}", limit))
        })
        .await?;
        if vectors.len() != texts.len() {
            return Err(Error::EmbeddingProvider(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    /// Delete before create: a failure here leaves no collection rather than a stale one.
    async fn replace(&self, collection: &str) -> Result<()> {
        let outcome = self.store_call(self.store.delete_collection(collection), "delete").await?;
        info!(collection, ?outcome, "cleared collection");
        self.store_call(self.store.create_index(collection, self.embedder.dim()), "create").await
    }

    async fn discard(&self, collection: &str) {
        if let Err(e) = self.store_call(self.store.delete_collection(collection), "delete").await {
            warn!(collection, error = %e, "could not remove partially written collection");
        }
    }

    async fn store_call<T>(&self, fut: impl std::future::Future<Output = Result<T>>, op: &str) -> Result<T> {
        let limit = self.timeouts.store;
        bounded(limit, fut, || Error::Store(format!("{} timed out after {:?}", op, limit))).await
    }
}
