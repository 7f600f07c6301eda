//! Query → variants → one batched embed → concurrent per-variant store
//! queries → Reciprocal Rank Fusion → top-K.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, try_join_all};
use serde::Serialize;
use tracing::{debug, info, warn};

use ruledb_core::config::{FailurePolicy, RetrievalSettings};
use ruledb_core::fusion::reciprocal_rank_fusion;
use ruledb_core::planner::QueryPlanner;
use ruledb_core::traits::{Embedder, IndexStore};
use ruledb_core::types::{ChunkMetadata, QueryResult};
use ruledb_core::{Error, Result};

use crate::timeout::bounded;

#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub rrf_k: u32,
    /// Candidates per variant are `overfetch * top_k`.
    pub overfetch: usize,
    pub failure_policy: FailurePolicy,
    /// Budget for each external call (the embed batch and every store query).
    pub timeout: Duration,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self::from(&RetrievalSettings::default())
    }
}

impl From<&RetrievalSettings> for RetrievalOptions {
    fn from(s: &RetrievalSettings) -> Self {
        Self { rrf_k: s.rrf_k, overfetch: s.overfetch.max(1), failure_policy: s.failure_policy, timeout: s.timeout() }
    }
}

/// A fused hit with its original metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    /// 1-based position in the fused ranking.
    pub rank: usize,
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Aggregate RRF score.
    pub score: f64,
    /// Store similarity of the first occurrence.
    pub similarity: f32,
}

pub struct RetrievalPipeline {
    planner: QueryPlanner,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn IndexStore>,
    collection: String,
    options: RetrievalOptions,
}

impl RetrievalPipeline {
    pub fn new(
        planner: QueryPlanner,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn IndexStore>,
        collection: impl Into<String>,
        options: RetrievalOptions,
    ) -> Self {
        Self { planner, embedder, store, collection: collection.into(), options }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// An empty `Ok` means nothing relevant was found; failures are `Err`.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let variants = self.planner.plan(query);
        let texts: Vec<String> = variants.iter().map(|v| v.text.clone()).collect();
        debug!(?texts, "planned query variants");

        let vectors = bounded(self.options.timeout, self.embedder.embed_many(&texts), || {
            Error::EmbeddingProvider(format!("embedding timed out after {:?}", self.options.timeout))
        })
        .await?;
        if vectors.len() != texts.len() {
            return Err(Error::EmbeddingProvider(format!(
                "expected {} query embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        let candidates = top_k.saturating_mul(self.options.overfetch);
        let queries = vectors.iter().enumerate().map(|(variant, v)| self.query_variant(variant, v, candidates));
        let lists: Vec<Vec<QueryResult>> = match self.options.failure_policy {
            FailurePolicy::FailFast => try_join_all(queries).await?,
            FailurePolicy::Degrade => join_all(queries)
                .await
                .into_iter()
                .filter_map(|r| match r {
                    Ok(list) => Some(list),
                    Err(e) => {
                        warn!(error = %e, "dropping failed retrieval source");
                        None
                    }
                })
                .collect(),
        };

        let fused = reciprocal_rank_fusion(&lists, self.options.rrf_k)?;
        let results: Vec<RetrievedChunk> = fused
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(i, f)| RetrievedChunk {
                rank: i + 1,
                id: f.id,
                text: f.item.metadata.text.clone(),
                similarity: f.item.score,
                metadata: f.item.metadata,
                score: f.score,
            })
            .collect();
        info!(
            variants = variants.len(),
            sources = lists.len(),
            returned = results.len(),
            top_k,
            "retrieval complete"
        );
        Ok(results)
    }

    async fn query_variant(&self, variant: usize, vector: &[f32], candidates: usize) -> Result<Vec<QueryResult>> {
        let limit = self.options.timeout;
        let hits = bounded(limit, self.store.query(&self.collection, vector, candidates), || {
            Error::Store(format!("query timed out after {:?}", limit))
        })
        .await
        .map_err(|e| Error::RetrievalSource { variant, reason: e.to_string() })?;
        debug!(variant, hits = hits.len(), "retrieval source finished");
        Ok(hits)
    }
}
