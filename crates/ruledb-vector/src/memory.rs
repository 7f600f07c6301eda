//! Brute-force in-process [`IndexStore`], used by tests and offline runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use ruledb_core::traits::IndexStore;
use ruledb_core::types::{ChunkMetadata, DeleteOutcome, EntryId, QueryResult};
use ruledb_core::{Error, Result};

struct Collection {
    dimension: usize,
    /// Insertion order is kept so ties rank deterministically.
    entries: Vec<(EntryId, Vec<f32>, ChunkMetadata)>,
}

#[derive(Default)]
pub struct MemoryIndexStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    async fn create_index(&self, name: &str, dimension: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        match collections.get(name) {
            Some(c) if c.dimension != dimension => Err(Error::DimensionMismatch {
                collection: name.to_string(),
                expected: c.dimension,
                actual: dimension,
            }),
            Some(_) => Ok(()),
            None => {
                collections.insert(name.to_string(), Collection { dimension, entries: Vec::new() });
                Ok(())
            }
        }
    }

    async fn upsert(&self, name: &str, vectors: &[Vec<f32>], metadata: &[ChunkMetadata]) -> Result<usize> {
        if vectors.len() != metadata.len() {
            return Err(Error::Store(format!(
                "{} vectors but {} metadata entries",
                vectors.len(),
                metadata.len()
            )));
        }
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))?;
        if let Some(bad) = vectors.iter().find(|v| v.len() != collection.dimension) {
            return Err(Error::DimensionMismatch {
                collection: name.to_string(),
                expected: collection.dimension,
                actual: bad.len(),
            });
        }
        for (vector, meta) in vectors.iter().zip(metadata) {
            let id = meta.entry_id();
            match collection.entries.iter_mut().find(|entry| entry.0 == id) {
                Some(slot) => *slot = (id, vector.clone(), meta.clone()),
                None => collection.entries.push((id, vector.clone(), meta.clone())),
            }
        }
        Ok(vectors.len())
    }

    async fn query(&self, name: &str, vector: &[f32], top_k: usize) -> Result<Vec<QueryResult>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))?;
        if vector.len() != collection.dimension {
            return Err(Error::DimensionMismatch {
                collection: name.to_string(),
                expected: collection.dimension,
                actual: vector.len(),
            });
        }
        let mut results: Vec<QueryResult> = collection
            .entries
            .iter()
            .map(|(id, v, meta)| QueryResult {
                id: id.clone(),
                score: cosine_similarity(vector, v),
                metadata: meta.clone(),
            })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        Ok(results)
    }

    async fn delete_collection(&self, name: &str) -> Result<DeleteOutcome> {
        match self.collections.write().await.remove(name) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => {
                info!(collection = name, "collection absent, nothing to delete");
                Ok(DeleteOutcome::NotFound)
            }
        }
    }

    async fn count(&self, name: &str) -> Result<usize> {
        Ok(self.collections.read().await.get(name).map_or(0, |c| c.entries.len()))
    }
}
