use std::sync::Arc;

use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use tracing::{debug, info};

use ruledb_core::traits::IndexStore;
use ruledb_core::types::{ChunkMetadata, DeleteOutcome, QueryResult};
use ruledb_core::{Error, Result};

use crate::schema::build_chunk_schema;
use crate::table::{
    create_chunk_table, distance_column, int_column, open_db, open_existing, store_err, string_column,
    table_dimension, table_exists,
};

const UPSERT_BATCH_SIZE: usize = 1000;

/// [`IndexStore`] over a local LanceDB directory; one table per collection.
pub struct LanceIndexStore {
    db: Connection,
    show_progress: bool,
}

impl LanceIndexStore {
    pub async fn connect(uri: &str) -> Result<Self> {
        let db = open_db(uri).await?;
        info!(uri, "opened LanceDB");
        Ok(Self { db, show_progress: false })
    }

    /// Draw a progress bar while upserting.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    async fn open_checked(&self, name: &str, dim: usize) -> Result<Table> {
        let table = open_existing(&self.db, name).await?;
        let expected = table_dimension(&table).await?;
        if dim != expected {
            return Err(Error::DimensionMismatch { collection: name.to_string(), expected, actual: dim });
        }
        Ok(table)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}",
        )
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }
}

fn to_record_batch(dim: usize, vectors: &[Vec<f32>], metadata: &[ChunkMetadata]) -> Result<RecordBatch> {
    let ids: Vec<String> = metadata.iter().map(ChunkMetadata::entry_id).collect();
    let texts: Vec<&str> = metadata.iter().map(|m| m.text.as_str()).collect();
    let sources: Vec<&str> = metadata.iter().map(|m| m.source.as_str()).collect();
    let chunk_indices = metadata.iter().map(|m| to_i32(m.chunk_index)).collect::<Result<Vec<_>>>()?;
    let total_chunks = metadata.iter().map(|m| to_i32(m.total_chunks)).collect::<Result<Vec<_>>>()?;
    let vectors = vectors.iter().map(|v| Some(v.iter().copied().map(Some).collect::<Vec<_>>()));

    RecordBatch::try_new(
        build_chunk_schema(dim),
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(sources)),
            Arc::new(Int32Array::from(chunk_indices)),
            Arc::new(Int32Array::from(total_chunks)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
                vectors,
                dim as i32,
            )),
        ],
    )
    .map_err(store_err)
}

fn to_i32(n: usize) -> Result<i32> {
    i32::try_from(n).map_err(|_| Error::Store(format!("chunk position {} exceeds i32", n)))
}

fn from_i32(n: i32) -> usize {
    usize::try_from(n).unwrap_or(0)
}

fn rows_to_results(batch: &RecordBatch, out: &mut Vec<QueryResult>) -> Result<()> {
    let ids = string_column(batch, "id")?;
    let texts = string_column(batch, "text")?;
    let sources = string_column(batch, "source")?;
    let chunk_indices = int_column(batch, "chunk_index")?;
    let totals = int_column(batch, "total_chunks")?;
    let distances = distance_column(batch)?;
    for i in 0..batch.num_rows() {
        out.push(QueryResult {
            id: ids.value(i).to_string(),
            score: 1.0 - distances.value(i),
            metadata: ChunkMetadata {
                text: texts.value(i).to_string(),
                source: sources.value(i).to_string(),
                chunk_index: from_i32(chunk_indices.value(i)),
                total_chunks: from_i32(totals.value(i)),
            },
        });
    }
    Ok(())
}

#[async_trait]
impl IndexStore for LanceIndexStore {
    async fn create_index(&self, name: &str, dimension: usize) -> Result<()> {
        if table_exists(&self.db, name).await? {
            self.open_checked(name, dimension).await?;
            debug!(collection = name, dimension, "collection already exists");
            return Ok(());
        }
        create_chunk_table(&self.db, name, dimension).await?;
        info!(collection = name, dimension, "created collection");
        Ok(())
    }

    async fn upsert(&self, name: &str, vectors: &[Vec<f32>], metadata: &[ChunkMetadata]) -> Result<usize> {
        if vectors.len() != metadata.len() {
            return Err(Error::Store(format!(
                "{} vectors but {} metadata entries",
                vectors.len(),
                metadata.len()
            )));
        }
        let table = open_existing(&self.db, name).await?;
        let dim = table_dimension(&table).await?;
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::DimensionMismatch { collection: name.to_string(), expected: dim, actual: bad.len() });
        }
        if vectors.is_empty() {
            return Ok(0);
        }

        let pb = self.progress_bar(vectors.len());
        let mut written = 0usize;
        for (vecs, metas) in vectors.chunks(UPSERT_BATCH_SIZE).zip(metadata.chunks(UPSERT_BATCH_SIZE)) {
            let batch = to_record_batch(dim, vecs, metas)?;
            let schema = batch.schema();
            let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
            let mut mi = table.merge_insert(&["id"]);
            mi.when_matched_update_all(None).when_not_matched_insert_all();
            mi.execute(reader).await.map_err(store_err)?;
            written += vecs.len();
            pb.set_position(written as u64);
        }
        pb.finish_with_message("upserted");
        info!(collection = name, written, "upserted entries");
        Ok(written)
    }

    async fn query(&self, name: &str, vector: &[f32], top_k: usize) -> Result<Vec<QueryResult>> {
        let table = self.open_checked(name, vector.len()).await?;
        if top_k == 0 || table.count_rows(None).await.map_err(store_err)? == 0 {
            return Ok(Vec::new());
        }
        let mut stream = table
            .vector_search(vector.to_vec())
            .map_err(store_err)?
            .distance_type(DistanceType::Cosine)
            .limit(top_k)
            .execute()
            .await
            .map_err(store_err)?;

        let mut results = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(store_err)? {
            rows_to_results(&batch, &mut results)?;
        }
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        debug!(collection = name, hits = results.len(), "vector query");
        Ok(results)
    }

    async fn delete_collection(&self, name: &str) -> Result<DeleteOutcome> {
        if !table_exists(&self.db, name).await? {
            info!(collection = name, "collection absent, nothing to delete");
            return Ok(DeleteOutcome::NotFound);
        }
        self.db.drop_table(name, &[]).await.map_err(store_err)?;
        info!(collection = name, "dropped collection");
        Ok(DeleteOutcome::Deleted)
    }

    async fn count(&self, name: &str) -> Result<usize> {
        if !table_exists(&self.db, name).await? {
            return Ok(0);
        }
        let table = open_existing(&self.db, name).await?;
        table.count_rows(None).await.map_err(store_err)
    }
}
