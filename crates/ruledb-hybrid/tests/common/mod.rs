#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use ruledb_core::chunker::Chunker;
use ruledb_core::config::FailurePolicy;
use ruledb_core::loader::DocumentLoader;
use ruledb_core::planner::QueryPlanner;
use ruledb_core::traits::{Embedder, IndexStore};
use ruledb_core::types::{ChunkMetadata, DeleteOutcome, QueryResult};
use ruledb_core::{Error, Result};
use ruledb_embed::FakeEmbedder;
use ruledb_hybrid::{CollectionLocks, IndexingPipeline, IndexingTimeouts, RetrievalOptions, RetrievalPipeline};
use ruledb_vector::MemoryIndexStore;

pub const DIM: usize = 64;
pub const COLLECTION: &str = "employee_rules";

/// Counts `embed_many` calls and inputs; optionally sleeps first.
pub struct CountingEmbedder {
    inner: FakeEmbedder,
    pub calls: AtomicUsize,
    pub inputs: AtomicUsize,
    pub delay: Option<Duration>,
    pub fail: bool,
}

impl CountingEmbedder {
    pub fn new() -> Self {
        Self { inner: FakeEmbedder::new(DIM), calls: AtomicUsize::new(0), inputs: AtomicUsize::new(0), delay: None, fail: false }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        self.inner.embed_text(text)
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dim(&self) -> usize {
        DIM
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.fetch_add(texts.len(), Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if self.fail {
            return Err(Error::EmbeddingProvider("rate limited (HTTP 429)".into()));
        }
        self.inner.embed_many(texts).await
    }
}

/// Wraps [`MemoryIndexStore`], logging every operation and injecting faults.
#[derive(Default)]
pub struct ScriptedStore {
    pub inner: MemoryIndexStore,
    pub ops: Mutex<Vec<String>>,
    pub upsert_sizes: Mutex<Vec<usize>>,
    pub upsert_metadata: Mutex<Vec<ChunkMetadata>>,
    /// Queries with exactly this vector fail.
    pub poison: Mutex<Option<Vec<f32>>>,
    pub fail_all_queries: bool,
    pub fail_upsert: bool,
    pub query_delay: Option<Duration>,
    pub upsert_delay: Option<Duration>,
}

impl ScriptedStore {
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn log(&self, op: &str) {
        self.ops.lock().unwrap().push(op.to_string());
    }
}

#[async_trait]
impl IndexStore for ScriptedStore {
    async fn create_index(&self, name: &str, dimension: usize) -> Result<()> {
        self.log("create");
        self.inner.create_index(name, dimension).await
    }

    async fn upsert(&self, name: &str, vectors: &[Vec<f32>], metadata: &[ChunkMetadata]) -> Result<usize> {
        self.log("upsert:start");
        if let Some(d) = self.upsert_delay {
            tokio::time::sleep(d).await;
        }
        self.upsert_sizes.lock().unwrap().push(vectors.len());
        self.upsert_metadata.lock().unwrap().extend_from_slice(metadata);
        if self.fail_upsert {
            self.inner.upsert(name, &vectors[..1], &metadata[..1]).await?;
            self.log("upsert:fail");
            return Err(Error::Store("disk full".into()));
        }
        let n = self.inner.upsert(name, vectors, metadata).await;
        self.log("upsert:end");
        n
    }

    async fn query(&self, name: &str, vector: &[f32], top_k: usize) -> Result<Vec<QueryResult>> {
        if let Some(d) = self.query_delay {
            tokio::time::sleep(d).await;
        }
        let poisoned = self.poison.lock().unwrap().as_deref() == Some(vector);
        if self.fail_all_queries || poisoned {
            return Err(Error::Store("connection reset".into()));
        }
        self.inner.query(name, vector, top_k).await
    }

    async fn delete_collection(&self, name: &str) -> Result<DeleteOutcome> {
        self.log("delete");
        self.inner.delete_collection(name).await
    }

    async fn count(&self, name: &str) -> Result<usize> {
        self.inner.count(name).await
    }
}

pub fn indexing(embedder: Arc<dyn Embedder>, store: Arc<dyn IndexStore>) -> IndexingPipeline {
    indexing_with_loader(DocumentLoader::default(), embedder, store)
}

pub fn indexing_with_loader(
    loader: DocumentLoader,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn IndexStore>,
) -> IndexingPipeline {
    IndexingPipeline::new(
        loader,
        Chunker::default(),
        embedder,
        store,
        CollectionLocks::new(),
        IndexingTimeouts { embed: Duration::from_secs(5), store: Duration::from_secs(5) },
    )
}

pub fn retrieval(embedder: Arc<dyn Embedder>, store: Arc<dyn IndexStore>, policy: FailurePolicy) -> RetrievalPipeline {
    let options = RetrievalOptions { failure_policy: policy, timeout: Duration::from_secs(5), ..RetrievalOptions::default() };
    RetrievalPipeline::new(QueryPlanner::default(), embedder, store, COLLECTION, options)
}

pub fn write_doc(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

pub const LEAVE_DOC: &str = "Employees receive 5 days of annual leave after one year of service.";

/// A multi-chunk handbook: 24 numbered articles, each its own paragraph.
pub fn handbook() -> String {
    let topics = [
        "员工请假超过30天需要提前书面申请，并经部门主管批准。",
        "员工辞职应提前30天以书面形式通知公司。",
        "试用期为三个月，表现合格者按期转正。",
        "工资于每月十日发放，社保和公积金按规定缴纳。",
        "考勤实行打卡制度，迟到早退按规定处理。",
        "Employees receive 5 days of annual leave after one year of service.",
    ];
    let mut text = String::new();
    for i in 0..24 {
        let body = topics[i % topics.len()];
        text.push_str(&format!("第{}条 {}\n{}\n\n", i + 1, body, "细则说明。".repeat(20)));
    }
    text
}
