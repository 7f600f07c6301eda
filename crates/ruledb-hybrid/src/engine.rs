use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use ruledb_core::chunker::{Chunker, ChunkingConfig};
use ruledb_core::config::{expand_path, Settings};
use ruledb_core::keywords::{KeywordExtractor, Lexicon};
use ruledb_core::loader::DocumentLoader;
use ruledb_core::planner::QueryPlanner;
use ruledb_core::traits::{Embedder, IndexStore};
use ruledb_core::Result;
use ruledb_embed::embedder_from_settings;
use ruledb_vector::LanceIndexStore;

use crate::indexing::{IndexReport, IndexingPipeline, IndexingTimeouts};
use crate::locks::CollectionLocks;
use crate::retrieval::{RetrievalOptions, RetrievalPipeline, RetrievedChunk};
use crate::tool::RetrievalTool;

/// Both pipelines wired from one [`Settings`], sharing an embedder and store.
pub struct HybridSearchEngine {
    settings: Settings,
    store: Arc<dyn IndexStore>,
    indexing: IndexingPipeline,
    retrieval: Arc<RetrievalPipeline>,
}

impl HybridSearchEngine {
    /// LanceDB at `store.uri` plus the configured embedding provider.
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::from(embedder_from_settings(&settings.embedding)?);
        let uri = expand_path(&settings.store.uri);
        let store = LanceIndexStore::connect(&uri.to_string_lossy()).await?.with_progress(true);
        Self::with_components(settings, embedder, Arc::new(store))
    }

    pub fn with_components(settings: Settings, embedder: Arc<dyn Embedder>, store: Arc<dyn IndexStore>) -> Result<Self> {
        settings.validate()?;
        let chunker = Chunker::new(ChunkingConfig::from(&settings.chunking))?;
        let planner = QueryPlanner::new(KeywordExtractor::new(Lexicon::from_settings(&settings.keywords)?));
        let timeouts = IndexingTimeouts { embed: settings.embedding.timeout(), store: settings.store.timeout() };

        let indexing = IndexingPipeline::new(
            DocumentLoader::from_settings(&settings.document),
            chunker,
            embedder.clone(),
            store.clone(),
            CollectionLocks::new(),
            timeouts,
        );
        let retrieval = Arc::new(RetrievalPipeline::new(
            planner,
            embedder.clone(),
            store.clone(),
            settings.store.collection.clone(),
            RetrievalOptions::from(&settings.retrieval),
        ));
        info!(collection = %settings.store.collection, model = embedder.model_id(), "engine ready");
        Ok(Self { settings, store, indexing, retrieval })
    }

    pub fn collection(&self) -> &str {
        &self.settings.store.collection
    }

    pub fn document_base(&self) -> PathBuf {
        expand_path(&self.settings.document.base_path)
    }

    /// Index the document at `document.base_path` (`.txt` preferred over `.pdf`).
    pub async fn index_configured_document(&self) -> Result<Option<IndexReport>> {
        self.indexing.index_from_base(&self.document_base(), self.collection()).await
    }

    pub async fn index_file(&self, path: &Path) -> Result<IndexReport> {
        self.indexing.index_document(path, self.collection()).await
    }

    /// `top_k` defaults to `retrieval.default_top_k` and is capped at `retrieval.max_top_k`.
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Result<Vec<RetrievedChunk>> {
        let top_k = self.tool().effective_top_k(top_k);
        self.retrieval.retrieve(query, top_k).await
    }

    pub fn tool(&self) -> RetrievalTool {
        RetrievalTool::new(
            self.retrieval.clone(),
            self.settings.retrieval.default_top_k,
            self.settings.retrieval.max_top_k,
        )
    }

    /// Number of entries in the configured collection.
    pub async fn status(&self) -> Result<usize> {
        self.store.count(self.collection()).await
    }
}
