//! Indexing and hybrid retrieval pipelines over the core components.

pub mod engine;
pub mod indexing;
pub mod locks;
pub mod retrieval;
mod timeout;
pub mod tool;

pub use engine::HybridSearchEngine;
pub use indexing::{IndexReport, IndexingPipeline, IndexingTimeouts};
pub use locks::CollectionLocks;
pub use retrieval::{RetrievalOptions, RetrievalPipeline, RetrievedChunk};
pub use tool::{RetrievalRequest, RetrievalResponse, RetrievalTool};
