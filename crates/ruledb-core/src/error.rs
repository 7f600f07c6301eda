use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Stage of an indexing run, carried by [`Error::Indexing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStage {
    Load,
    Embed,
    Replace,
    Upsert,
}

impl fmt::Display for IndexStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexStage::Load => "load",
            IndexStage::Embed => "embed",
            IndexStage::Replace => "replace",
            IndexStage::Upsert => "upsert",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported document format '{extension}': {path}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Could not decode text: {0}")]
    Decode(String),

    #[error("Embedding provider failed: {0}")]
    EmbeddingProvider(String),

    #[error("Dimension mismatch in '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch { collection: String, expected: usize, actual: usize },

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Retrieval source {variant} failed: {reason}")]
    RetrievalSource { variant: usize, reason: String },

    #[error("No retrieval source produced a ranked list")]
    EmptyFusionInput,

    #[error("Index store failed: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Indexing {path} failed at stage '{stage}': {source}")]
    Indexing {
        path: PathBuf,
        stage: IndexStage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap `self` with the document path and the stage it failed in.
    pub fn at_stage(self, path: impl Into<PathBuf>, stage: IndexStage) -> Self {
        Error::Indexing { path: path.into(), stage, source: Box::new(self) }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
