use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetrievalError>;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Empty corpus: no fragments could be embedded from {}", .0.display())]
    EmptyCorpus(PathBuf),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Vector dimension mismatch at position {position}: expected {expected}, found {found}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        found: usize,
    },

    #[error("Storage error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Index is not loaded; call load_or_build or install before searching")]
    NotReady,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod encoding;
pub mod engine;
pub mod index;
pub mod indexer;
pub mod store;

pub use embeddings::Embedder;
pub use engine::{RetrievalEngine, SearchHit};
pub use index::{Neighbor, VectorIndex};
pub use indexer::{IndexBuilder, IndexingStats};
pub use store::{IndexSnapshot, IndexStore, StoredFragment};
