//! Retrieval-and-composition core: routing, graph/vector fusion, reranking,
//! and context building (§4).

pub mod context;
pub mod fusion;
pub mod graph;
pub mod orchestrator;
pub mod reranker;
pub mod retry;
pub mod router;
pub mod sparse;
pub mod translator;
pub mod vector_store;

pub use context::ContextBuilder;
pub use fusion::fuse;
pub use graph::Neo4jGraphStore;
pub use orchestrator::Orchestrator;
pub use reranker::{LexicalReranker, RerankerConfig};
pub use retry::with_retry;
pub use router::QueryRouter;
pub use sparse::HashingSparseEmbeddingProvider;
pub use translator::QueryPreparer;
pub use vector_store::QdrantVectorStore;

use thiserror::Error;

use horei_core::Error as CoreError;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("embedding provider error: {0}")]
    Embedding(String),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("graph store error: {0}")]
    GraphStore(String),

    #[error("reranker error: {0}")]
    Reranker(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("all retrieval paths returned no candidates")]
    RetrievalEmpty,

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl From<RagError> for CoreError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::InvalidInput(msg) => CoreError::input(msg),
            RagError::Embedding(msg) => CoreError::transient(msg),
            RagError::VectorStore(msg) => CoreError::transient(msg),
            RagError::GraphStore(msg) => CoreError::transient(msg),
            RagError::Reranker(msg) => CoreError::transient(msg),
            RagError::Connection(msg) => CoreError::transient(msg),
            RagError::RetrievalEmpty => CoreError::fatal("all retrievers returned empty"),
            RagError::Timeout(msg) => CoreError::Timeout(msg),
            RagError::Cancelled => CoreError::Cancelled,
        }
    }
}
