//! Core domain types, error taxonomy and capability-port traits shared by
//! every stage of the retrieval-and-composition pipeline.
//!
//! This crate has no knowledge of Qdrant, Neo4j, or any particular LLM
//! vendor — those live in `horei-rag` and `horei-llm` as adapters
//! implementing the traits in [`ports`].

pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

pub use domain::{
    Answer, CandidateSource, Candidate, ChatOptions, ContextBlock, EntityKind, GraphResult,
    Query, QueryType, RoutedQuery, SourceDocument, Toggle, SOURCE_TEXT_DISPLAY_CAP,
};
pub use error::{Error, Result};
pub use ports::{
    EmbeddingProvider, Expansion, GenerationParams, GraphStore, HybridVectorStore, LLMProvider,
    LlmMessage, LlmRole, Reranker, SearchFilters, SparseEmbeddingProvider, SparseVector,
    Translator, VectorStore,
};
pub use services::Services;
