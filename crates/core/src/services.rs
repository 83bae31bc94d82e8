//! Process-wide capability container (§9: "Module-level singletons ...
//! replaced by an explicit Services container constructed once at startup").
//!
//! `Services` is assembled exactly once, typically in a binary's `main`,
//! and handed to the orchestrator by shared reference. Nothing in this
//! crate reaches for a global/lazy singleton to obtain a capability at
//! request time.

use std::sync::Arc;

use crate::ports::{
    EmbeddingProvider, GraphStore, HybridVectorStore, LLMProvider, Reranker,
    SparseEmbeddingProvider, Translator, VectorStore,
};

/// Shared, read-only (after construction) handles to every outbound port.
/// Optional ports (`graph`, `hybrid`, `reranker`) being `None` is how a
/// degraded process looks: the orchestrator checks for their presence
/// rather than calling through a capability that failed to load.
#[derive(Clone)]
pub struct Services {
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub sparse_embeddings: Option<Arc<dyn SparseEmbeddingProvider>>,
    pub vector_store: Arc<dyn VectorStore>,
    pub hybrid_store: Option<Arc<dyn HybridVectorStore>>,
    pub graph_store: Option<Arc<dyn GraphStore>>,
    pub reranker: Option<Arc<dyn Reranker>>,
    pub llm: Arc<dyn LLMProvider>,
    pub translator: Option<Arc<dyn Translator>>,
}

impl Services {
    pub fn use_hybrid(&self) -> bool {
        self.sparse_embeddings.is_some() && self.hybrid_store.is_some()
    }

    pub fn use_graph(&self) -> bool {
        self.graph_store.is_some()
    }

    pub fn use_reranker(&self) -> bool {
        self.reranker.is_some()
    }
}
