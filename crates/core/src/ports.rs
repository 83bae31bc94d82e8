//! Outbound capability ports (§6).
//!
//! These are the only surfaces the orchestrator depends on. Each is an
//! explicit `#[async_trait]` interface rather than a duck-typed protocol —
//! concrete adapters live in `horei-rag` and `horei-llm`, wired together
//! once at startup into a `Services` container (see [`crate::services`]).

use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::{Candidate, GraphResult};
use crate::error::Error;

/// A sparse (bag-of-terms) vector: parallel `indices`/`values` arrays.
#[derive(Debug, Clone, Default)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

/// Flat payload-field equality filters; all conditions conjoin (§4.4).
pub type SearchFilters = HashMap<String, String>;

/// Dense embedding model access.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Error>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Error>;

    /// Output dimensionality, used by adapters to validate configuration.
    fn dim(&self) -> usize;
}

/// Sparse (lexical) embedding model access, used for hybrid search.
#[async_trait]
pub trait SparseEmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<SparseVector, Error>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<SparseVector>, Error>;
}

/// Dense-only vector similarity search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<Candidate>, Error>;
}

/// Combined dense+sparse search with server-side Reciprocal Rank Fusion.
/// Implementations normalize the fused scores to `[0, 1]` before returning
/// (§9: "the hybrid store wrapper normalizes RRF scores to [0, 1] per
/// response") so they remain comparable to plain dense scores downstream.
#[async_trait]
pub trait HybridVectorStore: Send + Sync {
    async fn hybrid_search(
        &self,
        dense_vector: &[f32],
        sparse_vector: &SparseVector,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<Candidate>, Error>;
}

/// Cross-encoder rescoring of a candidate list. Absence (not configured, or
/// failed to load) is a `NonFatal` condition the orchestrator handles by
/// truncating without rescoring (§4.6).
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
        top_k: usize,
    ) -> Result<Vec<Candidate>, Error>;
}

/// Knowledge-graph lookups (§4.3). Every method is expected to recover
/// internally from individual query failures by returning an empty result
/// rather than propagating — `Result` here exists for the exceptional case
/// of the backend being unreachable at all, which the orchestrator treats
/// as NonFatal and downgrades `use_graph` for.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn find_article(
        &self,
        law_title_substring: &str,
        article_num: &str,
    ) -> Result<Option<GraphResult>, Error>;

    async fn find_related(
        &self,
        law_id: &str,
        article_num: &str,
        depth: u8,
        limit: usize,
    ) -> Result<Vec<GraphResult>, Error>;

    async fn keyword_search(&self, keyword: &str, limit: usize) -> Result<Vec<GraphResult>, Error>;
}

/// Generation parameters passed to the LLM provider.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: usize,
}

/// A single chat message in the generator's wire format.
#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmRole {
    System,
    User,
    Assistant,
}

/// Generative model access (§4.8).
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(
        &self,
        messages: &[LlmMessage],
        params: &GenerationParams,
    ) -> Result<String, Error>;

    /// Convenience wrapper building the system/user message pair from a
    /// prepared context block and the original query; the default
    /// implementation defers to [`LLMProvider::generate`].
    async fn generate_with_context(
        &self,
        query: &str,
        context: &str,
        params: &GenerationParams,
    ) -> Result<String, Error> {
        let messages = vec![
            LlmMessage {
                role: LlmRole::System,
                content: DEFAULT_SYSTEM_PROMPT.to_string(),
            },
            LlmMessage {
                role: LlmRole::User,
                content: format!("{}\n\n質問: {}", context, query),
            },
        ];
        self.generate(&messages, params).await
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "あなたは日本の法令について回答する法律アシスタントです。\
提供された条文の抜粋のみに基づいて回答し、関連する番号付きの出典を [n] の形式で引用してください。\
抜粋に答えがない場合は、その旨を明確に述べてください。";

/// Query translation/expansion access (§4.1). Absence/failure is NonFatal:
/// the caller falls back to the original text.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, Error>;

    /// Structured expansion: translated primary, alternative phrasings, and
    /// a keyword bundle. Returns at most the raw candidates the translator
    /// model produced; truncation to three total is the preparer's job.
    async fn expand(&self, text: &str) -> Result<Expansion, Error>;
}

/// The structured result of a query-expansion call (§4.1).
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub translated: String,
    pub keywords: Vec<String>,
    pub related_terms: Vec<String>,
    pub search_queries: Vec<String>,
}
