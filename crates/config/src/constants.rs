//! Centralized, domain-agnostic constants.
//!
//! These are compiled-in fallbacks for values that also exist as validated
//! `Settings` fields (§4.11). Prefer `Settings` in request-path code; reach
//! for these only where a default needs to exist before any config has
//! loaded (e.g. a `Default` impl).

/// Service endpoints (env-overridable with a fallback default).
pub mod endpoints {
    use once_cell::sync::Lazy;

    /// Qdrant vector store endpoint (env: QDRANT_URL).
    pub static QDRANT_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6333".to_string())
    });

    /// Neo4j Bolt endpoint (env: NEO4J_URL).
    pub static NEO4J_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("NEO4J_URL").unwrap_or_else(|_| "bolt://127.0.0.1:7687".to_string())
    });

    /// LLM chat-completions endpoint (env: LLM_API_BASE).
    pub static LLM_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("LLM_API_BASE").unwrap_or_else(|_| "http://localhost:11434".to_string())
    });
}

/// Retrieval/fusion/reranker tuning defaults.
///
/// These exist as compiled-in fallbacks only; the authoritative, validated
/// values live on `RagSettings` (§4.11, §9: "constants vs configuration —
/// resolved as configuration").
pub mod rag {
    /// Weight for dense (semantic) search vs sparse (lexical) search.
    pub const DENSE_WEIGHT: f64 = 0.65;

    /// Minimum fused score to include a result (§4.5).
    pub const MIN_SCORE_THRESHOLD: f64 = 0.25;

    /// Graph relevance multiplier applied before max-merge (§3, §4.5).
    pub const GRAPH_WEIGHT: f64 = 1.2;

    /// Default number of final results after fusion/rerank.
    pub const DEFAULT_TOP_K: usize = 10;

    /// Multiplier applied to top_k to decide how many candidates to pull
    /// per retriever before fusion/filter/rerank narrows back down (§8
    /// scenario 2 references this indirectly via "retrieve_k").
    pub const RETRIEVAL_MULTIPLIER: usize = 4;

    /// Reciprocal Rank Fusion k parameter.
    pub const RRF_K: f32 = 60.0;

    /// Prefilter threshold for the reranker's cascaded strategy.
    pub const PREFILTER_THRESHOLD: f32 = 0.15;

    /// Early termination confidence threshold for the reranker.
    pub const EARLY_TERMINATION_THRESHOLD: f32 = 0.88;

    /// Minimum high-confidence results before early termination.
    pub const EARLY_TERMINATION_MIN_RESULTS: usize = 2;

    /// Maximum docs run through a full cross-encoder model per request.
    pub const MAX_FULL_MODEL_DOCS: usize = 10;

    /// Auto-category-detection confidence threshold (§4.4).
    pub const CATEGORY_DETECTION_THRESHOLD: f32 = 0.5;

    /// Corpus-language detection ratio threshold (§4.1).
    pub const LANGUAGE_DETECTION_THRESHOLD: f64 = 0.5;
}

/// Timeouts (§5).
pub mod timeouts {
    use std::time::Duration;

    pub const GRAPH_QUERY: Duration = Duration::from_secs(5);
    pub const VECTOR_QUERY: Duration = Duration::from_secs(8);
    pub const RERANK_CALL: Duration = Duration::from_secs(15);
    pub const GENERATOR_CALL: Duration = Duration::from_secs(30);
}

/// Retry budget for transient I/O failures (§4.4, §7).
pub mod retry {
    use std::time::Duration;

    pub const MAX_ATTEMPTS: u32 = 3;
    pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
    pub const MAX_BACKOFF: Duration = Duration::from_secs(4);
}

/// Backpressure / fan-out caps (§5).
pub mod concurrency {
    /// Expansion fan-out is capped at 3 concurrent searches.
    pub const MAX_CONCURRENT_EXPANSIONS: usize = 3;

    /// Maximum search texts in a plan (primary + alternates + keyword join).
    pub const MAX_SEARCH_TEXTS: usize = 3;

    /// Bounded depth for REFERENCES-edge traversal (§4.3, §9).
    pub const MAX_GRAPH_DEPTH: u8 = 2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rag_weights_in_unit_range() {
        assert!(rag::DENSE_WEIGHT >= 0.0 && rag::DENSE_WEIGHT <= 1.0);
        assert!(rag::MIN_SCORE_THRESHOLD >= 0.0 && rag::MIN_SCORE_THRESHOLD <= 1.0);
    }

    #[test]
    fn retry_backoff_ordered() {
        assert!(retry::INITIAL_BACKOFF <= retry::MAX_BACKOFF);
    }
}
