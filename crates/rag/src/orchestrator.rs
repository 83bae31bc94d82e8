//! Pipeline orchestration (§4.9, §5).
//!
//! Drives a single chat request through
//! `PREPARED -> ROUTED -> RETRIEVING -> FUSED -> (RERANKED)? -> GENERATED -> DONE`,
//! fanning graph and vector retrieval out concurrently and checking a
//! cancellation token at every suspension point rather than only at the
//! start, so a client disconnect stops in-flight work promptly.

use std::time::Instant;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use horei_config::constants::timeouts;
use horei_config::RagSettings;
use horei_core::{Answer, ChatOptions, Error as CoreError, GenerationParams, Services, SparseVector};

use crate::context::ContextBuilder;
use crate::fusion::fuse;
use crate::retry::with_retry;
use crate::router::QueryRouter;
use crate::translator::QueryPreparer;
use crate::RagError;

/// Upper bound on concurrently in-flight vector searches across the
/// expanded search-text plan (§5: "capped at 3 concurrent per-expansion
/// vector tasks").
const MAX_CONCURRENT_EXPANSIONS: usize = 3;

/// Depth passed to `GraphStore::find_related` for multi-hop routing.
const MULTI_HOP_DEPTH: u8 = 2;

/// How many related articles to request per multi-hop traversal.
const MULTI_HOP_LIMIT: usize = 10;

/// Valid `top_k` range for an inbound request (§6).
const MIN_TOP_K: usize = 1;
const MAX_TOP_K: usize = 50;

pub struct Orchestrator {
    services: Services,
    settings: RagSettings,
    router: QueryRouter,
    preparer: QueryPreparer,
}

impl Orchestrator {
    pub fn new(services: Services, settings: RagSettings) -> Self {
        let preparer = QueryPreparer::new(services.translator.clone());
        Self {
            services,
            settings,
            router: QueryRouter::new(),
            preparer,
        }
    }

    pub async fn chat(
        &self,
        raw_query: &str,
        options: ChatOptions,
        cancel: CancellationToken,
    ) -> Result<Answer, CoreError> {
        let start = Instant::now();

        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        if !(MIN_TOP_K..=MAX_TOP_K).contains(&options.top_k) {
            return Err(CoreError::input(format!(
                "top_k must be in {MIN_TOP_K}..={MAX_TOP_K}, got {}",
                options.top_k
            )));
        }

        // PREPARED
        let use_hybrid = options.use_hybrid.resolve(self.settings.use_hybrid_search);
        let use_multi_query = options.use_multi_query.resolve(true);
        let query = self
            .preparer
            .prepare(
                raw_query,
                options.top_k,
                options.filters.clone(),
                true,
                use_hybrid,
                use_multi_query,
            )
            .await
            .map_err(CoreError::from)?;

        // ROUTED
        let routed = self.router.route(&query.primary_search_text);
        let use_graph = options.use_graph.resolve(routed.use_graph) && self.services.use_graph();
        let use_vector = routed.use_vector;

        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        // RETRIEVING: graph and vector fan out concurrently.
        let retrieval_top_k = query.top_k * self.settings.retrieval_multiplier.max(1);
        let (graph_results, vector_candidates) = tokio::join!(
            self.retrieve_graph(&routed, use_graph, retrieval_top_k, &cancel),
            self.retrieve_vector(&query, use_vector, retrieval_top_k, &cancel),
        );

        let graph_results = graph_results?;
        let vector_candidates = vector_candidates?;

        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        // FUSED
        let fused = fuse(
            graph_results,
            vector_candidates,
            self.settings.graph_weight,
            self.settings.min_score_threshold,
        );

        if fused.is_empty() {
            return Err(RagError::RetrievalEmpty.into());
        }

        // RERANKED (optional degradation, never fatal)
        let ranked = if self.services.use_reranker() {
            match self
                .services
                .reranker
                .as_ref()
                .unwrap()
                .rerank(&query.primary_search_text, fused.clone(), query.top_k)
                .await
            {
                Ok(reranked) if !reranked.is_empty() => reranked,
                Ok(_) => {
                    tracing::warn!("reranker returned no candidates, falling back to fused order");
                    fused.into_iter().take(query.top_k).collect()
                }
                Err(err) => {
                    tracing::warn!(error = %err, "reranker failed, falling back to fused order");
                    fused.into_iter().take(query.top_k).collect()
                }
            }
        } else {
            fused.into_iter().take(query.top_k).collect::<Vec<_>>()
        };

        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        // GENERATED
        let context = ContextBuilder::build(&ranked);
        let params = GenerationParams {
            temperature: 0.3,
            max_tokens: 1024,
        };
        let answer_text = self
            .services
            .llm
            .generate_with_context(&query.original_text, &context, &params)
            .await?;

        // DONE
        Ok(Answer {
            answer_text,
            sources: ContextBuilder::sources(&ranked),
            query: query.original_text,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn retrieve_graph(
        &self,
        routed: &horei_core::RoutedQuery,
        use_graph: bool,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<horei_core::GraphResult>, CoreError> {
        if !use_graph || cancel.is_cancelled() {
            return Ok(Vec::new());
        }
        let Some(graph_store) = &self.services.graph_store else {
            return Ok(Vec::new());
        };

        let mut results = Vec::new();
        for (entity, kind) in &routed.entities {
            if cancel.is_cancelled() {
                break;
            }
            match kind {
                horei_core::EntityKind::LawArticle => {
                    if let Some((law_title, article_num)) = split_law_article(entity) {
                        let found = with_retry(timeouts::GRAPH_QUERY, || {
                            graph_store.find_article(law_title, article_num)
                        })
                        .await;
                        if let Ok(Some(article)) = found {
                            let law_id = article.law_id.clone();
                            let article_num = article.article_num.clone();
                            results.push(article);
                            if matches!(routed.query_type, horei_core::QueryType::MultiHop) {
                                let related = with_retry(timeouts::GRAPH_QUERY, || {
                                    graph_store.find_related(&law_id, &article_num, MULTI_HOP_DEPTH, MULTI_HOP_LIMIT)
                                })
                                .await;
                                if let Ok(related) = related {
                                    results.extend(related);
                                }
                            }
                        }
                    }
                }
                horei_core::EntityKind::Article | horei_core::EntityKind::Law => {
                    let hits = with_retry(timeouts::GRAPH_QUERY, || graph_store.keyword_search(entity, limit)).await;
                    if let Ok(keyword_hits) = hits {
                        results.extend(keyword_hits);
                    }
                }
            }
        }
        Ok(results)
    }

    async fn retrieve_vector(
        &self,
        query: &horei_core::Query,
        use_vector: bool,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<horei_core::Candidate>, CoreError> {
        if !use_vector || cancel.is_cancelled() {
            return Ok(Vec::new());
        }

        let search_texts = query.search_plan();
        if search_texts.is_empty() {
            return Ok(Vec::new());
        }

        // One batched embed call per provider per request, independent of
        // how many expansion search texts there are (§4.4).
        let dense_vectors =
            with_retry(timeouts::VECTOR_QUERY, || self.services.embeddings.embed_batch(search_texts)).await?;

        let sparse_vectors = if self.services.use_hybrid() {
            let sparse_provider = self.services.sparse_embeddings.as_ref().unwrap();
            let vectors =
                with_retry(timeouts::VECTOR_QUERY, || sparse_provider.embed_batch(search_texts)).await?;
            Some(vectors)
        } else {
            None
        };

        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let mut all_candidates = Vec::new();
        let mut attempted = 0usize;
        let mut succeeded = 0usize;

        let indices: Vec<usize> = (0..dense_vectors.len()).collect();
        for chunk in indices.chunks(MAX_CONCURRENT_EXPANSIONS) {
            if cancel.is_cancelled() {
                break;
            }
            let futures = chunk.iter().map(|&i| {
                let sparse_vector = sparse_vectors.as_ref().map(|v| &v[i]);
                self.search_with_vectors(&dense_vectors[i], sparse_vector, &query.filters, top_k)
            });
            for result in join_all(futures).await {
                attempted += 1;
                match result {
                    Ok(candidates) => {
                        succeeded += 1;
                        all_candidates.extend(candidates);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "vector search failed for one expansion, others proceed");
                    }
                }
            }
        }

        if attempted > 0 && succeeded == 0 {
            return Err(CoreError::fatal("all vector search expansions failed"));
        }

        Ok(all_candidates)
    }

    async fn search_with_vectors(
        &self,
        dense_vector: &[f32],
        sparse_vector: Option<&SparseVector>,
        filters: &horei_core::ports::SearchFilters,
        top_k: usize,
    ) -> Result<Vec<horei_core::Candidate>, CoreError> {
        if let Some(sparse_vector) = sparse_vector {
            let hybrid_store = self.services.hybrid_store.as_ref().unwrap();
            with_retry(timeouts::VECTOR_QUERY, || {
                hybrid_store.hybrid_search(dense_vector, sparse_vector, top_k, filters)
            })
            .await
        } else {
            with_retry(timeouts::VECTOR_QUERY, || {
                self.services.vector_store.search(dense_vector, top_k, filters)
            })
            .await
        }
    }
}

fn split_law_article(entity: &str) -> Option<(&str, &str)> {
    let idx = entity.find('第')?;
    let law_title = &entity[..idx];
    let rest = &entity[idx..];
    let num_start = rest.find(char::is_numeric)?;
    let num_end = rest.find('条')?;
    Some((law_title, &rest[num_start..num_end]))
}


/// Orchestrator-level integration tests driven entirely by mock port
/// implementations, covering the quantified invariants, boundary behaviors,
/// and end-to-end scenarios enumerated in SPEC_FULL.md §8. Several
/// scenarios are scaled down from their literal candidate counts for
/// test-suite speed; the shapes (batching, fusion, rescaling, degradation)
/// are preserved.
#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use horei_core::ports::{Expansion, SearchFilters};
    use horei_core::{
        CandidateSource, EmbeddingProvider, GraphStore, LLMProvider, LlmMessage, Reranker, Toggle,
        Translator, VectorStore,
    };

    fn candidate(chunk_id: &str, text: &str, score: f32, source: CandidateSource) -> horei_core::Candidate {
        horei_core::Candidate {
            chunk_id: chunk_id.to_string(),
            score,
            law_id: None,
            law_title: None,
            article_title: None,
            article_caption: None,
            chapter_title: None,
            paragraph_num: None,
            text: text.to_string(),
            text_with_context: None,
            highlight_path: Vec::new(),
            metadata: HashMap::new(),
            source,
            original_score: None,
            rerank_score: None,
        }
    }

    fn settings(retrieval_multiplier: usize) -> RagSettings {
        let mut settings = RagSettings::default();
        settings.retrieval_multiplier = retrieval_multiplier;
        settings
    }

    struct MockEmbeddings {
        dim: usize,
        batch_calls: AtomicUsize,
        cancel_on_batch: Option<CancellationToken>,
    }

    impl MockEmbeddings {
        fn new(dim: usize) -> Self {
            Self { dim, batch_calls: AtomicUsize::new(0), cancel_on_batch: None }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddings {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError> {
            Ok(self.embed_batch(&[text.to_string()]).await?.pop().unwrap())
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(cancel) = &self.cancel_on_batch {
                cancel.cancel();
            }
            Ok(texts.iter().map(|_| vec![0.1; self.dim]).collect())
        }

        fn dim(&self) -> usize {
            self.dim
        }
    }

    /// Returns the same fixed candidate list (or a fixed error) on every call.
    struct FixedVectorStore {
        candidates: Vec<horei_core::Candidate>,
        fail: bool,
    }

    #[async_trait]
    impl VectorStore for FixedVectorStore {
        async fn search(
            &self,
            _query_vector: &[f32],
            top_k: usize,
            _filters: &SearchFilters,
        ) -> Result<Vec<horei_core::Candidate>, CoreError> {
            if self.fail {
                return Err(CoreError::fatal("vector store unreachable"));
            }
            Ok(self.candidates.iter().take(top_k).cloned().collect())
        }
    }

    /// Returns a distinct templated batch of candidates per call, cycling
    /// through `templates` by call order; simulates per-expansion results.
    struct MultiCallVectorStore {
        templates: Vec<Vec<horei_core::Candidate>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VectorStore for MultiCallVectorStore {
        async fn search(
            &self,
            _query_vector: &[f32],
            top_k: usize,
            _filters: &SearchFilters,
        ) -> Result<Vec<horei_core::Candidate>, CoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) % self.templates.len();
            Ok(self.templates[call].iter().take(top_k).cloned().collect())
        }
    }

    /// Fails on specific call indices (by arrival order), succeeds with a
    /// unique candidate otherwise.
    struct PartialFailVectorStore {
        calls: AtomicUsize,
        fail_on_call: HashSet<usize>,
    }

    #[async_trait]
    impl VectorStore for PartialFailVectorStore {
        async fn search(
            &self,
            _query_vector: &[f32],
            _top_k: usize,
            _filters: &SearchFilters,
        ) -> Result<Vec<horei_core::Candidate>, CoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_call.contains(&call) {
                return Err(CoreError::fatal("simulated expansion failure"));
            }
            Ok(vec![candidate(&format!("p{call}"), "partial", 0.9, CandidateSource::Vector)])
        }
    }

    /// Fails with a transient error on the first `fail_until` attempts, then
    /// succeeds, exercising the retry wrapper directly.
    struct RetryThenSucceedVectorStore {
        calls: AtomicUsize,
        fail_until: usize,
    }

    #[async_trait]
    impl VectorStore for RetryThenSucceedVectorStore {
        async fn search(
            &self,
            _query_vector: &[f32],
            _top_k: usize,
            _filters: &SearchFilters,
        ) -> Result<Vec<horei_core::Candidate>, CoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_until {
                return Err(CoreError::transient("connection reset"));
            }
            Ok(vec![candidate("r1", "retried", 0.9, CandidateSource::Vector)])
        }
    }

    struct MockGraphStore {
        find_article: Option<horei_core::GraphResult>,
        keyword_hits: Vec<horei_core::GraphResult>,
        fail: bool,
    }

    #[async_trait]
    impl GraphStore for MockGraphStore {
        async fn find_article(
            &self,
            _law_title_substring: &str,
            _article_num: &str,
        ) -> Result<Option<horei_core::GraphResult>, CoreError> {
            if self.fail {
                return Err(CoreError::fatal("graph store unreachable"));
            }
            Ok(self.find_article.clone())
        }

        async fn find_related(
            &self,
            _law_id: &str,
            _article_num: &str,
            _depth: u8,
            _limit: usize,
        ) -> Result<Vec<horei_core::GraphResult>, CoreError> {
            if self.fail {
                return Err(CoreError::fatal("graph store unreachable"));
            }
            Ok(Vec::new())
        }

        async fn keyword_search(&self, _keyword: &str, _limit: usize) -> Result<Vec<horei_core::GraphResult>, CoreError> {
            if self.fail {
                return Err(CoreError::fatal("graph store unreachable"));
            }
            Ok(self.keyword_hits.clone())
        }
    }

    fn graph_result(chunk_id: &str, relevance: f32) -> horei_core::GraphResult {
        horei_core::GraphResult {
            law_id: "law-1".to_string(),
            law_title: "労働基準法".to_string(),
            article_num: "32".to_string(),
            article_title: None,
            article_caption: None,
            chunk_id: chunk_id.to_string(),
            relevance,
            highlight_path: Vec::new(),
        }
    }

    /// Rescales by max score, mirroring `LexicalReranker`'s §4.6 contract,
    /// without any lexical scoring of its own.
    struct PassthroughReranker;

    #[async_trait]
    impl Reranker for PassthroughReranker {
        async fn rerank(
            &self,
            _query: &str,
            mut candidates: Vec<horei_core::Candidate>,
            top_k: usize,
        ) -> Result<Vec<horei_core::Candidate>, CoreError> {
            candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
            let max = candidates.first().map(|c| c.score).unwrap_or(0.0);
            if max > 0.0 {
                for c in &mut candidates {
                    c.original_score = Some(c.score);
                    c.score /= max;
                    c.rerank_score = Some(c.score);
                    c.source = CandidateSource::Rerank;
                }
            }
            candidates.truncate(top_k);
            Ok(candidates)
        }
    }

    struct MockLlm;

    #[async_trait]
    impl LLMProvider for MockLlm {
        async fn generate(&self, _messages: &[LlmMessage], _params: &GenerationParams) -> Result<String, CoreError> {
            Ok("mock answer".to_string())
        }
    }

    /// Expands into a translated primary plus `alt_count` alternate phrasings.
    struct FixedExpansionTranslator {
        alt_count: usize,
    }

    #[async_trait]
    impl Translator for FixedExpansionTranslator {
        async fn translate(&self, text: &str) -> Result<String, CoreError> {
            Ok(text.to_string())
        }

        async fn expand(&self, text: &str) -> Result<Expansion, CoreError> {
            Ok(Expansion {
                translated: text.to_string(),
                search_queries: (0..self.alt_count).map(|i| format!("{text} alt{i}")).collect(),
                keywords: Vec::new(),
                related_terms: Vec::new(),
            })
        }
    }

    fn services(
        embeddings: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        graph_store: Option<Arc<dyn GraphStore>>,
        reranker: Option<Arc<dyn Reranker>>,
        translator: Option<Arc<dyn Translator>>,
    ) -> Services {
        Services {
            embeddings,
            sparse_embeddings: None,
            vector_store,
            hybrid_store: None,
            graph_store,
            reranker,
            llm: Arc::new(MockLlm),
            translator,
        }
    }

    fn orchestrator(services: Services, settings: RagSettings) -> Orchestrator {
        Orchestrator::new(services, settings)
    }

    // Scenario 1: entity lookup. Graph-only, ordered by chunk_id.
    #[tokio::test]
    async fn entity_lookup_scenario_orders_graph_sources_by_chunk_id() {
        let graph = MockGraphStore {
            find_article: None,
            keyword_hits: vec![graph_result("c3", 0.8), graph_result("c1", 0.8), graph_result("c2", 0.8)],
            fail: false,
        };
        let svc = services(
            Arc::new(MockEmbeddings::new(4)),
            Arc::new(FixedVectorStore { candidates: Vec::new(), fail: false }),
            Some(Arc::new(graph)),
            None,
            None,
        );
        let orch = orchestrator(svc, settings(1));
        let options = ChatOptions { top_k: 3, ..Default::default() };

        let answer = orch.chat("第32条 là gì?", options, CancellationToken::new()).await.unwrap();

        assert_eq!(answer.sources.len(), 3);
        assert_eq!(answer.sources[0].chunk_id, "c1");
        assert_eq!(answer.sources[1].chunk_id, "c2");
        assert_eq!(answer.sources[2].chunk_id, "c3");
        assert!((answer.sources[0].score - 0.96).abs() < 1e-5);
    }

    // Scenario 2 (scaled down): semantic route batches embeddings once and
    // the reranker rescales the top score to 1.0.
    #[tokio::test]
    async fn semantic_scenario_batches_embeddings_and_rescales_with_reranker() {
        let embeddings = Arc::new(MockEmbeddings::new(4));
        let templates = vec![
            vec![
                candidate("t0-0", "text", 0.9, CandidateSource::Vector),
                candidate("t0-1", "text", 0.7, CandidateSource::Vector),
                candidate("t0-2", "text", 0.5, CandidateSource::Vector),
                candidate("t0-3", "text", 0.1, CandidateSource::Vector),
            ],
            vec![
                candidate("t1-0", "text", 0.9, CandidateSource::Vector),
                candidate("t1-1", "text", 0.7, CandidateSource::Vector),
                candidate("t1-2", "text", 0.5, CandidateSource::Vector),
                candidate("t1-3", "text", 0.1, CandidateSource::Vector),
            ],
            vec![
                candidate("t2-0", "text", 0.9, CandidateSource::Vector),
                candidate("t2-1", "text", 0.7, CandidateSource::Vector),
                candidate("t2-2", "text", 0.5, CandidateSource::Vector),
                candidate("t2-3", "text", 0.1, CandidateSource::Vector),
            ],
        ];
        let vector_store = Arc::new(MultiCallVectorStore { templates, calls: AtomicUsize::new(0) });
        let translator: Arc<dyn Translator> = Arc::new(FixedExpansionTranslator { alt_count: 2 });

        let svc = services(embeddings.clone(), vector_store, None, Some(Arc::new(PassthroughReranker)), Some(translator));
        let orch = orchestrator(svc, settings(1));
        let options = ChatOptions { top_k: 5, ..Default::default() };

        let answer = orch
            .chat("Thời gian làm việc tối đa mỗi tuần?", options, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(embeddings.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(answer.sources.len(), 5);
        assert!((answer.sources[0].score - 1.0).abs() < 1e-6);
        for pair in answer.sources.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    // Scenario 4: same shape as scenario 2 with the reranker disabled —
    // order follows the fused score and the top score is not normalized.
    #[tokio::test]
    async fn reranker_absent_orders_by_fused_score_descending() {
        let embeddings = Arc::new(MockEmbeddings::new(4));
        let templates = vec![
            vec![candidate("u0-0", "text", 0.9, CandidateSource::Vector), candidate("u0-1", "text", 0.1, CandidateSource::Vector)],
            vec![candidate("u1-0", "text", 0.6, CandidateSource::Vector)],
        ];
        let vector_store = Arc::new(MultiCallVectorStore { templates, calls: AtomicUsize::new(0) });
        let translator: Arc<dyn Translator> = Arc::new(FixedExpansionTranslator { alt_count: 1 });

        let svc = services(embeddings, vector_store, None, None, Some(translator));
        let orch = orchestrator(svc, settings(1));
        let options = ChatOptions { top_k: 5, ..Default::default() };

        let answer = orch
            .chat("Thời gian làm việc tối đa mỗi tuần?", options, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(answer.sources[0].chunk_id, "u0-0");
        assert!((answer.sources[0].score - 0.9).abs() < 1e-6);
        for pair in answer.sources.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    // Scenario 3: a chunk found by both graph and vector keeps the
    // graph-boosted score and stays on top after reranking.
    #[tokio::test]
    async fn hybrid_route_graph_boost_keeps_overlapping_chunk_on_top() {
        let graph = MockGraphStore {
            find_article: Some(graph_result("X", 1.0)),
            keyword_hits: Vec::new(),
            fail: false,
        };
        let vector_store = Arc::new(FixedVectorStore {
            candidates: vec![
                candidate("X", "vector text for X", 0.81, CandidateSource::Vector),
                candidate("Y", "other text", 0.4, CandidateSource::Vector),
            ],
            fail: false,
        });
        let svc = services(
            Arc::new(MockEmbeddings::new(4)),
            vector_store,
            Some(Arc::new(graph)),
            Some(Arc::new(PassthroughReranker)),
            None,
        );
        let orch = orchestrator(svc, settings(1));
        let options = ChatOptions { top_k: 3, ..Default::default() };

        let answer = orch.chat("労働基準法第32条の規定", options, CancellationToken::new()).await.unwrap();

        assert_eq!(answer.sources[0].chunk_id, "X");
        assert!((answer.sources[0].score - 1.0).abs() < 1e-6);
    }

    // Scenario 5: the graph store is unreachable on every call; the request
    // still succeeds because vector retrieval is unaffected.
    #[tokio::test]
    async fn graph_down_degrades_gracefully_vector_still_returns() {
        let graph = MockGraphStore { find_article: None, keyword_hits: Vec::new(), fail: true };
        let vector_store = Arc::new(FixedVectorStore {
            candidates: vec![candidate("Y", "vector only", 0.7, CandidateSource::Vector)],
            fail: false,
        });
        let svc = services(Arc::new(MockEmbeddings::new(4)), vector_store, Some(Arc::new(graph)), None, None);
        let orch = orchestrator(svc, settings(1));
        let options = ChatOptions { top_k: 3, ..Default::default() };

        let answer = orch.chat("労働基準法第32条の規定", options, CancellationToken::new()).await.unwrap();

        assert!(answer.sources.iter().any(|s| s.chunk_id == "Y"));
    }

    // Scenario 6: cancellation arrives once the dense embeddings complete
    // but before any vector search returns.
    #[tokio::test]
    async fn cancellation_after_embeddings_aborts_before_vector_search() {
        let cancel = CancellationToken::new();
        let embeddings = Arc::new(MockEmbeddings { dim: 4, batch_calls: AtomicUsize::new(0), cancel_on_batch: Some(cancel.clone()) });
        let vector_store = Arc::new(FixedVectorStore { candidates: Vec::new(), fail: false });
        let svc = services(embeddings, vector_store, None, None, None);
        let orch = orchestrator(svc, settings(1));
        let options = ChatOptions { top_k: 3, use_multi_query: Toggle::Disabled, ..Default::default() };

        let result = orch.chat("Thời gian làm việc tối đa mỗi tuần?", options, cancel).await;

        assert!(matches!(result, Err(CoreError::Cancelled)));
    }

    #[tokio::test]
    async fn top_k_zero_is_input_error() {
        let svc = services(Arc::new(MockEmbeddings::new(4)), Arc::new(FixedVectorStore { candidates: Vec::new(), fail: false }), None, None, None);
        let orch = orchestrator(svc, settings(1));
        let options = ChatOptions { top_k: 0, ..Default::default() };

        let result = orch.chat("第32条とは", options, CancellationToken::new()).await;

        assert!(matches!(result, Err(CoreError::Input(_))));
    }

    #[tokio::test]
    async fn empty_query_is_input_error() {
        let svc = services(Arc::new(MockEmbeddings::new(4)), Arc::new(FixedVectorStore { candidates: Vec::new(), fail: false }), None, None, None);
        let orch = orchestrator(svc, settings(1));

        let result = orch.chat("   ", ChatOptions::default(), CancellationToken::new()).await;

        assert!(matches!(result, Err(CoreError::Input(_))));
    }

    // A single failing expansion contributes nothing, but the others still
    // carry the request to a successful answer (§7).
    #[tokio::test]
    async fn partial_expansion_failure_is_tolerated() {
        let vector_store = Arc::new(PartialFailVectorStore { calls: AtomicUsize::new(0), fail_on_call: HashSet::from([1]) });
        let translator: Arc<dyn Translator> = Arc::new(FixedExpansionTranslator { alt_count: 2 });
        let svc = services(Arc::new(MockEmbeddings::new(4)), vector_store, None, None, Some(translator));
        let orch = orchestrator(svc, settings(1));
        let options = ChatOptions { top_k: 5, ..Default::default() };

        let answer = orch
            .chat("Thời gian làm việc tối đa mỗi tuần?", options, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(answer.sources.len(), 2);
    }

    // When every expansion fails, the request surfaces Fatal rather than an
    // answer with silently empty sources.
    #[tokio::test]
    async fn all_expansions_failing_returns_fatal() {
        let vector_store = Arc::new(PartialFailVectorStore { calls: AtomicUsize::new(0), fail_on_call: HashSet::from([0, 1, 2]) });
        let translator: Arc<dyn Translator> = Arc::new(FixedExpansionTranslator { alt_count: 2 });
        let svc = services(Arc::new(MockEmbeddings::new(4)), vector_store, None, None, Some(translator));
        let orch = orchestrator(svc, settings(1));
        let options = ChatOptions { top_k: 5, ..Default::default() };

        let result = orch.chat("Thời gian làm việc tối đa mỗi tuần?", options, CancellationToken::new()).await;

        assert!(result.is_err());
    }

    // Exercises the retry wrapper directly: two transient failures are
    // absorbed within the retry budget and the third attempt succeeds.
    #[tokio::test]
    async fn transient_vector_error_is_retried_then_succeeds() {
        let vector_store = Arc::new(RetryThenSucceedVectorStore { calls: AtomicUsize::new(0), fail_until: 2 });
        let svc = services(Arc::new(MockEmbeddings::new(4)), vector_store, None, None, None);
        let orch = orchestrator(svc, settings(1));
        let options = ChatOptions { top_k: 3, use_multi_query: Toggle::Disabled, ..Default::default() };

        let answer = orch.chat("第32条とは何か説明してください", options, CancellationToken::new()).await.unwrap();

        assert_eq!(answer.sources.len(), 1);
    }

    // (P7) Identical requests against identical mock I/O return byte-identical
    // source ordering and identifiers.
    #[tokio::test]
    async fn identical_requests_produce_identical_sources() {
        let graph = MockGraphStore {
            find_article: None,
            keyword_hits: vec![graph_result("c3", 0.8), graph_result("c1", 0.8), graph_result("c2", 0.8)],
            fail: false,
        };
        let svc = services(
            Arc::new(MockEmbeddings::new(4)),
            Arc::new(FixedVectorStore { candidates: Vec::new(), fail: false }),
            Some(Arc::new(graph)),
            None,
            None,
        );
        let orch = orchestrator(svc, settings(1));

        let first = orch
            .chat("第32条 là gì?", ChatOptions { top_k: 3, ..Default::default() }, CancellationToken::new())
            .await
            .unwrap();
        let second = orch
            .chat("第32条 là gì?", ChatOptions { top_k: 3, ..Default::default() }, CancellationToken::new())
            .await
            .unwrap();

        let ids = |a: &Answer| a.sources.iter().map(|s| s.chunk_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }
}
