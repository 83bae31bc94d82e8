//! Qdrant-backed dense and hybrid vector search (§4.4).
//!
//! The hybrid path issues Qdrant's native prefetch+RRF fusion query, then
//! re-normalizes the returned scores to `[0, 1]` (top result = 1.0) so they
//! stay comparable to plain dense-search scores and to graph relevance
//! downstream — mirroring how the reference hybrid store wraps its
//! fusion call before handing results to the rest of the pipeline.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, FieldCondition, Filter, Match,
    PointStruct, SearchPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Payload;
use qdrant_client::Qdrant;
use serde_json::Value as JsonValue;

use horei_core::domain::CandidateSource;
use horei_core::ports::{SearchFilters, SparseVector};
use horei_core::{Candidate, Error as CoreError, HybridVectorStore, VectorStore};

use crate::RagError;

#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub vector_dim: usize,
}

pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
}

impl QdrantVectorStore {
    pub fn connect(config: &VectorStoreConfig) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&config.endpoint);
        if let Some(key) = &config.api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            collection: config.collection.clone(),
        })
    }

    pub async fn ensure_collection(&self, vector_dim: usize) -> Result<(), RagError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;
        if exists {
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(vector_dim as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;
        Ok(())
    }

    pub async fn upsert(
        &self,
        points: Vec<(String, Vec<f32>, HashMap<String, String>)>,
    ) -> Result<(), RagError> {
        let structs = points
            .into_iter()
            .map(|(id, vector, payload)| {
                let json_payload: HashMap<String, JsonValue> = payload
                    .into_iter()
                    .map(|(k, v)| (k, JsonValue::String(v)))
                    .collect();
                PointStruct::new(id, vector, Payload::try_from(JsonValue::Object(
                    json_payload.into_iter().collect(),
                )).unwrap_or_default())
            })
            .collect::<Vec<_>>();

        self.client
            .upsert_points(qdrant_client::qdrant::UpsertPointsBuilder::new(
                &self.collection,
                structs,
            ))
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;
        Ok(())
    }
}

fn build_filter(filters: &SearchFilters) -> Option<Filter> {
    if filters.is_empty() {
        return None;
    }
    let conditions: Vec<Condition> = filters
        .iter()
        .map(|(key, value)| {
            Condition::from(FieldCondition {
                key: key.clone(),
                r#match: Some(Match::from(value.clone())),
                ..Default::default()
            })
        })
        .collect();
    Some(Filter::must(conditions))
}

fn point_to_candidate(
    id: String,
    score: f32,
    payload: HashMap<String, qdrant_client::qdrant::Value>,
    source: CandidateSource,
) -> Candidate {
    let get = |key: &str| -> Option<String> {
        payload.get(key).and_then(|v| v.as_str().map(|s| s.to_string()))
    };

    let metadata: HashMap<String, String> = payload
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect();

    Candidate {
        chunk_id: id,
        score,
        law_id: get("law_id"),
        law_title: get("law_title"),
        article_title: get("article_title"),
        article_caption: get("article_caption"),
        chapter_title: get("chapter_title"),
        paragraph_num: get("paragraph_num"),
        text: get("text").unwrap_or_default(),
        text_with_context: get("text_with_context"),
        highlight_path: Vec::new(),
        metadata,
        source,
        original_score: Some(score),
        rerank_score: None,
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<Candidate>, CoreError> {
        let mut builder = SearchPointsBuilder::new(&self.collection, query_vector.to_vec(), top_k as u64)
            .with_payload(true);
        if let Some(filter) = build_filter(filters) {
            builder = builder.filter(filter);
        }

        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| CoreError::transient(format!("qdrant search failed: {e}")))?;

        let candidates = response
            .result
            .into_iter()
            .map(|point| {
                let id = point
                    .id
                    .map(|id| format!("{:?}", id))
                    .unwrap_or_default();
                point_to_candidate(id, point.score, point.payload, CandidateSource::Vector)
            })
            .collect();

        Ok(candidates)
    }
}

/// Wraps dense+sparse prefetch fusion. Qdrant computes RRF server-side; this
/// adapter is responsible only for building the request and re-normalizing
/// the response scores into `[0, 1]` (§4.4, §9).
pub struct QdrantHybridStore {
    inner: QdrantVectorStore,
    prefetch_limit: u64,
}

impl QdrantHybridStore {
    pub fn new(inner: QdrantVectorStore, prefetch_limit: u64) -> Self {
        Self { inner, prefetch_limit }
    }
}

#[async_trait]
impl HybridVectorStore for QdrantHybridStore {
    async fn hybrid_search(
        &self,
        dense_vector: &[f32],
        sparse_vector: &SparseVector,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<Candidate>, CoreError> {
        use qdrant_client::qdrant::{
            PrefetchQueryBuilder, Fusion, Query as QdrantQuery, QueryPointsBuilder,
        };

        let dense_prefetch = PrefetchQueryBuilder::default()
            .query(QdrantQuery::new_nearest(dense_vector.to_vec()))
            .limit(self.prefetch_limit)
            .build();

        let sparse_prefetch = PrefetchQueryBuilder::default()
            .query(QdrantQuery::new_nearest(
                qdrant_client::qdrant::Vector::new_sparse(
                    sparse_vector.indices.clone(),
                    sparse_vector.values.clone(),
                ),
            ))
            .limit(self.prefetch_limit)
            .build();

        let mut builder = QueryPointsBuilder::new(&self.inner.collection)
            .add_prefetch(dense_prefetch)
            .add_prefetch(sparse_prefetch)
            .query(QdrantQuery::new_fusion(Fusion::Rrf))
            .limit(top_k as u64)
            .with_payload(true);

        if let Some(filter) = build_filter(filters) {
            builder = builder.filter(filter);
        }

        let response = self
            .inner
            .client
            .query(builder)
            .await
            .map_err(|e| CoreError::transient(format!("qdrant hybrid search failed: {e}")))?;

        let mut candidates: Vec<Candidate> = response
            .result
            .into_iter()
            .map(|point| {
                let id = point
                    .id
                    .map(|id| format!("{:?}", id))
                    .unwrap_or_default();
                point_to_candidate(id, point.score, point.payload, CandidateSource::Hybrid)
            })
            .collect();

        normalize_scores(&mut candidates);
        Ok(candidates)
    }
}

/// Divide every score by the top score so the best hit is exactly 1.0.
fn normalize_scores(candidates: &mut [Candidate]) {
    let max_score = candidates
        .iter()
        .map(|c| c.score)
        .fold(0.0f32, |acc, s| acc.max(s));
    if max_score <= 0.0 {
        return;
    }
    for candidate in candidates.iter_mut() {
        candidate.original_score = Some(candidate.score);
        candidate.score /= max_score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horei_core::domain::CandidateSource;

    fn candidate(score: f32) -> Candidate {
        Candidate {
            chunk_id: "c".into(),
            score,
            law_id: None,
            law_title: None,
            article_title: None,
            article_caption: None,
            chapter_title: None,
            paragraph_num: None,
            text: String::new(),
            text_with_context: None,
            highlight_path: Vec::new(),
            metadata: HashMap::new(),
            source: CandidateSource::Hybrid,
            original_score: None,
            rerank_score: None,
        }
    }

    #[test]
    fn normalize_scores_sets_top_to_one() {
        let mut candidates = vec![candidate(0.6), candidate(0.3), candidate(0.15)];
        normalize_scores(&mut candidates);
        assert!((candidates[0].score - 1.0).abs() < 1e-6);
        assert!((candidates[1].score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn normalize_scores_handles_all_zero() {
        let mut candidates = vec![candidate(0.0), candidate(0.0)];
        normalize_scores(&mut candidates);
        assert_eq!(candidates[0].score, 0.0);
    }
}
