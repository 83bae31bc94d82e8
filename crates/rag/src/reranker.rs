//! Cross-encoder-shaped reranking (§4.6).
//!
//! The default adapter is a lexical scorer standing in for a cross-encoder:
//! cheap, dependency-light, and good enough to reorder a fused candidate
//! list by term overlap with the query. A concrete ONNX cross-encoder can
//! be swapped in behind the same `Reranker` port without the orchestrator
//! knowing the difference (§4.6: "absence is a degradation, not a failure").

use async_trait::async_trait;

use horei_core::domain::CandidateSource;
use horei_core::{Candidate, Error as CoreError, Reranker};

#[derive(Debug, Clone)]
pub struct RerankerConfig {
    /// Candidates scoring below this lexical overlap are dropped before the
    /// (absent, in this adapter) full-model pass would have run.
    pub prefilter_threshold: f32,
    pub max_candidates: usize,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            prefilter_threshold: 0.15,
            max_candidates: 10,
        }
    }
}

const STOPWORDS: &[&str] = &[
    "は", "を", "に", "が", "の", "で", "と", "も", "や", "から", "まで",
    "là", "gì", "của", "và", "các", "theo", "the", "is", "are", "of", "to", "and",
];

pub struct LexicalReranker {
    config: RerankerConfig,
}

impl LexicalReranker {
    pub fn new(config: RerankerConfig) -> Self {
        Self { config }
    }

    fn terms(text: &str) -> Vec<String> {
        text.split(|c: char| c.is_whitespace() || "、。？！「」（）()".contains(c))
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .filter(|t| !STOPWORDS.contains(&t.as_str()))
            .collect()
    }

    /// Term-overlap score normalized to `[0, 1]`: the fraction of query
    /// terms present in the candidate text, weighted by a small length
    /// penalty so short, precise matches aren't drowned out by long ones.
    fn score(query_terms: &[String], candidate: &Candidate) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let doc_terms = Self::terms(candidate.display_text());
        let doc_set: std::collections::HashSet<&String> = doc_terms.iter().collect();
        let overlap = query_terms.iter().filter(|t| doc_set.contains(t)).count();
        let coverage = overlap as f32 / query_terms.len() as f32;
        let length_penalty = 1.0 / (1.0 + (doc_terms.len() as f32 / 200.0));
        (coverage * (0.7 + 0.3 * length_penalty)).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl Reranker for LexicalReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
        top_k: usize,
    ) -> Result<Vec<Candidate>, CoreError> {
        let query_terms = Self::terms(query);

        // Candidates with no display text can't be scored meaningfully;
        // they pass through unscored and are appended after the ranked set.
        let (to_score, passthrough): (Vec<Candidate>, Vec<Candidate>) = candidates
            .into_iter()
            .partition(|c| !c.display_text().trim().is_empty());

        let mut scored: Vec<Candidate> = to_score
            .into_iter()
            .filter_map(|mut candidate| {
                let rerank_score = Self::score(&query_terms, &candidate);
                if rerank_score < self.config.prefilter_threshold {
                    return None;
                }
                candidate.rerank_score = Some(rerank_score);
                Some(candidate)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.rerank_score
                .unwrap_or(0.0)
                .partial_cmp(&a.rerank_score.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Rescale `score` into [0, 1] against the top rerank score so a
        // reranked list is always comparable on the same scale regardless
        // of which scoring adapter produced it (§4.6).
        let max_rerank = scored.iter().filter_map(|c| c.rerank_score).fold(0.0_f32, f32::max);
        if max_rerank > 0.0 {
            for candidate in &mut scored {
                candidate.original_score = Some(candidate.score);
                candidate.score = candidate.rerank_score.unwrap_or(0.0) / max_rerank;
                candidate.source = CandidateSource::Rerank;
            }
        }

        scored.truncate(top_k.min(self.config.max_candidates));
        scored.extend(passthrough);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn candidate(text: &str) -> Candidate {
        Candidate {
            chunk_id: "c".into(),
            score: 0.5,
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
            source: CandidateSource::Vector,
            original_score: None,
            rerank_score: None,
        }
    }

    #[tokio::test]
    async fn reranks_by_term_overlap() {
        let reranker = LexicalReranker::new(RerankerConfig { prefilter_threshold: 0.0, max_candidates: 10 });
        let candidates = vec![
            candidate("労働時間 休憩 について規定する条文"),
            candidate("賃金の支払いに関する条文"),
        ];
        let reranked = reranker.rerank("労働時間 休憩", candidates, 10).await.unwrap();
        assert_eq!(reranked.len(), 2);
        assert!(reranked[0].text.contains("労働時間"));
        assert!(reranked[0].rerank_score.unwrap() > reranked[1].rerank_score.unwrap());
    }

    #[tokio::test]
    async fn drops_candidates_below_prefilter_threshold() {
        let reranker = LexicalReranker::new(RerankerConfig { prefilter_threshold: 0.9, max_candidates: 10 });
        let candidates = vec![candidate("まったく無関係なテキスト")];
        let reranked = reranker.rerank("労働時間 休憩", candidates, 10).await.unwrap();
        assert!(reranked.is_empty());
    }

    #[tokio::test]
    async fn truncates_to_top_k() {
        let reranker = LexicalReranker::new(RerankerConfig { prefilter_threshold: 0.0, max_candidates: 10 });
        let candidates = (0..5).map(|i| candidate(&format!("労働時間 条文 {i}"))).collect();
        let reranked = reranker.rerank("労働時間", candidates, 2).await.unwrap();
        assert_eq!(reranked.len(), 2);
    }

    #[tokio::test]
    async fn rescales_score_to_unit_range_and_preserves_original() {
        let reranker = LexicalReranker::new(RerankerConfig { prefilter_threshold: 0.0, max_candidates: 10 });
        let mut strong = candidate("労働時間 休憩 について規定する条文");
        strong.score = 0.42;
        let mut weak = candidate("賃金の支払いに関する条文");
        weak.score = 0.30;

        let reranked = reranker.rerank("労働時間 休憩", vec![strong, weak], 10).await.unwrap();

        assert_eq!(reranked[0].score, 1.0);
        assert_eq!(reranked[0].original_score, Some(0.42));
        assert!(reranked[1].score < 1.0);
        assert_eq!(reranked[1].original_score, Some(0.30));
        assert!(reranked.iter().all(|c| c.source == CandidateSource::Rerank));
    }

    #[tokio::test]
    async fn empty_text_candidates_pass_through_unscored_at_the_tail() {
        let reranker = LexicalReranker::new(RerankerConfig { prefilter_threshold: 0.0, max_candidates: 10 });
        let scored_one = candidate("労働時間 休憩 について規定する条文");
        let mut blank = candidate("");
        blank.score = 0.99;
        blank.chunk_id = "blank".into();

        let reranked = reranker.rerank("労働時間 休憩", vec![blank.clone(), scored_one], 10).await.unwrap();

        assert_eq!(reranked.len(), 2);
        assert_eq!(reranked.last().unwrap().chunk_id, "blank");
        assert_eq!(reranked.last().unwrap().score, 0.99);
        assert!(reranked.last().unwrap().rerank_score.is_none());
    }
}
