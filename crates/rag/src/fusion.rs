//! Cross-stage score fusion and filtering (§4.5).
//!
//! Graph and vector candidates are merged by `chunk_id`, keeping whichever
//! side scored higher, then filtered by a minimum-score threshold with a
//! top-3 fallback so a single over-aggressive threshold never starves the
//! generator of any context at all.

use std::cmp::Ordering;
use std::collections::HashMap;

use horei_core::{Candidate, GraphResult};

/// Minimum number of candidates kept when the threshold filter would
/// otherwise empty the result set (§4.5, §8).
pub const FALLBACK_TOP_N: usize = 3;

/// Merge graph results (promoted to candidates via the configured
/// `graph_weight`) with vector candidates, keeping the max score per
/// `chunk_id`, sort descending by score with a lexicographic `chunk_id`
/// tie-break, then filter by `min_score_threshold` with a top-3 fallback.
pub fn fuse(
    graph_results: Vec<GraphResult>,
    vector_candidates: Vec<Candidate>,
    graph_weight: f32,
    min_score_threshold: f32,
) -> Vec<Candidate> {
    let mut merged: HashMap<String, Candidate> = HashMap::new();

    for result in graph_results {
        let candidate = result.into_candidate(graph_weight);
        upsert_max(&mut merged, candidate);
    }

    for candidate in vector_candidates {
        upsert_max(&mut merged, candidate);
    }

    let mut ordered: Vec<Candidate> = merged.into_values().collect();
    ordered.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });

    let filtered: Vec<Candidate> = ordered
        .iter()
        .filter(|c| c.score >= min_score_threshold)
        .cloned()
        .collect();

    if filtered.is_empty() && !ordered.is_empty() {
        ordered.into_iter().take(FALLBACK_TOP_N).collect()
    } else {
        filtered
    }
}

fn upsert_max(merged: &mut HashMap<String, Candidate>, candidate: Candidate) {
    match merged.get(&candidate.chunk_id) {
        Some(existing) if existing.score >= candidate.score => {}
        _ => {
            merged.insert(candidate.chunk_id.clone(), candidate);
        }
    }
}
