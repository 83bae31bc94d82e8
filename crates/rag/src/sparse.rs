//! Sparse (lexical) embedding provider for hybrid search.
//!
//! Produces Qdrant-native sparse vectors via the hashing trick rather than
//! maintaining a separate inverted index: tokens are extracted with the
//! same tokenizer pipeline the sparse index build used, then hashed into a
//! fixed-width bucket space and TF-weighted. This keeps the sparse side
//! stateless and avoids running two different scoring engines side by side.

use std::collections::HashMap;

use async_trait::async_trait;
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer};

use horei_core::ports::SparseVector;
use horei_core::{Error as CoreError, SparseEmbeddingProvider};

/// Bucket count for the hashed sparse vocabulary. Large enough that
/// collisions are rare for statute-length queries, small enough to stay a
/// cheap sparse vector on the wire.
pub const VOCAB_BUCKETS: u32 = 1 << 18;

pub struct HashingSparseEmbeddingProvider {
    analyzer: TextAnalyzer,
}

impl HashingSparseEmbeddingProvider {
    pub fn new() -> Self {
        let analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(40))
            .filter(LowerCaser)
            .build();
        Self { analyzer }
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut analyzer = self.analyzer.clone();
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        tokens
    }

    fn vectorize(&self, text: &str) -> SparseVector {
        let tokens = self.tokenize(text);
        let mut counts: HashMap<u32, u32> = HashMap::new();
        for token in &tokens {
            let bucket = hash_term(token) % VOCAB_BUCKETS;
            *counts.entry(bucket).or_insert(0) += 1;
        }

        let total = tokens.len().max(1) as f32;
        let mut indices: Vec<u32> = counts.keys().copied().collect();
        indices.sort_unstable();

        let values = indices
            .iter()
            .map(|idx| {
                let tf = counts[idx] as f32 / total;
                tf.sqrt()
            })
            .collect();

        SparseVector { indices, values }
    }
}

impl Default for HashingSparseEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn hash_term(term: &str) -> u32 {
    // FNV-1a: deterministic across process restarts, which a vector index
    // that persists sparse postings requires.
    let mut hash: u32 = 0x811c9dc5;
    for byte in term.as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(0x01000193);
    }
    hash
}

#[async_trait]
impl SparseEmbeddingProvider for HashingSparseEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<SparseVector, CoreError> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<SparseVector>, CoreError> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}
