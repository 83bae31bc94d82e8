//! Query Preparer: language detection plus translator-driven expansion
//! into a bounded `SearchPlan` (§4.1).

use std::collections::HashMap;
use std::sync::Arc;

use horei_core::{Query, Translator};

use crate::RagError;

/// Ratio of corpus-script characters (Hiragana, Katakana, Han) among
/// non-whitespace/punctuation characters at or above which a query is
/// treated as already being in the corpus language.
pub const LANGUAGE_DETECTION_THRESHOLD: f64 = 0.5;

const SKIPPED_PUNCTUATION: &[char] =
    &['(', ')', '（', '）', '「', '」', '、', '。', '？', '！', '.', ',', '?', '!'];

/// True when `text` is primarily in the corpus script (Hiragana, Katakana,
/// or Han/Kanji) by character-ratio heuristic.
pub fn is_corpus_language(text: &str, threshold: f64) -> bool {
    if text.is_empty() {
        return false;
    }

    let mut corpus_chars = 0usize;
    let mut total_chars = 0usize;

    for ch in text.chars() {
        if ch.is_whitespace() || SKIPPED_PUNCTUATION.contains(&ch) {
            continue;
        }
        total_chars += 1;
        if is_hiragana(ch) || is_katakana(ch) || is_han(ch) {
            corpus_chars += 1;
        }
    }

    if total_chars == 0 {
        return false;
    }

    (corpus_chars as f64 / total_chars as f64) >= threshold
}

fn is_hiragana(ch: char) -> bool {
    ('\u{3040}'..='\u{309f}').contains(&ch)
}

fn is_katakana(ch: char) -> bool {
    ('\u{30a0}'..='\u{30ff}').contains(&ch)
}

fn is_han(ch: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&ch)
}

/// Maximum number of search texts carried in a single-request plan (§4.1).
pub const MAX_SEARCH_TEXTS: usize = 3;

/// Turns a raw query into an immutable `Query` with a bounded search plan.
pub struct QueryPreparer {
    translator: Option<Arc<dyn Translator>>,
}

impl QueryPreparer {
    pub fn new(translator: Option<Arc<dyn Translator>>) -> Self {
        Self { translator }
    }

    /// Prepare a `Query`. Never fails: translation/expansion failures fall
    /// back to the original text, logged at `warn` (§4.1 failure semantics).
    pub async fn prepare(
        &self,
        raw_query: &str,
        top_k: usize,
        filters: HashMap<String, String>,
        use_graph: bool,
        use_hybrid: bool,
        multi_query_enabled: bool,
    ) -> Result<Query, RagError> {
        if raw_query.trim().is_empty() {
            return Err(RagError::InvalidInput("query must not be empty".to_string()));
        }

        let already_corpus_language = is_corpus_language(raw_query, LANGUAGE_DETECTION_THRESHOLD);

        let search_texts = if multi_query_enabled {
            self.expand(raw_query, already_corpus_language).await
        } else {
            vec![self.translate_primary(raw_query, already_corpus_language).await]
        };

        let primary_search_text = search_texts
            .first()
            .cloned()
            .unwrap_or_else(|| raw_query.to_string());

        Ok(Query {
            original_text: raw_query.to_string(),
            primary_search_text,
            search_texts,
            filters,
            top_k,
            use_graph,
            use_hybrid,
            use_multi_query: multi_query_enabled,
        })
    }

    async fn translate_primary(&self, raw_query: &str, already_corpus_language: bool) -> String {
        if already_corpus_language {
            return raw_query.to_string();
        }

        let Some(translator) = &self.translator else {
            return raw_query.to_string();
        };

        match translator.translate(raw_query).await {
            Ok(translated) => translated,
            Err(err) => {
                tracing::warn!(error = %err, "translation failed, using original query");
                raw_query.to_string()
            }
        }
    }

    /// Build the bounded search plan: translated/expanded primary, plus the
    /// expansion's alternative queries, plus a keyword-join, truncated to
    /// `MAX_SEARCH_TEXTS` (§4.1: "truncation to three is a responsibility
    /// of the preparer, not of the expansion call itself").
    async fn expand(&self, raw_query: &str, already_corpus_language: bool) -> Vec<String> {
        if already_corpus_language {
            return vec![raw_query.to_string()];
        }

        let Some(translator) = &self.translator else {
            return vec![raw_query.to_string()];
        };

        match translator.expand(raw_query).await {
            Ok(expansion) => {
                let translated = if expansion.translated.is_empty() {
                    raw_query.to_string()
                } else {
                    expansion.translated
                };

                let mut texts = vec![translated];
                texts.extend(expansion.search_queries);

                if !expansion.keywords.is_empty() {
                    let keyword_query = expansion.keywords.iter().take(3).cloned().collect::<Vec<_>>().join(" ");
                    texts.push(keyword_query);
                }

                texts.truncate(MAX_SEARCH_TEXTS);
                texts
            }
            Err(err) => {
                tracing::warn!(error = %err, "query expansion failed, falling back to translated primary");
                vec![self.translate_primary(raw_query, already_corpus_language).await]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use horei_core::ports::Expansion;
    use horei_core::Error as CoreError;

    /// Counts calls so tests can assert a translator was (or wasn't) reached.
    struct CountingTranslator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Translator for CountingTranslator {
        async fn translate(&self, text: &str) -> Result<String, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(text.to_string())
        }

        async fn expand(&self, text: &str) -> Result<Expansion, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Expansion {
                translated: text.to_string(),
                search_queries: vec![format!("{text} alt")],
                ..Default::default()
            })
        }
    }

    #[test]
    fn corpus_language_detection_kanji() {
        assert!(is_corpus_language("労働基準法第32条", LANGUAGE_DETECTION_THRESHOLD));
    }

    #[test]
    fn non_corpus_language_detection_vietnamese() {
        assert!(!is_corpus_language(
            "Thời gian làm việc tối đa mỗi tuần?",
            LANGUAGE_DETECTION_THRESHOLD
        ));
    }

    #[test]
    fn mixed_script_below_threshold_is_not_corpus_language() {
        // Mostly Vietnamese with one Japanese term in parens: below 0.5 ratio.
        assert!(!is_corpus_language(
            "Thuế quà tặng (贈与税) là gì?",
            LANGUAGE_DETECTION_THRESHOLD
        ));
    }

    #[test]
    fn empty_query_is_not_corpus_language() {
        assert!(!is_corpus_language("", LANGUAGE_DETECTION_THRESHOLD));
    }

    #[tokio::test]
    async fn prepare_without_translator_uses_original_text() {
        let preparer = QueryPreparer::new(None);
        let query = preparer
            .prepare("第32条 là gì?", 10, HashMap::new(), true, false, false)
            .await
            .unwrap();
        assert_eq!(query.search_texts.len(), 1);
        assert_eq!(query.search_texts[0], "第32条 là gì?");
    }

    #[tokio::test]
    async fn prepare_rejects_empty_query() {
        let preparer = QueryPreparer::new(None);
        let result = preparer
            .prepare("   ", 10, HashMap::new(), true, false, false)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn corpus_language_query_skips_translation_even_with_multi_query() {
        let translator = Arc::new(CountingTranslator { calls: AtomicUsize::new(0) });
        let preparer = QueryPreparer::new(Some(translator.clone()));
        let query = preparer
            .prepare("労働基準法第32条とは", 10, HashMap::new(), true, false, true)
            .await
            .unwrap();
        assert_eq!(query.search_texts, vec!["労働基準法第32条とは".to_string()]);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_corpus_language_query_expands_through_translator() {
        let translator = Arc::new(CountingTranslator { calls: AtomicUsize::new(0) });
        let preparer = QueryPreparer::new(Some(translator.clone()));
        let query = preparer
            .prepare("Thời gian làm việc tối đa mỗi tuần?", 10, HashMap::new(), true, false, true)
            .await
            .unwrap();
        assert_eq!(query.search_texts.len(), 2);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
    }
}
