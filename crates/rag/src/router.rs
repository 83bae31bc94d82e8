//! Query routing: entity extraction and retrieval-strategy classification (§4.2).

use once_cell::sync::Lazy;
use regex::Regex;

use horei_core::{EntityKind, QueryType, RoutedQuery};

static LAW_ARTICLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([ぁ-んァ-ン一-龯]+法)第(\d+)条").unwrap());

static ARTICLE_ONLY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"第(\d+)条(?:の(\d+))?").unwrap());

static LAW_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([ぁ-んァ-ン一-龯]+法)").unwrap());

const RELATIONSHIP_KEYWORDS: &[&str] = &[
    "liên quan",
    "related",
    "tham chiếu",
    "references",
    "kết nối",
    "connected",
    "điều khác",
    "các điều",
    "quy định tại",
    "theo điều",
    "dựa trên",
];

const LOOKUP_KEYWORDS: &[&str] = &[
    "là gì",
    "nói gì",
    "quy định gì",
    "what is",
    "điều",
    "khoản",
    "mục",
    "chương",
];

/// Classifies queries and extracts legal entities; pure, no I/O.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryRouter;

impl QueryRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, query: &str) -> RoutedQuery {
        let entities = self.extract_entities(query);
        let is_relationship = contains_any(query, RELATIONSHIP_KEYWORDS);
        let is_lookup = contains_any(query, LOOKUP_KEYWORDS);

        let (query_type, use_graph, use_vector) = if !entities.is_empty() && is_lookup && !is_relationship
        {
            (QueryType::EntityLookup, true, false)
        } else if !entities.is_empty() && is_relationship {
            (QueryType::MultiHop, true, true)
        } else if !entities.is_empty() {
            (QueryType::Hybrid, true, true)
        } else {
            (QueryType::Semantic, false, true)
        };

        tracing::debug!(
            query_type = ?query_type,
            entity_count = entities.len(),
            "query routed"
        );

        RoutedQuery {
            original_query: query.to_string(),
            query_type,
            entities,
            use_graph,
            use_vector,
        }
    }

    /// Entity extraction rules, applied in order; later matches that are
    /// substrings of an earlier match are suppressed (§4.2).
    fn extract_entities(&self, text: &str) -> Vec<(String, EntityKind)> {
        let mut entities: Vec<(String, EntityKind)> = Vec::new();

        for cap in LAW_ARTICLE_RE.captures_iter(text) {
            let law_name = &cap[1];
            let article_num = &cap[2];
            entities.push((
                format!("{law_name}第{article_num}条"),
                EntityKind::LawArticle,
            ));
        }

        for cap in ARTICLE_ONLY_RE.captures_iter(text) {
            let num = &cap[1];
            if let Some(sub) = cap.get(2) {
                entities.push((format!("第{num}条の{}", sub.as_str()), EntityKind::Article));
            } else {
                entities.push((format!("第{num}条"), EntityKind::Article));
            }
        }

        for cap in LAW_NAME_RE.captures_iter(text) {
            let law_name = &cap[1];
            if !entities.iter().any(|(e, _)| e.contains(law_name)) {
                entities.push((law_name.to_string(), EntityKind::Law));
            }
        }

        let mut seen = std::collections::HashSet::new();
        entities.retain(|e| seen.insert(e.clone()));
        entities
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|kw| lower.contains(kw))
}
