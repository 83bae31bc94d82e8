//! Request-scoped domain types shared by every stage of the pipeline.
//!
//! Everything here is owned exclusively by the orchestrator for the
//! lifetime of a single request (§3 of the design: "the pipeline
//! orchestrator exclusively owns per-request objects"). Nothing in this
//! module holds a reference back into process-wide state.

use std::collections::HashMap;

/// A tri-state feature toggle: a request can ask for a capability to be on,
/// off, or leave it to the orchestrator's configured default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Toggle {
    Enabled,
    Disabled,
    #[default]
    Default,
}

impl Toggle {
    /// Resolve against a configured default.
    pub fn resolve(self, configured_default: bool) -> bool {
        match self {
            Toggle::Enabled => true,
            Toggle::Disabled => false,
            Toggle::Default => configured_default,
        }
    }
}

/// Options accompanying an inbound `chat` call.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub top_k: usize,
    pub filters: HashMap<String, String>,
    pub use_graph: Toggle,
    pub use_hybrid: Toggle,
    pub use_multi_query: Toggle,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            filters: HashMap::new(),
            use_graph: Toggle::Default,
            use_hybrid: Toggle::Default,
            use_multi_query: Toggle::Default,
        }
    }
}

/// A prepared, immutable request. Created once by the Query Preparer and
/// never mutated afterwards; a rewrite produces a new `Query`.
#[derive(Debug, Clone)]
pub struct Query {
    pub original_text: String,
    pub primary_search_text: String,
    /// Alternative phrasings plus a keyword bundle, at most three entries
    /// total including the primary (see §4.1).
    pub search_texts: Vec<String>,
    pub filters: HashMap<String, String>,
    pub top_k: usize,
    pub use_graph: bool,
    pub use_hybrid: bool,
    pub use_multi_query: bool,
}

impl Query {
    /// All search texts that should be embedded / searched, primary first.
    pub fn search_plan(&self) -> &[String] {
        &self.search_texts
    }
}

/// The kind of legal entity extracted from a query by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    LawArticle,
    Article,
    Law,
}

/// Classification assigned by the Query Router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    EntityLookup,
    MultiHop,
    Hybrid,
    Semantic,
}

/// The output of routing: a classified query type plus the entities that
/// drove the classification. Immutable once produced.
#[derive(Debug, Clone)]
pub struct RoutedQuery {
    pub original_query: String,
    pub query_type: QueryType,
    pub entities: Vec<(String, EntityKind)>,
    pub use_graph: bool,
    pub use_vector: bool,
}

/// Where a `Candidate` originated, preserved through fusion so degenerate
/// cases (e.g. an all-graph result set) remain inspectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Graph,
    Vector,
    Hybrid,
    Rerank,
}

/// A single retrievable passage, keyed by a stable chunk identifier,
/// flowing through retrieval, fusion, and reranking. Mutation happens only
/// by producing a new, wrapped copy (§3: "mutated only by wrapping copies
/// in fusion/rerank").
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk_id: String,
    pub score: f32,
    pub law_id: Option<String>,
    pub law_title: Option<String>,
    pub article_title: Option<String>,
    pub article_caption: Option<String>,
    pub chapter_title: Option<String>,
    pub paragraph_num: Option<String>,
    pub text: String,
    pub text_with_context: Option<String>,
    pub highlight_path: Vec<String>,
    pub metadata: HashMap<String, String>,
    pub source: CandidateSource,
    pub original_score: Option<f32>,
    pub rerank_score: Option<f32>,
}

impl Candidate {
    /// The text that should actually be shown to the generator: per the
    /// resolved Open Question in SPEC_FULL.md §9, `text_with_context` wins
    /// when present and non-empty.
    pub fn display_text(&self) -> &str {
        match &self.text_with_context {
            Some(t) if !t.is_empty() => t,
            _ => &self.text,
        }
    }
}

/// A result from the knowledge-graph retriever, before being promoted into
/// a `Candidate` during fusion.
#[derive(Debug, Clone)]
pub struct GraphResult {
    pub law_id: String,
    pub law_title: String,
    pub article_num: String,
    pub article_title: Option<String>,
    pub article_caption: Option<String>,
    pub chunk_id: String,
    pub relevance: f32,
    pub highlight_path: Vec<String>,
}

impl GraphResult {
    /// Promote to a `Candidate`, applying the configured `graph_weight`
    /// multiplier (§4.5 step 2).
    pub fn into_candidate(self, graph_weight: f32) -> Candidate {
        Candidate {
            chunk_id: self.chunk_id,
            score: self.relevance * graph_weight,
            law_id: Some(self.law_id),
            law_title: Some(self.law_title),
            article_title: self.article_title,
            article_caption: self.article_caption,
            chapter_title: None,
            paragraph_num: None,
            text: String::new(),
            text_with_context: None,
            highlight_path: self.highlight_path,
            metadata: HashMap::new(),
            source: CandidateSource::Graph,
            original_score: None,
            rerank_score: None,
        }
    }
}

/// A single numbered citation block ready to hand to the generator.
#[derive(Debug, Clone)]
pub struct ContextBlock {
    pub index: usize,
    pub law_title: Option<String>,
    pub article_title: Option<String>,
    pub text: String,
}

impl ContextBlock {
    /// Render per §4.7: `[i]【law_title article_title】\ntext`, or the
    /// degenerate `[i] text` form when titles are absent.
    pub fn render(&self) -> String {
        match (&self.law_title, &self.article_title) {
            (Some(law), Some(article)) => {
                format!("[{}]\u{3010}{} {}\u{3011}\n{}", self.index, law, article, self.text)
            }
            _ => format!("[{}] {}", self.index, self.text),
        }
    }
}

/// A single source surfaced to the caller alongside the generated answer.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub chunk_id: String,
    pub law_title: Option<String>,
    pub article: Option<String>,
    pub text: String,
    pub score: f32,
    pub highlight_path: Vec<String>,
    pub metadata: HashMap<String, String>,
}

/// Display cap for source text (§6: "truncated text ≤ 500 chars").
pub const SOURCE_TEXT_DISPLAY_CAP: usize = 500;

impl From<&Candidate> for SourceDocument {
    fn from(c: &Candidate) -> Self {
        let text = c.display_text();
        let truncated: String = text.chars().take(SOURCE_TEXT_DISPLAY_CAP).collect();
        Self {
            chunk_id: c.chunk_id.clone(),
            law_title: c.law_title.clone(),
            article: c.article_title.clone(),
            text: truncated,
            score: c.score,
            highlight_path: c.highlight_path.clone(),
            metadata: c.metadata.clone(),
        }
    }
}

/// The final response returned to the caller.
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer_text: String,
    pub sources: Vec<SourceDocument>,
    pub query: String,
    pub elapsed_ms: u64,
}
