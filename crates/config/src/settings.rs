//! Layered application settings (§4.11).
//!
//! Loaded from, in increasing precedence: compiled-in defaults,
//! `config/default.{yaml,toml}`, `config/{environment}.{yaml,toml}`,
//! environment variables prefixed `HOREI__`.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{endpoints, rag};
use crate::ConfigError;

/// Runtime environment; governs how strictly `Settings::validate` enforces
/// production-only requirements (none yet, kept for parity with the
/// layered-settings pattern this is grounded in and for future transport
/// wiring that does need it, e.g. CORS/auth).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Root settings object.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub rag: RagSettings,

    #[serde(default)]
    pub llm: LlmSettings,

    /// Config keys that belong to the (out-of-scope) transport layer but
    /// are still named in this core's config schema per §6 so a deployment
    /// wiring the transport has one place to read them from.
    #[serde(default)]
    pub surface: SurfaceSettings,
}

/// Retrieval, fusion, and reranker tuning (§4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagSettings {
    /// Embedding model identifier (opaque to the core; passed to the
    /// embedding adapter).
    #[serde(default = "default_dense_model")]
    pub dense_model: String,

    #[serde(default = "default_dense_dims")]
    pub dense_dims: usize,

    #[serde(default = "default_sparse_model")]
    pub sparse_model: String,

    #[serde(default = "default_vector_collection")]
    pub vector_collection: String,

    #[serde(default = "default_hybrid_collection")]
    pub hybrid_collection: String,

    /// Qdrant endpoint.
    #[serde(default = "default_qdrant_endpoint")]
    pub qdrant_endpoint: String,

    #[serde(default)]
    pub qdrant_api_key: Option<String>,

    /// Neo4j Bolt connection string.
    #[serde(default = "default_graph_connection")]
    pub graph_connection: String,

    #[serde(default)]
    pub graph_user: String,

    #[serde(default)]
    pub graph_password: String,

    /// Multiplicative factor applied to graph relevance before max-merge.
    #[serde(default = "default_graph_weight")]
    pub graph_weight: f32,

    /// Minimum fused score to keep a candidate (§4.5).
    #[serde(default = "default_min_score_threshold")]
    pub min_score_threshold: f32,

    /// How many candidates to pull per retriever relative to the requested
    /// top_k, before fusion/filter/rerank narrow back down.
    #[serde(default = "default_retrieval_multiplier")]
    pub retrieval_multiplier: usize,

    #[serde(default)]
    pub use_hybrid_search: bool,

    #[serde(default = "default_true")]
    pub reranker_enabled: bool,

    #[serde(default = "default_dense_top_k")]
    pub dense_top_k: usize,

    #[serde(default = "default_sparse_top_k")]
    pub sparse_top_k: usize,

    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    #[serde(default = "default_prefilter_threshold")]
    pub prefilter_threshold: f32,

    #[serde(default = "default_max_full_model_docs")]
    pub max_full_model_docs: usize,

    #[serde(default = "default_early_termination_threshold")]
    pub early_termination_threshold: f32,

    #[serde(default = "default_early_termination_min_results")]
    pub early_termination_min_results: usize,

    #[serde(default = "default_category_detection_threshold")]
    pub category_detection_threshold: f32,
}

fn default_dense_model() -> String {
    "qwen3-embedding:0.6b".to_string()
}
fn default_dense_dims() -> usize {
    1024
}
fn default_sparse_model() -> String {
    "hashing-trick-bm25".to_string()
}
fn default_vector_collection() -> String {
    "statute_chunks".to_string()
}
fn default_hybrid_collection() -> String {
    "statute_chunks_hybrid".to_string()
}
fn default_qdrant_endpoint() -> String {
    endpoints::QDRANT_DEFAULT.to_string()
}
fn default_graph_connection() -> String {
    endpoints::NEO4J_DEFAULT.to_string()
}
fn default_graph_weight() -> f32 {
    rag::GRAPH_WEIGHT as f32
}
fn default_min_score_threshold() -> f32 {
    rag::MIN_SCORE_THRESHOLD as f32
}
fn default_retrieval_multiplier() -> usize {
    rag::RETRIEVAL_MULTIPLIER
}
fn default_dense_top_k() -> usize {
    20
}
fn default_sparse_top_k() -> usize {
    20
}
fn default_rrf_k() -> f32 {
    rag::RRF_K
}
fn default_prefilter_threshold() -> f32 {
    rag::PREFILTER_THRESHOLD
}
fn default_max_full_model_docs() -> usize {
    rag::MAX_FULL_MODEL_DOCS
}
fn default_early_termination_threshold() -> f32 {
    rag::EARLY_TERMINATION_THRESHOLD
}
fn default_early_termination_min_results() -> usize {
    rag::EARLY_TERMINATION_MIN_RESULTS
}
fn default_category_detection_threshold() -> f32 {
    rag::CATEGORY_DETECTION_THRESHOLD
}
fn default_true() -> bool {
    true
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            dense_model: default_dense_model(),
            dense_dims: default_dense_dims(),
            sparse_model: default_sparse_model(),
            vector_collection: default_vector_collection(),
            hybrid_collection: default_hybrid_collection(),
            qdrant_endpoint: default_qdrant_endpoint(),
            qdrant_api_key: None,
            graph_connection: default_graph_connection(),
            graph_user: String::new(),
            graph_password: String::new(),
            graph_weight: default_graph_weight(),
            min_score_threshold: default_min_score_threshold(),
            retrieval_multiplier: default_retrieval_multiplier(),
            use_hybrid_search: false,
            reranker_enabled: true,
            dense_top_k: default_dense_top_k(),
            sparse_top_k: default_sparse_top_k(),
            rrf_k: default_rrf_k(),
            prefilter_threshold: default_prefilter_threshold(),
            max_full_model_docs: default_max_full_model_docs(),
            early_termination_threshold: default_early_termination_threshold(),
            early_termination_min_results: default_early_termination_min_results(),
            category_detection_threshold: default_category_detection_threshold(),
        }
    }
}

/// Generator model settings (§4.8, §4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    #[serde(default = "default_llm_endpoint")]
    pub llm_endpoint: String,

    #[serde(default)]
    pub llm_api_key: Option<String>,

    #[serde(default = "default_llm_temperature")]
    pub llm_temperature: f32,

    #[serde(default = "default_llm_max_tokens")]
    pub llm_max_tokens: usize,

    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,
}

fn default_llm_model() -> String {
    "qwen3:4b-instruct-2507-q4_K_M".to_string()
}
fn default_llm_endpoint() -> String {
    endpoints::LLM_DEFAULT.to_string()
}
fn default_llm_temperature() -> f32 {
    0.2
}
fn default_llm_max_tokens() -> usize {
    1024
}
fn default_llm_timeout_secs() -> u64 {
    30
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            llm_model: default_llm_model(),
            llm_endpoint: default_llm_endpoint(),
            llm_api_key: None,
            llm_temperature: default_llm_temperature(),
            llm_max_tokens: default_llm_max_tokens(),
            llm_timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Config keys owned by the transport layer, named here only because §6
/// lists them as part of the persisted config key set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SurfaceSettings {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate every section; rejects invalid values at startup rather
    /// than at first use (§4.11).
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_rag()?;
        self.validate_llm()?;
        Ok(())
    }

    fn validate_rag(&self) -> Result<(), ConfigError> {
        let rag = &self.rag;

        for (field, value) in [
            ("rag.graph_weight", rag.graph_weight),
            ("rag.min_score_threshold", rag.min_score_threshold),
            ("rag.prefilter_threshold", rag.prefilter_threshold),
            ("rag.early_termination_threshold", rag.early_termination_threshold),
            ("rag.category_detection_threshold", rag.category_detection_threshold),
        ] {
            if field == "rag.graph_weight" {
                // graph_weight is a multiplier, not a probability; only
                // require it to be positive.
                if value <= 0.0 {
                    return Err(ConfigError::InvalidValue {
                        field: field.to_string(),
                        message: format!("must be positive, got {value}"),
                    });
                }
                continue;
            }
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("must be between 0.0 and 1.0, got {value}"),
                });
            }
        }

        if rag.rrf_k <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "rag.rrf_k".to_string(),
                message: format!("must be positive, got {}", rag.rrf_k),
            });
        }

        if rag.retrieval_multiplier == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rag.retrieval_multiplier".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if rag.early_termination_min_results > rag.max_full_model_docs {
            return Err(ConfigError::InvalidValue {
                field: "rag.early_termination_min_results".to_string(),
                message: format!(
                    "cannot exceed max_full_model_docs ({})",
                    rag.max_full_model_docs
                ),
            });
        }

        if rag.use_hybrid_search && rag.sparse_model.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "rag.sparse_model".to_string(),
                message: "required when use_hybrid_search is enabled".to_string(),
            });
        }

        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        let llm = &self.llm;

        if !(0.0..=2.0).contains(&llm.llm_temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.llm_temperature".to_string(),
                message: format!("must be between 0.0 and 2.0, got {}", llm.llm_temperature),
            });
        }

        if llm.llm_max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.llm_max_tokens".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if llm.llm_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.llm_timeout_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

/// Load settings from, in increasing precedence: compiled-in defaults,
/// `config/default.*`, `config/{env}.*`, and `HOREI__`-prefixed environment
/// variables (double underscore separates nesting, e.g.
/// `HOREI__RAG__GRAPH_WEIGHT=1.4`).
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{env_name}")).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("HOREI")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;

    Ok(settings)
}
