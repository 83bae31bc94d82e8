//! `Translator` adapter driving query translation and expansion through an
//! `LLMProvider` (§4.1).
//!
//! Prompts ask the model for a JSON object; parsing strips an optional
//! markdown code fence before deserializing and falls back to treating the
//! whole response as the translated text on any parse failure, mirroring
//! the graceful-degradation behavior of the original query-translation
//! service rather than propagating a hard error for a malformed model
//! response.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use horei_core::ports::Expansion;
use horei_core::{Error as CoreError, GenerationParams, LLMProvider, LlmMessage, LlmRole, Translator};

const TRANSLATE_SYSTEM_PROMPT: &str = "You translate legal questions into Japanese for retrieval \
against a corpus of Japanese statutes. Reply with the translated question only, no commentary.";

const EXPAND_SYSTEM_PROMPT: &str = "You translate and expand a legal question for retrieval \
against a corpus of Japanese statutes. Reply with a single JSON object of the shape \
{\"translated\": string, \"search_queries\": [string], \"keywords\": [string], \"related_terms\": [string]}. \
\"translated\" is the question in Japanese. \"search_queries\" holds up to two alternative Japanese \
phrasings of the same question. \"keywords\" holds the most important Japanese legal terms in the \
question. Reply with JSON only, no commentary and no code fence.";

#[derive(Deserialize)]
struct ExpansionResponse {
    #[serde(default)]
    translated: String,
    #[serde(default)]
    search_queries: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    related_terms: Vec<String>,
}

const GENERATION_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.0,
    max_tokens: 512,
};

pub struct LlmTranslator {
    llm: Arc<dyn LLMProvider>,
}

impl LlmTranslator {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self { llm }
    }

    async fn call(&self, system_prompt: &str, text: &str) -> Result<String, CoreError> {
        let messages = vec![
            LlmMessage {
                role: LlmRole::System,
                content: system_prompt.to_string(),
            },
            LlmMessage {
                role: LlmRole::User,
                content: text.to_string(),
            },
        ];
        self.llm.generate(&messages, &GENERATION_PARAMS).await
    }
}

/// Strip a leading/trailing markdown code fence (```json ... ``` or ``` ... ```).
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(without_leading) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let without_leading = without_leading
        .strip_prefix("json")
        .unwrap_or(without_leading)
        .trim_start_matches('\n');
    without_leading.strip_suffix("```").unwrap_or(without_leading).trim()
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str) -> Result<String, CoreError> {
        let translated = self.call(TRANSLATE_SYSTEM_PROMPT, text).await?;
        Ok(translated.trim().to_string())
    }

    async fn expand(&self, text: &str) -> Result<Expansion, CoreError> {
        let raw = self.call(EXPAND_SYSTEM_PROMPT, text).await?;
        let cleaned = strip_code_fence(&raw);

        match serde_json::from_str::<ExpansionResponse>(cleaned) {
            Ok(parsed) => Ok(Expansion {
                translated: parsed.translated,
                keywords: parsed.keywords,
                related_terms: parsed.related_terms,
                search_queries: parsed.search_queries,
            }),
            Err(err) => {
                tracing::warn!(error = %err, "failed to parse expansion response, using raw text");
                Ok(Expansion {
                    translated: cleaned.to_string(),
                    keywords: Vec::new(),
                    related_terms: Vec::new(),
                    search_queries: Vec::new(),
                })
            }
        }
    }
}
