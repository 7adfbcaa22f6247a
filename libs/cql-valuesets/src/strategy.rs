//! Pluggable extraction strategies
//!
//! [`RegexExtraction`] is the default. [`LlmExtraction`] asks a model to list
//! the declarations instead; it is slower and non-deterministic and is kept
//! for callers that explicitly opt in.

use crate::error::Result;
use crate::extract::{extract_valuesets, ExtractionResult};
use async_trait::async_trait;

#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(&self, cql: &str) -> Result<ExtractionResult>;
}

/// Deterministic pattern-based extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexExtraction;

#[async_trait]
impl ExtractionStrategy for RegexExtraction {
    fn name(&self) -> &'static str {
        "regex"
    }

    async fn extract(&self, cql: &str) -> Result<ExtractionResult> {
        Ok(extract_valuesets(cql))
    }
}

#[cfg(feature = "llm-extraction")]
pub use llm::LlmExtraction;

#[cfg(feature = "llm-extraction")]
mod llm {
    use super::*;
    use crate::error::Error;
    use crate::extract::ValueSetDeclaration;
    use crate::validate::is_valid_oid;
    use ferrum_llm::{strip_code_fences, ChatMessage, CompletionOptions, CompletionProvider};
    use serde::Deserialize;
    use std::sync::Arc;

    const SYSTEM_PROMPT: &str = "You extract value set declarations from Clinical Quality \
Language (CQL). Reply with JSON only, shaped as \
{\"valuesets\": [{\"name\": \"<declared name>\", \"oid\": \"<dotted numeric OID>\"}]}. \
List every `valueset` declaration in source order. Do not invent OIDs.";

    #[derive(Deserialize)]
    struct ModelAnswer {
        #[serde(default)]
        valuesets: Vec<ValueSetDeclaration>,
    }

    /// Model-backed extraction through a [`CompletionProvider`].
    pub struct LlmExtraction {
        provider: Arc<dyn CompletionProvider>,
        options: CompletionOptions,
    }

    impl LlmExtraction {
        pub fn new(provider: Arc<dyn CompletionProvider>, options: CompletionOptions) -> Self {
            Self { provider, options }
        }

        pub(crate) fn parse_answer(content: &str) -> Result<ExtractionResult> {
            let answer: ModelAnswer = serde_json::from_str(strip_code_fences(content))
                .map_err(|e| Error::InvalidAnswer(e.to_string()))?;

            let declarations = answer
                .valuesets
                .into_iter()
                .map(|vs| ValueSetDeclaration {
                    oid: vs.oid.trim().trim_start_matches("urn:oid:").to_string(),
                    name: vs.name,
                })
                .filter(|vs| is_valid_oid(&vs.oid))
                .collect();

            Ok(ExtractionResult::from_declarations(declarations))
        }
    }

    #[async_trait]
    impl ExtractionStrategy for LlmExtraction {
        fn name(&self) -> &'static str {
            "llm"
        }

        async fn extract(&self, cql: &str) -> Result<ExtractionResult> {
            let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(cql)];
            let completion = self.provider.complete(&messages, &self.options).await?;
            tracing::debug!(
                provider = %completion.provider,
                total_tokens = completion.usage.total_tokens,
                "LLM extraction answered"
            );
            Self::parse_answer(&completion.content)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn parses_fenced_answer_and_drops_bad_oids() {
            let content = "```json\n{\"valuesets\": [\
                {\"name\": \"Diabetes\", \"oid\": \"urn:oid:1.2.3\"},\
                {\"name\": \"Bogus\", \"oid\": \"not-an-oid\"},\
                {\"name\": \"Again\", \"oid\": \"1.2.3\"}]}\n```";
            let result = LlmExtraction::parse_answer(content).unwrap();
            assert_eq!(result.oids, vec!["1.2.3"]);
            assert_eq!(result.valuesets.len(), 2);
            assert_eq!(result.name_for("1.2.3"), Some("Diabetes"));
        }

        #[test]
        fn prose_answer_is_rejected() {
            let err = LlmExtraction::parse_answer("I found two value sets.").unwrap_err();
            assert!(matches!(err, Error::InvalidAnswer(_)));
        }
    }
}
