//! Code system to OMOP vocabulary resolution

use crate::error::Result;
use async_trait::async_trait;
use ferrum_llm::{strip_code_fences, ChatMessage, CompletionOptions, CompletionProvider};
use phf::phf_map;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// VSAC `codeSystemName` (upper-cased) to OMOP `vocabulary_id`.
static VOCABULARY_BY_NAME: phf::Map<&'static str, &'static str> = phf_map! {
    "ICD10CM" => "ICD10CM",
    "ICD-10-CM" => "ICD10CM",
    "ICD9CM" => "ICD9CM",
    "ICD-9-CM" => "ICD9CM",
    "ICD10PCS" => "ICD10PCS",
    "ICD-10-PCS" => "ICD10PCS",
    "ICD9PCS" => "ICD9Proc",
    "ICD9CM_PROC" => "ICD9Proc",
    "ICD10" => "ICD10",
    "SNOMEDCT" => "SNOMED",
    "SNOMEDCT_US" => "SNOMED",
    "SNOMED" => "SNOMED",
    "SNOMED CT" => "SNOMED",
    "LOINC" => "LOINC",
    "RXNORM" => "RxNorm",
    "CPT" => "CPT4",
    "CPT4" => "CPT4",
    "HCPCS" => "HCPCS",
    "HCPCS LEVEL II" => "HCPCS",
    "HCPCSRELEASECODESETS" => "HCPCS",
    "CVX" => "CVX",
    "NDC" => "NDC",
    "UCUM" => "UCUM",
    "NUCC" => "NUCC",
    "CDCREC" => "Race",
    "ADMINISTRATIVEGENDER" => "Gender",
    "SOP" => "SOPT",
};

/// HL7 code system OID to OMOP `vocabulary_id`.
static VOCABULARY_BY_OID: phf::Map<&'static str, &'static str> = phf_map! {
    "2.16.840.1.113883.6.90" => "ICD10CM",
    "2.16.840.1.113883.6.103" => "ICD9CM",
    "2.16.840.1.113883.6.104" => "ICD9Proc",
    "2.16.840.1.113883.6.4" => "ICD10PCS",
    "2.16.840.1.113883.6.3" => "ICD10",
    "2.16.840.1.113883.6.96" => "SNOMED",
    "2.16.840.1.113883.6.1" => "LOINC",
    "2.16.840.1.113883.6.88" => "RxNorm",
    "2.16.840.1.113883.6.12" => "CPT4",
    "2.16.840.1.113883.6.285" => "HCPCS",
    "2.16.840.1.113883.6.14" => "HCPCS",
    "2.16.840.1.113883.12.292" => "CVX",
    "2.16.840.1.113883.6.69" => "NDC",
    "2.16.840.1.113883.6.8" => "UCUM",
    "2.16.840.1.113883.6.101" => "NUCC",
    "2.16.840.1.113883.6.238" => "Race",
    "2.16.840.1.113883.5.1" => "Gender",
    "2.16.840.1.113883.3.221.5" => "SOPT",
};

/// Static lookup: the code system OID wins over the name.
pub fn lookup_vocabulary(code_system_name: &str, code_system: &str) -> Option<&'static str> {
    VOCABULARY_BY_OID
        .get(code_system.trim())
        .or_else(|| {
            VOCABULARY_BY_NAME.get(code_system_name.trim().to_ascii_uppercase().as_str())
        })
        .copied()
}

#[async_trait]
pub trait VocabularyMapper: Send + Sync {
    /// `None` means the code system has no OMOP vocabulary.
    async fn vocabulary_for(
        &self,
        code_system_name: &str,
        code_system: &str,
    ) -> Result<Option<String>>;
}

/// Table-only mapper.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableVocabularyMapper;

#[async_trait]
impl VocabularyMapper for TableVocabularyMapper {
    async fn vocabulary_for(
        &self,
        code_system_name: &str,
        code_system: &str,
    ) -> Result<Option<String>> {
        Ok(lookup_vocabulary(code_system_name, code_system).map(str::to_string))
    }
}

const NO_VOCABULARY: &str = "NONE";

const SYSTEM_PROMPT: &str = "You map terminology code systems to OMOP CDM vocabulary_id values. \
Answer with the exact vocabulary_id only (for example SNOMED, ICD10CM, LOINC, RxNorm, CPT4) \
or NONE when the code system has no OMOP vocabulary. Do not explain.";

/// Table first, then the model. Model answers are remembered per code system.
pub struct LlmVocabularyMapper {
    provider: Arc<dyn CompletionProvider>,
    options: CompletionOptions,
    answers: RwLock<HashMap<String, Option<String>>>,
}

impl LlmVocabularyMapper {
    pub fn new(provider: Arc<dyn CompletionProvider>, options: CompletionOptions) -> Self {
        Self {
            provider,
            options,
            answers: RwLock::new(HashMap::new()),
        }
    }

    fn parse_answer(content: &str) -> Option<String> {
        let answer = strip_code_fences(content)
            .trim()
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .trim();
        if answer.is_empty()
            || answer.eq_ignore_ascii_case(NO_VOCABULARY)
            || answer.contains(char::is_whitespace)
        {
            None
        } else {
            Some(answer.to_string())
        }
    }
}

#[async_trait]
impl VocabularyMapper for LlmVocabularyMapper {
    async fn vocabulary_for(
        &self,
        code_system_name: &str,
        code_system: &str,
    ) -> Result<Option<String>> {
        if let Some(vocabulary) = lookup_vocabulary(code_system_name, code_system) {
            return Ok(Some(vocabulary.to_string()));
        }

        let key = format!("{}|{}", code_system_name.trim(), code_system.trim());
        if let Some(answer) = self.answers.read().await.get(&key) {
            return Ok(answer.clone());
        }

        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Code system name: {code_system_name}\nCode system OID: {code_system}"
            )),
        ];
        let completion = self.provider.complete(&messages, &self.options).await?;
        let answer = Self::parse_answer(&completion.content);

        tracing::info!(
            code_system_name,
            code_system,
            vocabulary = answer.as_deref().unwrap_or(NO_VOCABULARY),
            "Resolved vocabulary with model"
        );

        self.answers.write().await.insert(key, answer.clone());
        Ok(answer)
    }
}
