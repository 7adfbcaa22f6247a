//! Normalized value set model

use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize, Serializer};

/// Diagnostic codes emitted in place of concepts on the wire.
pub const EMPTY_VALUESET: &str = "EMPTY_VALUESET";
pub const NO_VALUESET: &str = "NO_VALUESET";
pub const PARSE_ERROR: &str = "PARSE_ERROR";

const SENTINEL_SYSTEM: &str = "N/A";

/// One member of a value set expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptSummary {
    pub code: String,
    pub code_system: String,
    pub code_system_name: String,
    pub code_system_version: Option<String>,
    pub display_name: String,
}

impl ConceptSummary {
    fn sentinel(code: &str, display_name: String) -> Self {
        Self {
            code: code.to_string(),
            code_system: SENTINEL_SYSTEM.to_string(),
            code_system_name: SENTINEL_SYSTEM.to_string(),
            code_system_version: None,
            display_name,
        }
    }
}

/// Value set attributes. Every field is optional because VSAC omits freely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSetMetadata {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub version: Option<String>,
    pub source: Option<String>,
    #[serde(rename = "type")]
    pub value_set_type: Option<String>,
    pub binding: Option<String>,
    pub status: Option<String>,
    pub revision_date: Option<String>,
    pub clinical_focus: Option<String>,
    pub data_element_scope: Option<String>,
    pub inclusion_criteria: Option<String>,
    pub exclusion_criteria: Option<String>,
}

/// What a retrieval produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSetContent {
    /// The value set and its concepts.
    Concepts(Vec<ConceptSummary>),
    /// The value set exists but has no concept list, typically because it was retired.
    EmptyValueSet,
    /// The payload contained no value set at all.
    NoValueSet,
    /// The payload could not be read as XML.
    ParseError(String),
    /// Retrieval failed inside a batch; the error is carried instead of raised.
    RetrievalFailed { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSetResult {
    pub metadata: ValueSetMetadata,
    pub content: ValueSetContent,
}

impl ValueSetResult {
    pub fn with_concepts(metadata: ValueSetMetadata, concepts: Vec<ConceptSummary>) -> Self {
        Self {
            metadata,
            content: ValueSetContent::Concepts(concepts),
        }
    }

    pub fn empty(metadata: ValueSetMetadata) -> Self {
        Self {
            metadata,
            content: ValueSetContent::EmptyValueSet,
        }
    }

    pub fn no_valueset() -> Self {
        Self {
            metadata: ValueSetMetadata::default(),
            content: ValueSetContent::NoValueSet,
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            metadata: ValueSetMetadata {
                display_name: Some("Parse Error".to_string()),
                status: Some("ERROR".to_string()),
                ..Default::default()
            },
            content: ValueSetContent::ParseError(message.into()),
        }
    }

    pub fn retrieval_failed(oid: &str, error: &Error) -> Self {
        Self {
            metadata: ValueSetMetadata {
                id: Some(oid.to_string()),
                display_name: Some("Retrieval Error".to_string()),
                status: Some("ERROR".to_string()),
                ..Default::default()
            },
            content: ValueSetContent::RetrievalFailed {
                kind: error.kind(),
                message: error.to_string(),
            },
        }
    }

    /// Real concepts only; empty for every sentinel outcome.
    pub fn concepts(&self) -> &[ConceptSummary] {
        match &self.content {
            ValueSetContent::Concepts(concepts) => concepts,
            _ => &[],
        }
    }

    pub fn concept_count(&self) -> usize {
        self.concepts().len()
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(self.content, ValueSetContent::Concepts(_))
    }

    pub fn error(&self) -> Option<&str> {
        match &self.content {
            ValueSetContent::RetrievalFailed { message, .. } => Some(message),
            _ => None,
        }
    }

    /// The legacy concept list: real concepts, or a single diagnostic
    /// concept for the empty/missing/unparseable outcomes.
    pub fn wire_concepts(&self) -> Vec<ConceptSummary> {
        match &self.content {
            ValueSetContent::Concepts(concepts) => concepts.clone(),
            ValueSetContent::EmptyValueSet => vec![ConceptSummary::sentinel(
                EMPTY_VALUESET,
                "Value set has no active concepts (likely retired)".to_string(),
            )],
            ValueSetContent::NoValueSet => vec![ConceptSummary::sentinel(
                NO_VALUESET,
                "No value set found in VSAC response".to_string(),
            )],
            ValueSetContent::ParseError(message) => vec![ConceptSummary::sentinel(
                PARSE_ERROR,
                format!("Failed to parse VSAC response: {message}"),
            )],
            ValueSetContent::RetrievalFailed { .. } => Vec::new(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireResult<'a> {
    metadata: &'a ValueSetMetadata,
    concepts: Vec<ConceptSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    guidance: Option<&'static str>,
}

impl Serialize for ValueSetResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let kind = match &self.content {
            ValueSetContent::RetrievalFailed { kind, .. } => Some(*kind),
            _ => None,
        };
        WireResult {
            metadata: &self.metadata,
            concepts: self.wire_concepts(),
            error: self.error(),
            error_kind: kind,
            guidance: kind.map(|k| k.guidance()),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn concept() -> ConceptSummary {
        ConceptSummary {
            code: "E11.9".to_string(),
            code_system: "2.16.840.1.113883.6.90".to_string(),
            code_system_name: "ICD10CM".to_string(),
            code_system_version: None,
            display_name: "Type 2 diabetes mellitus without complications".to_string(),
        }
    }

    #[test]
    fn concept_serializes_in_camel_case() {
        let value = serde_json::to_value(concept()).unwrap();
        assert_eq!(
            value,
            json!({
                "code": "E11.9",
                "codeSystem": "2.16.840.1.113883.6.90",
                "codeSystemName": "ICD10CM",
                "codeSystemVersion": null,
                "displayName": "Type 2 diabetes mellitus without complications"
            })
        );
    }

    #[test]
    fn sentinels_render_a_single_diagnostic_concept() {
        let empty = ValueSetResult::empty(ValueSetMetadata::default());
        assert!(empty.concepts().is_empty());
        assert_eq!(empty.wire_concepts().len(), 1);
        assert_eq!(empty.wire_concepts()[0].code, EMPTY_VALUESET);

        assert_eq!(ValueSetResult::no_valueset().wire_concepts()[0].code, NO_VALUESET);

        let parse = ValueSetResult::parse_error("unexpected EOF");
        let wire = parse.wire_concepts();
        assert_eq!(wire[0].code, PARSE_ERROR);
        assert!(wire[0].display_name.contains("unexpected EOF"));
        assert_eq!(parse.metadata.status.as_deref(), Some("ERROR"));
        assert_eq!(parse.metadata.display_name.as_deref(), Some("Parse Error"));
    }

    #[test]
    fn retrieval_failure_serializes_error_with_empty_concepts() {
        let result = ValueSetResult::retrieval_failed("1.2.3", &Error::RateLimit);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["concepts"], json!([]));
        assert_eq!(value["error"], json!("Rate limit exceeded (HTTP 429)"));
        assert_eq!(value["errorKind"], json!("rate_limit"));
        assert_eq!(value["metadata"]["status"], json!("ERROR"));
        assert_eq!(value["metadata"]["id"], json!("1.2.3"));
        assert!(value["guidance"].as_str().is_some());
    }

    #[test]
    fn successful_result_has_no_error_fields() {
        let result = ValueSetResult::with_concepts(ValueSetMetadata::default(), vec![concept()]);
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("error").is_none());
        assert_eq!(value["concepts"].as_array().unwrap().len(), 1);
        assert!(!result.is_sentinel());
    }
}
