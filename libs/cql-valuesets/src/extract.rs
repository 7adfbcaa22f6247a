//! `valueset` declaration scanner

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Matches `valueset "<name>": 'urn:oid:<dotted-numeric>'`.
///
/// Only single-quoted OID references are recognised; `"urn:oid:..."` never matches.
const VALUESET_PATTERN: &str = r#"(?i)\bvalueset\s+"([^"]+)"\s*:\s*'urn:oid:([0-9.]+)'"#;

fn valueset_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(VALUESET_PATTERN).expect("valueset pattern is valid"))
}

/// One `valueset` declaration as written in the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSetDeclaration {
    pub name: String,
    pub oid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Distinct OIDs in first-seen order.
    pub oids: Vec<String>,
    /// Every matched declaration in source order.
    pub valuesets: Vec<ValueSetDeclaration>,
}

impl ExtractionResult {
    /// Declared name for `oid`. When an OID is declared more than once the
    /// first declaration wins.
    pub fn name_for(&self, oid: &str) -> Option<&str> {
        self.valuesets
            .iter()
            .find(|vs| vs.oid == oid)
            .map(|vs| vs.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.valuesets.is_empty()
    }

    pub(crate) fn from_declarations(valuesets: Vec<ValueSetDeclaration>) -> Self {
        let oids = {
            let mut seen = HashSet::new();
            valuesets
                .iter()
                .filter(|vs| seen.insert(vs.oid.as_str()))
                .map(|vs| vs.oid.clone())
                .collect()
        };
        Self { oids, valuesets }
    }
}

/// Extract every `valueset` declaration from `cql`.
///
/// Arbitrary text is accepted; text without declarations yields an empty result.
pub fn extract_valuesets(cql: &str) -> ExtractionResult {
    let declarations: Vec<ValueSetDeclaration> = valueset_regex()
        .captures_iter(cql)
        .map(|caps| ValueSetDeclaration {
            name: caps[1].to_string(),
            oid: caps[2].to_string(),
        })
        .collect();

    let result = ExtractionResult::from_declarations(declarations);
    tracing::debug!(
        declarations = result.valuesets.len(),
        unique_oids = result.oids.len(),
        "Extracted valueset declarations"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIABETES_OID: &str = "2.16.840.1.113883.3.464.1003.103.12.1001";

    #[test]
    fn extracts_single_declaration() {
        let cql = format!(r#"valueset "Diabetes": 'urn:oid:{DIABETES_OID}'"#);
        let result = extract_valuesets(&cql);
        assert_eq!(result.oids, vec![DIABETES_OID.to_string()]);
        assert_eq!(
            result.valuesets,
            vec![ValueSetDeclaration {
                name: "Diabetes".to_string(),
                oid: DIABETES_OID.to_string(),
            }]
        );
    }

    #[test]
    fn double_quoted_reference_is_ignored() {
        let result = extract_valuesets(r#"valueset "A": "urn:oid:1.2.3""#);
        assert_eq!(result, ExtractionResult::default());
    }

    #[test]
    fn keyword_is_case_insensitive() {
        let result = extract_valuesets(r#"ValueSet "Hba1c": 'urn:oid:2.16.840.1.113883.3.464.1003.198.12.1013'"#);
        assert_eq!(result.valuesets.len(), 1);
        assert_eq!(result.valuesets[0].name, "Hba1c");
    }

    #[test]
    fn deduplicates_oids_but_keeps_every_declaration() {
        let cql = r#"
            valueset "Diabetes": 'urn:oid:1.2.3'
            valueset "Diabetes Alias": 'urn:oid:1.2.3'
            valueset "Hypertension": 'urn:oid:1.2.4'
        "#;
        let result = extract_valuesets(cql);
        assert_eq!(result.valuesets.len(), 3);
        assert_eq!(result.oids, vec!["1.2.3".to_string(), "1.2.4".to_string()]);
    }

    #[test]
    fn first_declaration_wins_for_name_lookup() {
        let cql = r#"
            valueset "First": 'urn:oid:1.2.3'
            valueset "Second": 'urn:oid:1.2.3'
        "#;
        let result = extract_valuesets(cql);
        assert_eq!(result.name_for("1.2.3"), Some("First"));
        assert_eq!(result.name_for("9.9.9"), None);
    }

    #[test]
    fn declaration_with_version_suffix_still_matches() {
        let cql = r#"valueset "Office Visit": 'urn:oid:2.16.840.1.113883.3.464.1003.101.12.1001' version '20230301'"#;
        let result = extract_valuesets(cql);
        assert_eq!(
            result.oids,
            vec!["2.16.840.1.113883.3.464.1003.101.12.1001".to_string()]
        );
    }

    #[test]
    fn empty_and_unrelated_text_yield_empty_result() {
        assert!(extract_valuesets("").is_empty());
        assert!(extract_valuesets("define \"In Demographic\": AgeInYears() >= 18").is_empty());
        assert!(extract_valuesets(r#"codesystem "LOINC": 'urn:oid:2.16.840.1.113883.6.1'"#).is_empty());
    }
}
