//! SVS response normalization
//!
//! Turns a `RetrieveMultipleValueSetsResponse` (or `RetrieveValueSetResponse`)
//! payload into a [`ValueSetResult`]. This is a total function: malformed or
//! unexpected payloads come back as sentinel results, never as errors.
//!
//! | payload                                | content                    |
//! |----------------------------------------|----------------------------|
//! | not XML                                | `ParseError`               |
//! | no `DescribedValueSet`                 | `NoValueSet`               |
//! | value set without `ConceptList`        | `EmptyValueSet`            |
//! | `ConceptList` with no complete concept | `EmptyValueSet`            |
//! | value set with `ConceptList`           | `Concepts` (complete only) |

use crate::models::{ConceptSummary, ValueSetMetadata, ValueSetResult};
use crate::purpose::parse_purpose;
use crate::xml::{parse_document, Element};

const DESCRIBED_VALUE_SET: &str = "DescribedValueSet";
const CONCEPT_LIST: &str = "ConceptList";
const CONCEPT: &str = "Concept";

pub fn normalize_response(payload: &str) -> ValueSetResult {
    let root = match parse_document(payload) {
        Ok(root) => root,
        Err(e) => {
            tracing::warn!(error = %e, "VSAC response is not well-formed XML");
            return ValueSetResult::parse_error(e.to_string());
        }
    };

    // Only the first value set is used; the client requests one OID per call.
    let Some(value_set) = first_value_set(&root) else {
        tracing::debug!(root = %root.name, "VSAC response contains no value set");
        return ValueSetResult::no_valueset();
    };

    let metadata = read_metadata(value_set);

    let Some(concept_list) = value_set.child(CONCEPT_LIST) else {
        tracing::debug!(
            oid = metadata.id.as_deref().unwrap_or_default(),
            "Value set has no concept list"
        );
        return ValueSetResult::empty(metadata);
    };

    let concepts: Vec<ConceptSummary> = concept_list
        .children_named(CONCEPT)
        .filter_map(read_concept)
        .collect();

    if concepts.is_empty() {
        tracing::debug!(
            oid = metadata.id.as_deref().unwrap_or_default(),
            "Value set has no active concepts"
        );
        return ValueSetResult::empty(metadata);
    }

    ValueSetResult::with_concepts(metadata, concepts)
}

fn first_value_set(root: &Element) -> Option<&Element> {
    if root.is_named(DESCRIBED_VALUE_SET) {
        Some(root)
    } else {
        root.child(DESCRIBED_VALUE_SET)
    }
}

fn read_metadata(value_set: &Element) -> ValueSetMetadata {
    let purpose = value_set
        .child_text("Purpose")
        .map(|text| parse_purpose(&text))
        .unwrap_or_default();

    ValueSetMetadata {
        id: value_set.attr("ID").map(str::to_string),
        display_name: value_set.attr("displayName").map(str::to_string),
        version: value_set.attr("version").map(str::to_string),
        source: value_set.child_text("Source"),
        value_set_type: value_set.child_text("Type"),
        binding: value_set.child_text("Binding"),
        status: value_set.child_text("Status"),
        revision_date: value_set.child_text("RevisionDate"),
        clinical_focus: purpose.clinical_focus,
        data_element_scope: purpose.data_element_scope,
        inclusion_criteria: purpose.inclusion_criteria,
        exclusion_criteria: purpose.exclusion_criteria,
    }
}

/// A concept needs all four of code, codeSystem, codeSystemName and
/// displayName; anything less is skipped.
fn read_concept(node: &Element) -> Option<ConceptSummary> {
    Some(ConceptSummary {
        code: node.attr("code")?.to_string(),
        code_system: node.attr("codeSystem")?.to_string(),
        code_system_name: node.attr("codeSystemName")?.to_string(),
        code_system_version: node.attr("codeSystemVersion").map(str::to_string),
        display_name: node.attr("displayName")?.to_string(),
    })
}
