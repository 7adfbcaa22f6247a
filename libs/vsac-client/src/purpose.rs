//! Parsing of the VSAC `Purpose` field
//!
//! VSAC packs four labelled segments into one string:
//! `(Clinical Focus: ...),(Data Element Scope: ...),(Inclusion Criteria: ...),(Exclusion Criteria: ...)`.
//! Each segment is extracted on its own; a missing label leaves only that field empty.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalPurpose {
    pub clinical_focus: Option<String>,
    pub data_element_scope: Option<String>,
    pub inclusion_criteria: Option<String>,
    pub exclusion_criteria: Option<String>,
}

const CLINICAL_FOCUS: &str = "Clinical Focus";
const DATA_ELEMENT_SCOPE: &str = "Data Element Scope";
const INCLUSION_CRITERIA: &str = "Inclusion Criteria";
const EXCLUSION_CRITERIA: &str = "Exclusion Criteria";

/// Opening of any labelled segment: `(` then the label then `:`.
fn segment_opening() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let labels = [
            CLINICAL_FOCUS,
            DATA_ELEMENT_SCOPE,
            INCLUSION_CRITERIA,
            EXCLUSION_CRITERIA,
        ]
        .map(regex::escape)
        .join("|");
        Regex::new(&format!(r"(?i)\(\s*({labels})\s*:"))
            .expect("purpose segment pattern is valid")
    })
}

/// Body of a segment whose opening `(` was already consumed.
///
/// The body ends at the `)` balancing that opening. Unbalanced text falls
/// back to the last `)` of the region, or to the whole region.
fn segment_body(region: &str) -> &str {
    let mut depth = 1usize;
    for (i, c) in region.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return &region[..i];
                }
            }
            _ => {}
        }
    }
    match region.rfind(')') {
        Some(i) => &region[..i],
        None => region,
    }
}

/// Each label is extracted on its own. A segment's region stops where the
/// next labelled segment opens, so separators and trailing text between
/// segments never leak into a value. The first occurrence of a label wins.
pub fn parse_purpose(text: &str) -> ClinicalPurpose {
    let openings: Vec<(&str, usize, usize)> = segment_opening()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = caps.get(1)?.as_str();
            Some((label, whole.start(), whole.end()))
        })
        .collect();

    let mut purpose = ClinicalPurpose::default();
    for (index, &(label, _, body_start)) in openings.iter().enumerate() {
        let region_end = openings
            .get(index + 1)
            .map_or(text.len(), |&(_, next_start, _)| next_start);
        let value = segment_body(&text[body_start..region_end]).trim();
        if value.is_empty() {
            continue;
        }

        let field = if label.eq_ignore_ascii_case(CLINICAL_FOCUS) {
            &mut purpose.clinical_focus
        } else if label.eq_ignore_ascii_case(DATA_ELEMENT_SCOPE) {
            &mut purpose.data_element_scope
        } else if label.eq_ignore_ascii_case(INCLUSION_CRITERIA) {
            &mut purpose.inclusion_criteria
        } else {
            &mut purpose.exclusion_criteria
        };
        if field.is_none() {
            *field = Some(value.to_string());
        }
    }
    purpose
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "(Clinical Focus: This value set contains concepts that represent diabetes.),\
(Data Element Scope: This value set may use a model element related to Diagnosis.),\
(Inclusion Criteria: Includes concepts that identify type 1 and type 2 diabetes.),\
(Exclusion Criteria: Excludes concepts that identify gestational diabetes.)";

    #[test]
    fn parses_all_four_segments() {
        let purpose = parse_purpose(FULL);
        assert_eq!(
            purpose.clinical_focus.as_deref(),
            Some("This value set contains concepts that represent diabetes.")
        );
        assert_eq!(
            purpose.data_element_scope.as_deref(),
            Some("This value set may use a model element related to Diagnosis.")
        );
        assert_eq!(
            purpose.inclusion_criteria.as_deref(),
            Some("Includes concepts that identify type 1 and type 2 diabetes.")
        );
        assert_eq!(
            purpose.exclusion_criteria.as_deref(),
            Some("Excludes concepts that identify gestational diabetes.")
        );
    }

    #[test]
    fn segment_order_does_not_matter() {
        let text = "(Exclusion Criteria: None.),(Clinical Focus: Asthma.)";
        let purpose = parse_purpose(text);
        assert_eq!(purpose.clinical_focus.as_deref(), Some("Asthma."));
        assert_eq!(purpose.exclusion_criteria.as_deref(), Some("None."));
        assert_eq!(purpose.data_element_scope, None);
        assert_eq!(purpose.inclusion_criteria, None);
    }

    #[test]
    fn nested_parentheses_stay_in_segment() {
        let text = "(Clinical Focus: Hypertension (essential) and related codes.),(Inclusion Criteria: All.)";
        let purpose = parse_purpose(text);
        assert_eq!(
            purpose.clinical_focus.as_deref(),
            Some("Hypertension (essential) and related codes.")
        );
        assert_eq!(purpose.inclusion_criteria.as_deref(), Some("All."));
    }

    #[test]
    fn missing_or_unlabelled_text_yields_nothing() {
        assert_eq!(parse_purpose(""), ClinicalPurpose::default());
        assert_eq!(
            parse_purpose("Free text without any labels"),
            ClinicalPurpose::default()
        );
    }

    #[test]
    fn empty_segment_is_none() {
        let purpose = parse_purpose("(Clinical Focus: ),(Data Element Scope: Diagnosis.)");
        assert_eq!(purpose.clinical_focus, None);
        assert_eq!(purpose.data_element_scope.as_deref(), Some("Diagnosis."));
    }

    #[test]
    fn semicolon_separator_does_not_leak_into_previous_segment() {
        let purpose = parse_purpose("(Clinical Focus: Asthma.); (Data Element Scope: Dx.)");
        assert_eq!(purpose.clinical_focus.as_deref(), Some("Asthma."));
        assert_eq!(purpose.data_element_scope.as_deref(), Some("Dx."));
    }

    #[test]
    fn trailing_text_after_last_segment_is_ignored() {
        assert_eq!(
            parse_purpose("(Clinical Focus: Asthma.).").clinical_focus.as_deref(),
            Some("Asthma.")
        );
        let purpose = parse_purpose("Purpose: (Clinical Focus: Asthma.) See notes.");
        assert_eq!(purpose.clinical_focus.as_deref(), Some("Asthma."));
        assert_eq!(purpose.exclusion_criteria, None);
    }

    #[test]
    fn unbalanced_parenthesis_stays_within_its_segment() {
        let text = "(Clinical Focus: Hypertension (essential.),(Inclusion Criteria: All.)";
        let purpose = parse_purpose(text);
        assert_eq!(
            purpose.clinical_focus.as_deref(),
            Some("Hypertension (essential.")
        );
        assert_eq!(purpose.inclusion_criteria.as_deref(), Some("All."));
    }
}
