//! Value set to OMOP concept mapping

use crate::catalog::{ConceptCatalog, ConceptRow, MappingMode};
use crate::error::Result;
use crate::vocabulary::VocabularyMapper;
use ferrum_vsac::models::{EMPTY_VALUESET, NO_VALUESET, PARSE_ERROR};
use ferrum_vsac::{ValueSetContent, ValueSetResult};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedReason {
    /// The code system has no OMOP vocabulary.
    NoVocabulary,
    /// The vocabulary is known but the catalog returned nothing for the code.
    NotInCatalog,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmappedCode {
    pub code: String,
    pub code_system_name: String,
    pub reason: UnmappedReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueSetMapping {
    pub oid: String,
    pub display_name: Option<String>,
    pub source_concepts: usize,
    /// Distinct, ascending.
    pub concept_ids: Vec<i64>,
    pub rows: Vec<ConceptRow>,
    pub unmapped: Vec<UnmappedCode>,
    /// Set when the value set carried no concepts to map.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl ValueSetMapping {
    fn skipped(oid: &str, result: &ValueSetResult, reason: String) -> Self {
        Self {
            oid: oid.to_string(),
            display_name: result.metadata.display_name.clone(),
            source_concepts: 0,
            concept_ids: Vec::new(),
            rows: Vec::new(),
            unmapped: Vec::new(),
            skipped: Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingSummary {
    pub mode: MappingMode,
    pub valuesets: Vec<ValueSetMapping>,
    pub total_source_concepts: usize,
    pub total_concept_ids: usize,
    pub total_unmapped: usize,
}

impl MappingSummary {
    fn new(mode: MappingMode, valuesets: Vec<ValueSetMapping>) -> Self {
        let total_source_concepts = valuesets.iter().map(|v| v.source_concepts).sum();
        let total_unmapped = valuesets.iter().map(|v| v.unmapped.len()).sum();
        let mut summary = Self {
            mode,
            valuesets,
            total_source_concepts,
            total_concept_ids: 0,
            total_unmapped,
        };
        summary.total_concept_ids = summary.concept_ids().len();
        summary
    }

    /// Every matched concept id across all value sets.
    pub fn concept_ids(&self) -> BTreeSet<i64> {
        self.valuesets
            .iter()
            .flat_map(|v| v.concept_ids.iter().copied())
            .collect()
    }

    /// Matched concept ids grouped by OMOP `domain_id`.
    pub fn concept_ids_by_domain(&self) -> BTreeMap<String, BTreeSet<i64>> {
        let mut domains: BTreeMap<String, BTreeSet<i64>> = BTreeMap::new();
        for row in self.valuesets.iter().flat_map(|v| v.rows.iter()) {
            domains
                .entry(row.domain_id.clone())
                .or_default()
                .insert(row.concept_id);
        }
        domains
    }
}

/// Resolves vocabularies and queries the catalog for each value set.
pub struct ConceptMapper<'a> {
    vocabulary: &'a dyn VocabularyMapper,
    catalog: &'a dyn ConceptCatalog,
}

impl<'a> ConceptMapper<'a> {
    pub fn new(vocabulary: &'a dyn VocabularyMapper, catalog: &'a dyn ConceptCatalog) -> Self {
        Self { vocabulary, catalog }
    }

    pub async fn map_all<'r, I>(&self, valuesets: I, mode: MappingMode) -> Result<MappingSummary>
    where
        I: IntoIterator<Item = (&'r str, &'r ValueSetResult)>,
    {
        let mut mappings = Vec::new();
        for (oid, result) in valuesets {
            mappings.push(self.map_one(oid, result, mode).await?);
        }
        Ok(MappingSummary::new(mode, mappings))
    }

    #[tracing::instrument(name = "omop.map_valueset", skip(self, result), fields(%mode))]
    pub async fn map_one(
        &self,
        oid: &str,
        result: &ValueSetResult,
        mode: MappingMode,
    ) -> Result<ValueSetMapping> {
        let concepts = match &result.content {
            ValueSetContent::Concepts(concepts) => concepts,
            ValueSetContent::EmptyValueSet => {
                return Ok(ValueSetMapping::skipped(oid, result, EMPTY_VALUESET.to_string()))
            }
            ValueSetContent::NoValueSet => {
                return Ok(ValueSetMapping::skipped(oid, result, NO_VALUESET.to_string()))
            }
            ValueSetContent::ParseError(_) => {
                return Ok(ValueSetMapping::skipped(oid, result, PARSE_ERROR.to_string()))
            }
            ValueSetContent::RetrievalFailed { message, .. } => {
                return Ok(ValueSetMapping::skipped(oid, result, message.clone()))
            }
        };

        let mut unmapped = Vec::new();
        let mut by_vocabulary: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
        for concept in concepts {
            match self
                .vocabulary
                .vocabulary_for(&concept.code_system_name, &concept.code_system)
                .await?
            {
                Some(vocabulary) => by_vocabulary
                    .entry(vocabulary)
                    .or_default()
                    .push((concept.code.clone(), concept.code_system_name.clone())),
                None => unmapped.push(UnmappedCode {
                    code: concept.code.clone(),
                    code_system_name: concept.code_system_name.clone(),
                    reason: UnmappedReason::NoVocabulary,
                }),
            }
        }

        let mut rows = Vec::new();
        for (vocabulary, entries) in &by_vocabulary {
            let mut codes: Vec<String> = entries.iter().map(|(code, _)| code.clone()).collect();
            codes.sort();
            codes.dedup();

            let found = self.catalog.find_concepts(vocabulary, &codes, mode).await?;
            let matched: HashSet<&str> = found.iter().map(|r| r.source_code.as_str()).collect();

            let mut reported = HashSet::new();
            for (code, system) in entries {
                if !matched.contains(code.as_str()) && reported.insert(code.as_str()) {
                    unmapped.push(UnmappedCode {
                        code: code.clone(),
                        code_system_name: system.clone(),
                        reason: UnmappedReason::NotInCatalog,
                    });
                }
            }
            rows.extend(found);
        }

        let concept_ids: Vec<i64> = rows
            .iter()
            .map(|r| r.concept_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        tracing::info!(
            oid,
            source_concepts = concepts.len(),
            concept_ids = concept_ids.len(),
            unmapped = unmapped.len(),
            "Mapped value set"
        );

        Ok(ValueSetMapping {
            oid: oid.to_string(),
            display_name: result.metadata.display_name.clone(),
            source_concepts: concepts.len(),
            concept_ids,
            rows,
            unmapped,
            skipped: None,
        })
    }
}
