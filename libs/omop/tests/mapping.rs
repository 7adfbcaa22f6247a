use async_trait::async_trait;
use ferrum_llm::{ChatMessage, Completion, CompletionOptions, CompletionProvider, Usage};
use ferrum_omop::{
    generate_sql, ConceptCatalog, ConceptMapper, ConceptRow, Error, LlmVocabularyMapper,
    MappingMode, SqlOptions, TableVocabularyMapper, UnmappedReason, VocabularyMapper,
};
use ferrum_vsac::{ConceptSummary, ValueSetMetadata, ValueSetResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Catalog over a fixed list of (vocabulary, source code, row) triples.
#[derive(Default)]
struct InMemoryCatalog {
    entries: Vec<(MappingMode, String, ConceptRow)>,
    queries: Mutex<Vec<(String, Vec<String>)>>,
}

impl InMemoryCatalog {
    fn with(mut self, mode: MappingMode, vocabulary: &str, row: ConceptRow) -> Self {
        self.entries.push((mode, vocabulary.to_string(), row));
        self
    }
}

#[async_trait]
impl ConceptCatalog for InMemoryCatalog {
    async fn find_concepts(
        &self,
        vocabulary_id: &str,
        codes: &[String],
        mode: MappingMode,
    ) -> ferrum_omop::Result<Vec<ConceptRow>> {
        self.queries
            .lock()
            .unwrap()
            .push((vocabulary_id.to_string(), codes.to_vec()));
        Ok(self
            .entries
            .iter()
            .filter(|(m, v, row)| {
                *m == mode && v == vocabulary_id && codes.contains(&row.source_code)
            })
            .map(|(_, _, row)| row.clone())
            .collect())
    }
}

fn row(concept_id: i64, code: &str, domain: &str, source_code: &str) -> ConceptRow {
    ConceptRow {
        concept_id,
        concept_code: code.to_string(),
        vocabulary_id: "SNOMED".to_string(),
        domain_id: domain.to_string(),
        concept_class_id: "Clinical Finding".to_string(),
        concept_name: format!("Concept {code}"),
        standard_concept: Some("S".to_string()),
        source_code: source_code.to_string(),
    }
}

fn concept(code: &str, system: &str, system_name: &str) -> ConceptSummary {
    ConceptSummary {
        code: code.to_string(),
        code_system: system.to_string(),
        code_system_name: system_name.to_string(),
        code_system_version: None,
        display_name: format!("Display {code}"),
    }
}

fn diabetes() -> ValueSetResult {
    ValueSetResult::with_concepts(
        ValueSetMetadata {
            id: Some("2.16.840.1.113883.3.464.1003.103.12.1001".to_string()),
            display_name: Some("Diabetes".to_string()),
            ..Default::default()
        },
        vec![
            concept("E11.9", "2.16.840.1.113883.6.90", "ICD10CM"),
            concept("E10.9", "2.16.840.1.113883.6.90", "ICD10CM"),
            concept("X1", "9.9.9", "LocalCodes"),
        ],
    )
}

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::default()
        .with(MappingMode::Mapped, "ICD10CM", row(201826, "44054006", "Condition", "E11.9"))
        .with(MappingMode::Mapped, "LOINC", row(3004410, "4548-4", "Measurement", "4548-4"))
        .with(MappingMode::Verbatim, "ICD10CM", row(45576876, "E11.9", "Condition", "E11.9"))
}

#[tokio::test]
async fn mapping_reports_matches_and_unmapped_codes() {
    let catalog = catalog();
    let mapper = ConceptMapper::new(&TableVocabularyMapper, &catalog);
    let result = diabetes();

    let summary = mapper
        .map_all([("2.16.840.1.113883.3.464.1003.103.12.1001", &result)], MappingMode::Mapped)
        .await
        .unwrap();

    let mapping = &summary.valuesets[0];
    assert_eq!(mapping.source_concepts, 3);
    assert_eq!(mapping.concept_ids, vec![201826]);
    assert_eq!(mapping.unmapped.len(), 2);
    assert!(mapping
        .unmapped
        .iter()
        .any(|u| u.code == "E10.9" && u.reason == UnmappedReason::NotInCatalog));
    assert!(mapping
        .unmapped
        .iter()
        .any(|u| u.code == "X1" && u.reason == UnmappedReason::NoVocabulary));

    assert_eq!(summary.total_source_concepts, 3);
    assert_eq!(summary.total_concept_ids, 1);
    assert_eq!(summary.total_unmapped, 2);

    // One query per vocabulary, with the codes deduplicated and sorted.
    let queries = catalog.queries.lock().unwrap();
    assert_eq!(
        *queries,
        vec![("ICD10CM".to_string(), vec!["E10.9".to_string(), "E11.9".to_string()])]
    );
}

#[tokio::test]
async fn mode_selects_the_catalog_query() {
    let catalog = catalog();
    let mapper = ConceptMapper::new(&TableVocabularyMapper, &catalog);
    let result = diabetes();

    let verbatim = mapper
        .map_one("1.2.3", &result, MappingMode::Verbatim)
        .await
        .unwrap();
    assert_eq!(verbatim.concept_ids, vec![45576876]);
}

#[tokio::test]
async fn sentinel_value_sets_are_skipped() {
    let catalog = catalog();
    let mapper = ConceptMapper::new(&TableVocabularyMapper, &catalog);
    let empty = ValueSetResult::empty(ValueSetMetadata::default());
    let failed = ValueSetResult::retrieval_failed("1.2.4", &ferrum_vsac::Error::Timeout);

    let summary = mapper
        .map_all([("1.2.3", &empty), ("1.2.4", &failed)], MappingMode::Mapped)
        .await
        .unwrap();

    assert_eq!(summary.valuesets[0].skipped.as_deref(), Some("EMPTY_VALUESET"));
    assert!(summary.valuesets[1].skipped.is_some());
    assert!(catalog.queries.lock().unwrap().is_empty());
    assert!(matches!(
        generate_sql(&summary, &SqlOptions::default()),
        Err(Error::EmptyConceptSet)
    ));
}

#[tokio::test]
async fn cohort_sql_has_one_cte_per_domain() {
    let catalog = catalog();
    let mapper = ConceptMapper::new(&TableVocabularyMapper, &catalog);
    let diabetes = diabetes();
    let hba1c = ValueSetResult::with_concepts(
        ValueSetMetadata {
            display_name: Some("HbA1c Laboratory Test".to_string()),
            ..Default::default()
        },
        vec![concept("4548-4", "2.16.840.1.113883.6.1", "LOINC")],
    );

    let summary = mapper
        .map_all(
            [("1.2.3", &diabetes), ("2.16.840.1.113883.3.464.1003.198.12.1013", &hba1c)],
            MappingMode::Mapped,
        )
        .await
        .unwrap();

    let sql = generate_sql(&summary, &SqlOptions::default()).unwrap();
    assert!(sql.contains("-- 1.2.3 (Diabetes): 1 concept(s)"));
    assert!(sql.contains("condition_events AS ("));
    assert!(sql.contains("FROM cdm.condition_occurrence"));
    assert!(sql.contains("WHERE condition_concept_id IN (201826)"));
    assert!(sql.contains("FROM cdm.measurement"));
    assert!(sql.contains("WHERE measurement_concept_id IN (3004410)"));
    assert!(sql.contains("UNION"));
    assert!(sql.trim_end().ends_with("ORDER BY person_id;"));

    let preview = generate_sql(
        &summary,
        &SqlOptions {
            schema: "omop".to_string(),
            concept_set_only: true,
        },
    )
    .unwrap();
    assert!(preview.contains("FROM omop.concept"));
    assert!(preview.contains("WHERE concept_id IN (201826, 3004410)"));
    assert!(!preview.contains("person_id"));
}

#[tokio::test]
async fn unsafe_schema_is_rejected() {
    let catalog = catalog();
    let mapper = ConceptMapper::new(&TableVocabularyMapper, &catalog);
    let result = diabetes();
    let summary = mapper
        .map_all([("1.2.3", &result)], MappingMode::Mapped)
        .await
        .unwrap();

    let options = SqlOptions {
        schema: "cdm; DROP TABLE person".to_string(),
        concept_set_only: false,
    };
    assert!(matches!(
        generate_sql(&summary, &options),
        Err(Error::InvalidSchema(_))
    ));
}

#[tokio::test]
async fn non_cohort_domains_cannot_form_a_cohort() {
    let catalog = InMemoryCatalog::default().with(
        MappingMode::Mapped,
        "SNOMED",
        row(4000, "123", "Spec Anatomic Site", "123"),
    );
    let mapper = ConceptMapper::new(&TableVocabularyMapper, &catalog);
    let result = ValueSetResult::with_concepts(
        ValueSetMetadata::default(),
        vec![concept("123", "2.16.840.1.113883.6.96", "SNOMEDCT")],
    );
    let summary = mapper
        .map_all([("1.2.3", &result)], MappingMode::Mapped)
        .await
        .unwrap();

    match generate_sql(&summary, &SqlOptions::default()) {
        Err(Error::NoCohortDomains(found)) => assert_eq!(found, "Spec Anatomic Site"),
        other => panic!("unexpected result: {other:?}"),
    }
}

struct CountingProvider {
    answer: &'static str,
    calls: AtomicUsize,
}

#[async_trait]
impl CompletionProvider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> ferrum_llm::Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Completion {
            content: self.answer.to_string(),
            usage: Usage::default(),
            provider: self.name().to_string(),
        })
    }
}

#[tokio::test]
async fn llm_mapper_asks_once_per_unknown_system() {
    let provider = Arc::new(CountingProvider {
        answer: "SNOMED",
        calls: AtomicUsize::new(0),
    });
    let mapper = LlmVocabularyMapper::new(provider.clone(), CompletionOptions::default());

    for _ in 0..3 {
        assert_eq!(
            mapper.vocabulary_for("SCT-Local", "1.2.3").await.unwrap(),
            Some("SNOMED".to_string())
        );
    }
    assert_eq!(
        mapper.vocabulary_for("ICD10CM", "").await.unwrap(),
        Some("ICD10CM".to_string())
    );
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}
