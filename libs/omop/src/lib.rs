//! OMOP CDM mapping for VSAC value sets
//!
//! Takes normalized value sets, resolves each concept's code system to an
//! OMOP `vocabulary_id`, looks the codes up in the `concept` table and renders
//! cohort SQL from the resulting concept ids.
//!
//! The database and the model are behind traits ([`ConceptCatalog`],
//! [`VocabularyMapper`]); [`PgConceptCatalog`] is the Postgres implementation.

pub mod catalog;
pub mod error;
pub mod mapping;
pub mod sql;
pub mod vocabulary;

pub use catalog::{is_plain_identifier, ConceptCatalog, ConceptRow, MappingMode, PgConceptCatalog};
pub use error::{Error, Result};
pub use mapping::{
    ConceptMapper, MappingSummary, UnmappedCode, UnmappedReason, ValueSetMapping,
};
pub use sql::{generate_sql, CohortDomain, SqlOptions};
pub use vocabulary::{
    lookup_vocabulary, LlmVocabularyMapper, TableVocabularyMapper, VocabularyMapper,
};
