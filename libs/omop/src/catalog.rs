//! OMOP concept catalog
//!
//! Three lookup modes over the CDM vocabulary tables:
//!
//! - `Verbatim`: the source code in its own vocabulary
//! - `Standard`: as verbatim, restricted to standard concepts
//! - `Mapped`: the source code followed through `Maps to` to its standard target

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMode {
    Verbatim,
    Standard,
    #[default]
    Mapped,
}

impl fmt::Display for MappingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MappingMode::Verbatim => "verbatim",
            MappingMode::Standard => "standard",
            MappingMode::Mapped => "mapped",
        })
    }
}

/// One matched concept. `source_code` is the code that was looked up, which
/// differs from `concept_code` in mapped mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConceptRow {
    pub concept_id: i64,
    pub concept_code: String,
    pub vocabulary_id: String,
    pub domain_id: String,
    pub concept_class_id: String,
    pub concept_name: String,
    pub standard_concept: Option<String>,
    pub source_code: String,
}

#[async_trait]
pub trait ConceptCatalog: Send + Sync {
    async fn find_concepts(
        &self,
        vocabulary_id: &str,
        codes: &[String],
        mode: MappingMode,
    ) -> Result<Vec<ConceptRow>>;
}

/// `[A-Za-z_][A-Za-z0-9_]*`, the only schema names interpolated into SQL.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn checked_schema(schema: &str) -> Result<&str> {
    if is_plain_identifier(schema) {
        Ok(schema)
    } else {
        Err(Error::InvalidSchema(schema.to_string()))
    }
}

fn query_for(schema: &str, mode: MappingMode) -> String {
    const COLUMNS: &str = "c.concept_id::bigint AS concept_id, c.concept_code, c.vocabulary_id, \
         c.domain_id, c.concept_class_id, c.concept_name, c.standard_concept";

    match mode {
        MappingMode::Verbatim => format!(
            "SELECT {COLUMNS}, c.concept_code AS source_code
             FROM {schema}.concept c
             WHERE c.vocabulary_id = $1
               AND c.concept_code = ANY($2)
               AND c.invalid_reason IS NULL
             ORDER BY c.concept_id"
        ),
        MappingMode::Standard => format!(
            "SELECT {COLUMNS}, c.concept_code AS source_code
             FROM {schema}.concept c
             WHERE c.vocabulary_id = $1
               AND c.concept_code = ANY($2)
               AND c.standard_concept = 'S'
               AND c.invalid_reason IS NULL
             ORDER BY c.concept_id"
        ),
        MappingMode::Mapped => format!(
            "SELECT {COLUMNS}, s.concept_code AS source_code
             FROM {schema}.concept s
             JOIN {schema}.concept_relationship r
               ON r.concept_id_1 = s.concept_id
              AND r.relationship_id = 'Maps to'
              AND r.invalid_reason IS NULL
             JOIN {schema}.concept c
               ON c.concept_id = r.concept_id_2
              AND c.invalid_reason IS NULL
             WHERE s.vocabulary_id = $1
               AND s.concept_code = ANY($2)
             ORDER BY c.concept_id"
        ),
    }
}

/// Catalog backed by an OMOP CDM vocabulary schema in Postgres.
#[derive(Clone)]
pub struct PgConceptCatalog {
    pool: PgPool,
    schema: String,
}

impl PgConceptCatalog {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        checked_schema(&schema)?;
        Ok(Self { pool, schema })
    }

    /// Lazily connecting pool; the first query opens the connection.
    pub fn connect_lazy(
        url: &str,
        schema: impl Into<String>,
        max_connections: u32,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)
            .map_err(Error::Database)?;
        Self::new(pool, schema)
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }
}

#[async_trait]
impl ConceptCatalog for PgConceptCatalog {
    async fn find_concepts(
        &self,
        vocabulary_id: &str,
        codes: &[String],
        mode: MappingMode,
    ) -> Result<Vec<ConceptRow>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ConceptRow>(&query_for(&self.schema, mode))
            .bind(vocabulary_id)
            .bind(codes)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        tracing::debug!(
            vocabulary_id,
            %mode,
            codes = codes.len(),
            rows = rows.len(),
            "Concept lookup"
        );
        Ok(rows)
    }
}
