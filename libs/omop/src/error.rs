//! Error types for ferrum-omop

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid schema name '{0}': expected a plain SQL identifier")]
    InvalidSchema(String),

    #[error("Vocabulary lookup failed: {0}")]
    Completion(#[from] ferrum_llm::Error),

    #[error("No OMOP concepts to query")]
    EmptyConceptSet,

    #[error("No concepts fall into a cohort domain (found: {0})")]
    NoCohortDomains(String),
}
