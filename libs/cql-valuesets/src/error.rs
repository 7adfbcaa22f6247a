//! Error types for extraction strategies
//!
//! The regex extractor and the validator never fail; only model-backed
//! strategies can.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[cfg(feature = "llm-extraction")]
    #[error("Completion provider error: {0}")]
    Completion(#[from] ferrum_llm::Error),

    #[error("Model answer is not a valid extraction result: {0}")]
    InvalidAnswer(String),
}
