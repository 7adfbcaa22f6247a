//! ValueSet extraction for CQL sources
//!
//! Scans Clinical Quality Language text for `valueset` declarations and pulls
//! out the declared names and OIDs, then filters OIDs against the dotted
//! numeric grammar used by the value-set repository.
//!
//! ```rust
//! use ferrum_cql::{extract_valuesets, validate_oids};
//!
//! let cql = r#"valueset "Diabetes": 'urn:oid:2.16.840.1.113883.3.464.1003.103.12.1001'"#;
//! let extracted = extract_valuesets(cql);
//! assert_eq!(extracted.oids, vec!["2.16.840.1.113883.3.464.1003.103.12.1001"]);
//! assert_eq!(validate_oids(&extracted.oids).len(), 1);
//! ```

pub mod error;
pub mod extract;
pub mod strategy;
pub mod validate;

pub use error::{Error, Result};
pub use extract::{extract_valuesets, ExtractionResult, ValueSetDeclaration};
#[cfg(feature = "llm-extraction")]
pub use strategy::LlmExtraction;
pub use strategy::{ExtractionStrategy, RegexExtraction};
pub use validate::{
    is_valid_oid, partition_json_values, partition_oids, validate_oids, OidValidationResult,
};
