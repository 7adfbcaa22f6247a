//! VSAC value set client
//!
//! Fetches value sets from the NLM Value Set Authority Center SVS API,
//! normalizes the XML payload into [`ValueSetResult`]s and caches them for
//! the lifetime of the process.
//!
//! # Examples
//!
//! ## Retrieve one value set
//!
//! ```rust,no_run
//! use ferrum_vsac::{Credentials, VsacClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = VsacClient::new()?;
//! let credentials = Credentials::new("apikey", "my-umls-api-key");
//! let result = client
//!     .retrieve("2.16.840.1.113883.3.464.1003.103.12.1001", None, &credentials)
//!     .await?;
//! println!("{} concepts", result.concept_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Retrieve many value sets
//!
//! Failures are isolated per OID; the batch itself never fails.
//!
//! ```rust,no_run
//! use ferrum_vsac::{Credentials, VsacClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = VsacClient::new()?;
//! let credentials = Credentials::new("apikey", "my-umls-api-key");
//! let oids = ["2.16.840.1.113883.3.464.1003.103.12.1001", "2.16.840.1.113883.3.464.1003.198.12.1013"];
//! for (oid, result) in client.retrieve_many(&oids, &credentials).await {
//!     println!("{oid}: {:?}", result.error());
//! }
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod cache;
pub mod client;
pub mod credentials;
pub mod error;
pub mod models;
pub mod normalize;
pub mod purpose;
pub mod source;
mod xml;

pub use batch::{BatchResult, BATCH_WINDOW};
pub use cache::{CacheKey, CacheStats, InMemoryValueSetCache, LruValueSetCache, ValueSetCache};
pub use client::VsacClient;
pub use credentials::Credentials;
pub use error::{Error, ErrorKind, Result};
pub use models::{ConceptSummary, ValueSetContent, ValueSetMetadata, ValueSetResult};
pub use normalize::normalize_response;
pub use purpose::{parse_purpose, ClinicalPurpose};
pub use source::{HttpValueSetSource, ValueSetSource, VSAC_SVS_BASE_URL};
