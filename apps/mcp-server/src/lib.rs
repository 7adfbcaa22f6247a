//! MCP server for the CQL to VSAC to OMOP value set pipeline
//!
//! The tools in [`tools`] are thin adapters over [`state::AppState`], which
//! owns the value set cache and the optional language model and OMOP
//! database. [`pipeline`] chains every stage.

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod state;
pub mod tools;

pub use error::{Error, Result};
