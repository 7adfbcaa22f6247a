//! Error types for the MCP server

use rmcp::model::{CallToolResult, Content};
use rmcp::ErrorData;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error(transparent)]
    Vsac(#[from] ferrum_vsac::Error),

    #[error(transparent)]
    Omop(#[from] ferrum_omop::Error),

    #[error("Language model error: {0}")]
    Llm(#[from] ferrum_llm::Error),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ferrum_cql::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// JSON body for a failed tool call. VSAC failures carry their kind and
    /// the user-facing guidance for it.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Error::Vsac(e) => json!({
                "error": e.to_string(),
                "errorKind": e.kind(),
                "guidance": e.kind().guidance(),
            }),
            _ => json!({ "error": self.to_string() }),
        }
    }

    /// Caller mistakes and internal faults become protocol errors; failures of
    /// the services behind a tool are reported as an error result.
    pub fn into_tool_result(self) -> std::result::Result<CallToolResult, ErrorData> {
        match &self {
            Error::InvalidParams(_) => Err(ErrorData::invalid_params(self.to_string(), None)),
            Error::Json(_) => {
                tracing::error!(error = %self, "Internal error");
                Err(ErrorData::internal_error(self.to_string(), None))
            }
            _ => {
                tracing::warn!(error = %self, "Tool call failed");
                Ok(CallToolResult::error(vec![Content::text(
                    self.to_json().to_string(),
                )]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vsac_errors_carry_guidance() {
        let body = Error::from(ferrum_vsac::Error::RateLimit).to_json();
        assert_eq!(body["errorKind"], "rate_limit");
        assert_eq!(body["guidance"], ferrum_vsac::ErrorKind::RateLimit.guidance());
    }

    #[test]
    fn invalid_params_are_protocol_errors() {
        assert!(Error::InvalidParams("oids must not be empty".into())
            .into_tool_result()
            .is_err());
    }

    #[test]
    fn service_failures_are_error_results() {
        let result = Error::NotConfigured("Database").into_tool_result().unwrap();
        assert_eq!(result.is_error, Some(true));
    }
}
