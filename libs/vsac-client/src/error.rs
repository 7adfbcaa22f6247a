//! Error types for vsac-client
//!
//! Only transport and protocol failures surface as errors. A payload that
//! arrives but cannot be understood is absorbed by the normalizer and returned
//! as a sentinel [`ValueSetResult`](crate::ValueSetResult).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// VSAC client errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Authentication failed (HTTP 401)")]
    Authentication,

    #[error("Access forbidden for value set {0} (HTTP 403)")]
    AccessForbidden(String),

    #[error("Value set not found: {0} (HTTP 404)")]
    NotFound(String),

    #[error("Rate limit exceeded (HTTP 429)")]
    RateLimit,

    #[error("VSAC service unavailable (HTTP {status})")]
    ServiceUnavailable { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected VSAC failure: {0}")]
    Unknown(String),

    #[error("VSAC username and password are required")]
    MissingCredentials,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Authentication | Error::MissingCredentials => ErrorKind::Authentication,
            Error::AccessForbidden(_) => ErrorKind::AccessForbidden,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::RateLimit => ErrorKind::RateLimit,
            Error::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            Error::Network(_) => ErrorKind::Network,
            Error::Timeout => ErrorKind::Timeout,
            Error::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Map a non-success HTTP status to an error. Returns `None` for 2xx.
    pub fn from_status(status: u16, oid: &str) -> Option<Self> {
        match status {
            200..=299 => None,
            401 => Some(Error::Authentication),
            403 => Some(Error::AccessForbidden(oid.to_string())),
            404 => Some(Error::NotFound(oid.to_string())),
            429 => Some(Error::RateLimit),
            500..=599 => Some(Error::ServiceUnavailable { status }),
            other => Some(Error::Unknown(format!("unexpected HTTP status {other}"))),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else if err.is_connect() || err.is_request() {
            Error::Network(err.to_string())
        } else {
            Error::Unknown(err.to_string())
        }
    }
}

/// Discriminant of a retrieval failure, used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    AccessForbidden,
    NotFound,
    RateLimit,
    ServiceUnavailable,
    Network,
    Timeout,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::AccessForbidden => "access_forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// What an end user can do about a failure of this kind.
    pub fn guidance(&self) -> &'static str {
        match self {
            ErrorKind::Authentication => {
                "Check your VSAC credentials. VSAC uses your UMLS account; the API key \
                 from your UMLS profile is accepted as the password."
            }
            ErrorKind::AccessForbidden => {
                "Your UMLS account is not permitted to read this value set. Make sure the \
                 UMLS license is active and the value set is published."
            }
            ErrorKind::NotFound => {
                "The OID was not found in VSAC. Verify the OID and version, or look the \
                 value set up at https://vsac.nlm.nih.gov."
            }
            ErrorKind::RateLimit => {
                "VSAC is throttling requests. Wait a minute and retry with fewer value sets \
                 per batch."
            }
            ErrorKind::ServiceUnavailable => {
                "VSAC is temporarily unavailable. Retry later or check the NLM service status page."
            }
            ErrorKind::Network => {
                "Could not reach VSAC. Check network connectivity, DNS and proxy settings."
            }
            ErrorKind::Timeout => {
                "VSAC did not answer within the request timeout. Retry, or request fewer value sets at once."
            }
            ErrorKind::Unknown => {
                "An unexpected error occurred while contacting VSAC. Retry, and report the \
                 error if it persists."
            }
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
