//! OID grammar check

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// Two or more dot-separated digit groups, anchored. A bare integer is not an OID.
const OID_PATTERN: &str = r"^[0-9]+(\.[0-9]+)+$";

fn oid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(OID_PATTERN).expect("OID pattern is valid"))
}

/// Partition of an OID list into grammar-conforming and rejected entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidValidationResult {
    pub valid: Vec<String>,
    pub invalid: Vec<String>,
}

pub fn is_valid_oid(candidate: &str) -> bool {
    oid_regex().is_match(candidate)
}

/// Keep only the OIDs matching the grammar, preserving input order.
pub fn validate_oids<S: AsRef<str>>(oids: &[S]) -> Vec<String> {
    partition_oids(oids).valid
}

pub fn partition_oids<S: AsRef<str>>(oids: &[S]) -> OidValidationResult {
    let mut result = OidValidationResult::default();
    for oid in oids {
        let oid = oid.as_ref();
        if is_valid_oid(oid) {
            result.valid.push(oid.to_string());
        } else {
            result.invalid.push(oid.to_string());
        }
    }
    if !result.invalid.is_empty() {
        tracing::debug!(
            valid = result.valid.len(),
            invalid = result.invalid.len(),
            "Rejected OIDs not matching the dotted numeric grammar"
        );
    }
    result
}

/// Partition loosely-typed input such as a JSON array from a tool call.
///
/// Non-string elements land in `invalid` in their JSON rendering.
pub fn partition_json_values(values: &[Value]) -> OidValidationResult {
    let mut result = OidValidationResult::default();
    for value in values {
        match value {
            Value::String(s) if is_valid_oid(s) => result.valid.push(s.clone()),
            Value::String(s) => result.invalid.push(s.clone()),
            other => result.invalid.push(other.to_string()),
        }
    }
    result
}
