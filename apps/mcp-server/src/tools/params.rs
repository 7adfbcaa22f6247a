//! Tool parameter types

use ferrum_omop::MappingMode;
use rmcp::schemars;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct TranslateParams {
    /// Clinical question in plain language, e.g. "adults with type 2 diabetes and an HbA1c above 9%"
    pub query: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StrategyParam {
    #[default]
    Regex,
    Llm,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct ExtractParams {
    /// CQL library source
    pub cql: String,
    /// `regex` (default, deterministic) or `llm`
    #[serde(default)]
    pub strategy: StrategyParam,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct ValidateParams {
    /// Candidate OIDs. Non-string entries are reported as invalid.
    pub oids: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, schemars::JsonSchema)]
pub struct VsacAuthParams {
    /// VSAC username (use "apikey" with a UMLS API key). Overrides the configured one.
    #[serde(default)]
    pub username: Option<String>,
    /// VSAC password or UMLS API key. Overrides the configured one.
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct FetchParams {
    /// Value set OID, with or without the `urn:oid:` prefix
    pub oid: String,
    /// Value set version; latest when omitted
    #[serde(default)]
    pub version: Option<String>,
    #[serde(flatten)]
    pub auth: VsacAuthParams,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct FetchManyParams {
    /// Value set OIDs
    pub oids: Vec<String>,
    #[serde(flatten)]
    pub auth: VsacAuthParams,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CacheAction {
    #[default]
    Stats,
    Clear,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct CacheParams {
    /// `stats` (default) or `clear`
    #[serde(default)]
    pub action: CacheAction,
}

/// Mirror of [`MappingMode`] deriving `JsonSchema` for tool parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ModeParam {
    Verbatim,
    Standard,
    #[default]
    Mapped,
}

impl From<ModeParam> for MappingMode {
    fn from(mode: ModeParam) -> Self {
        match mode {
            ModeParam::Verbatim => MappingMode::Verbatim,
            ModeParam::Standard => MappingMode::Standard,
            ModeParam::Mapped => MappingMode::Mapped,
        }
    }
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct MapParams {
    /// Value set OIDs to map
    pub oids: Vec<String>,
    /// `verbatim`, `standard` or `mapped` (default)
    #[serde(default)]
    pub mode: ModeParam,
    #[serde(flatten)]
    pub auth: VsacAuthParams,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct SqlParams {
    /// Value set OIDs forming the cohort
    pub oids: Vec<String>,
    #[serde(default)]
    pub mode: ModeParam,
    /// CDM schema; the configured schema when omitted
    #[serde(default)]
    pub schema: Option<String>,
    /// Only list the concept set instead of building the cohort query
    #[serde(default)]
    pub concept_set_only: bool,
    #[serde(flatten)]
    pub auth: VsacAuthParams,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct PipelineParams {
    /// Clinical question; translated to CQL when `cql` is not given
    #[serde(default)]
    pub query: Option<String>,
    /// CQL library source; takes precedence over `query`
    #[serde(default)]
    pub cql: Option<String>,
    #[serde(default)]
    pub mode: ModeParam,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub concept_set_only: bool,
    #[serde(flatten)]
    pub auth: VsacAuthParams,
}
