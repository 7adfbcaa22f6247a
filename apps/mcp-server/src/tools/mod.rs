//! MCP tool surface
//!
//! Every tool answers with pretty JSON text. Failures of VSAC, the model or
//! the database come back as error results carrying the same JSON shape with
//! an `error` field; malformed arguments are protocol errors.

pub mod params;

use crate::error::Error;
use crate::pipeline::{run_pipeline, translate_to_cql, PipelineRequest};
use crate::state::{AppState, ExtractionMode};
use ferrum_cql::partition_json_values;
use params::{
    CacheAction, CacheParams, ExtractParams, FetchManyParams, FetchParams, MapParams,
    PipelineParams, SqlParams, StrategyParam, TranslateParams, ValidateParams,
};
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    tool, tool_handler, tool_router, ErrorData, ServerHandler,
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

const INSTRUCTIONS: &str = "Value set pipeline for clinical quality measures.\n\n\
Typical flow: natural_language_to_cql -> extract_valueset_oids -> validate_oids -> \
fetch_multiple_valuesets -> map_valuesets_to_omop -> generate_omop_sql, or run_pipeline \
for all stages at once. VSAC tools need a username and password (or UMLS API key with \
username \"apikey\"), either configured on the server or passed per call. Mapping and SQL \
tools need a configured OMOP database.";

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, ErrorData> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn respond<T: Serialize>(outcome: crate::Result<T>) -> Result<CallToolResult, ErrorData> {
    match outcome {
        Ok(value) => json_result(&value),
        Err(e) => e.into_tool_result(),
    }
}

fn require_oids(oids: &[String]) -> crate::Result<()> {
    if oids.iter().all(|oid| oid.trim().is_empty()) {
        return Err(Error::InvalidParams("oids must contain at least one OID".to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct FerrumTools {
    state: Arc<AppState>,
    tool_router: ToolRouter<FerrumTools>,
}

#[tool_router]
impl FerrumTools {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Translate a clinical question into a CQL library that declares its VSAC value sets. Requires a configured language model.")]
    async fn natural_language_to_cql(
        &self,
        Parameters(params): Parameters<TranslateParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = async {
            let provider = self
                .state
                .llm()
                .ok_or(Error::NotConfigured("Language model"))?;
            let cql =
                translate_to_cql(provider.as_ref(), self.state.llm_options(), &params.query)
                    .await?;
            Ok::<_, Error>(json!({ "cql": cql }))
        }
        .await;
        respond(outcome)
    }

    #[tool(description = "Extract value set declarations (valueset \"Name\": 'urn:oid:...') from CQL. Returns the distinct OIDs in first-seen order and every declaration with its name.")]
    async fn extract_valueset_oids(
        &self,
        Parameters(params): Parameters<ExtractParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mode = match params.strategy {
            StrategyParam::Regex => ExtractionMode::Regex,
            StrategyParam::Llm => ExtractionMode::Llm,
        };
        respond(self.state.extract(&params.cql, mode).await)
    }

    #[tool(description = "Split candidate OIDs into valid and invalid. A valid OID is dotted numeric with at least two arcs, e.g. 2.16.840.1.113883.3.464.1003.103.12.1001.")]
    async fn validate_oids(
        &self,
        Parameters(params): Parameters<ValidateParams>,
    ) -> Result<CallToolResult, ErrorData> {
        json_result(&partition_json_values(&params.oids))
    }

    #[tool(description = "Fetch one value set from VSAC with its metadata and concepts. Results are cached per OID and version.")]
    async fn fetch_valueset(
        &self,
        Parameters(params): Parameters<FetchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = async {
            let credentials = self
                .state
                .credentials(params.auth.username.as_deref(), params.auth.password.as_deref())?;
            self.state
                .fetch_valueset(&params.oid, params.version.as_deref(), &credentials)
                .await
        }
        .await;
        respond(outcome)
    }

    #[tool(description = "Fetch several value sets from VSAC, three at a time. Returns one entry per OID; a failed OID carries error, errorKind and guidance instead of failing the call.")]
    async fn fetch_multiple_valuesets(
        &self,
        Parameters(params): Parameters<FetchManyParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = async {
            require_oids(&params.oids)?;
            let credentials = self
                .state
                .credentials(params.auth.username.as_deref(), params.auth.password.as_deref())?;
            let results = self.state.fetch_valuesets(&params.oids, &credentials).await;
            Ok::<_, Error>(results.into_iter().collect::<BTreeMap<_, _>>())
        }
        .await;
        respond(outcome)
    }

    #[tool(description = "Inspect (action \"stats\") or empty (action \"clear\") the value set cache.")]
    async fn valueset_cache(
        &self,
        Parameters(params): Parameters<CacheParams>,
    ) -> Result<CallToolResult, ErrorData> {
        match params.action {
            CacheAction::Stats => json_result(&self.state.cache_stats().await),
            CacheAction::Clear => {
                let cleared = self.state.clear_cache().await;
                json_result(&json!({ "cleared": cleared.entries }))
            }
        }
    }

    #[tool(description = "Fetch value sets and map their concepts to OMOP concept ids. Modes: verbatim (source concepts), standard (standard source concepts only), mapped (follow 'Maps to', default). Requires a configured OMOP database.")]
    async fn map_valuesets_to_omop(
        &self,
        Parameters(params): Parameters<MapParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = async {
            require_oids(&params.oids)?;
            let credentials = self
                .state
                .credentials(params.auth.username.as_deref(), params.auth.password.as_deref())?;
            self.state
                .map_valuesets(&params.oids, params.mode.into(), &credentials)
                .await
        }
        .await;
        respond(outcome)
    }

    #[tool(description = "Build OMOP CDM SQL for the patients matching any of the value sets: one CTE per clinical domain unioned into person_ids, or only the concept set with concept_set_only. Requires a configured OMOP database.")]
    async fn generate_omop_sql(
        &self,
        Parameters(params): Parameters<SqlParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let outcome = async {
            require_oids(&params.oids)?;
            let credentials = self
                .state
                .credentials(params.auth.username.as_deref(), params.auth.password.as_deref())?;
            let summary = self
                .state
                .map_valuesets(&params.oids, params.mode.into(), &credentials)
                .await?;
            let sql = self.state.generate_sql(
                &summary,
                params.schema.as_deref(),
                params.concept_set_only,
            )?;
            Ok::<_, Error>(json!({ "sql": sql, "mapping": summary }))
        }
        .await;
        respond(outcome)
    }

    #[tool(description = "Run the whole pipeline: question or CQL -> extraction -> validation -> VSAC retrieval -> OMOP mapping -> SQL. Reports each stage as completed, skipped (collaborator not configured) or failed.")]
    async fn run_pipeline(
        &self,
        Parameters(params): Parameters<PipelineParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let request = PipelineRequest {
            question: params.query,
            cql: params.cql,
            mode: params.mode.into(),
            schema: params.schema,
            concept_set_only: params.concept_set_only,
            username: params.auth.username,
            password: params.auth.password,
        };
        if request.cql.is_none() && request.question.is_none() {
            return Err(ErrorData::invalid_params("either cql or query is required", None));
        }
        json_result(&run_pipeline(&self.state, &request).await)
    }
}

#[tool_handler]
impl ServerHandler for FerrumTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ferrum_vsac::{Credentials, InMemoryValueSetCache, ValueSetSource, VsacClient};

    struct NoSource;

    #[async_trait]
    impl ValueSetSource for NoSource {
        async fn fetch(
            &self,
            oid: &str,
            _version: Option<&str>,
            _credentials: &Credentials,
        ) -> ferrum_vsac::Result<String> {
            Err(ferrum_vsac::Error::NotFound(oid.to_string()))
        }
    }

    fn tools() -> FerrumTools {
        let client = VsacClient::with_source(
            Arc::new(NoSource) as crate::state::SharedSource,
            Arc::new(InMemoryValueSetCache::new()),
        );
        FerrumTools::new(Arc::new(AppState::new(client, None)))
    }

    #[test]
    fn server_advertises_tools() {
        let info = tools().get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.instructions.unwrap_or_default().contains("run_pipeline"));
    }

    #[test]
    fn router_registers_every_tool() {
        let mut names: Vec<String> = tools()
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "extract_valueset_oids",
                "fetch_multiple_valuesets",
                "fetch_valueset",
                "generate_omop_sql",
                "map_valuesets_to_omop",
                "natural_language_to_cql",
                "run_pipeline",
                "validate_oids",
                "valueset_cache",
            ]
        );
    }

    #[test]
    fn blank_oid_list_is_rejected() {
        assert!(matches!(
            require_oids(&[" ".to_string()]),
            Err(Error::InvalidParams(_))
        ));
        assert!(require_oids(&["1.2.3".to_string()]).is_ok());
    }
}
