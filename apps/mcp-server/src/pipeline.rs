//! Natural language to SQL pipeline
//!
//! CQL (given, or translated from a question) is run through extraction,
//! validation, VSAC retrieval and, when a database is configured, OMOP mapping
//! and SQL generation. Every stage is reported. A stage whose collaborator is
//! missing, or whose input never materialized, is `skipped`; a stage that ran
//! and failed is `failed`.

use crate::error::Result;
use crate::state::{ordered_results, AppState, ExtractionMode};
use chrono::{DateTime, Utc};
use ferrum_cql::{partition_oids, ExtractionResult, OidValidationResult};
use ferrum_llm::{strip_code_fences, ChatMessage, CompletionOptions, CompletionProvider};
use ferrum_omop::{MappingMode, MappingSummary};
use ferrum_vsac::{Credentials, ValueSetResult};
use serde::Serialize;
use std::collections::BTreeMap;

const CQL_SYSTEM_PROMPT: &str = "You are an expert author of Clinical Quality Language (CQL) \
for electronic clinical quality measures. Translate the user's clinical question into a \
complete CQL library. Declare every value set with its VSAC OID using exactly the form \
valueset \"<Name>\": 'urn:oid:<OID>' and only use OIDs of published VSAC value sets. \
Respond with the CQL library only.";

/// Translate a clinical question into a CQL library with one model call.
pub async fn translate_to_cql(
    provider: &dyn CompletionProvider,
    options: &CompletionOptions,
    question: &str,
) -> Result<String> {
    let messages = [
        ChatMessage::system(CQL_SYSTEM_PROMPT),
        ChatMessage::user(question),
    ];
    let completion = provider.complete(&messages, options).await?;
    tracing::info!(
        provider = %completion.provider,
        total_tokens = completion.usage.total_tokens,
        "Translated question to CQL"
    );
    Ok(strip_code_fences(&completion.content).trim().to_string())
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Stage<T> {
    Completed { output: T },
    Skipped { reason: String },
    Failed { error: serde_json::Value },
}

impl<T> Stage<T> {
    fn skipped(reason: impl Into<String>) -> Self {
        Stage::Skipped {
            reason: reason.into(),
        }
    }

    pub fn output(&self) -> Option<&T> {
        match self {
            Stage::Completed { output } => Some(output),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Stage::Completed { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    pub question: Option<String>,
    pub cql: Option<String>,
    pub mode: MappingMode,
    pub schema: Option<String>,
    pub concept_set_only: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub started_at: DateTime<Utc>,
    pub cql: Stage<String>,
    pub extraction: Stage<ExtractionResult>,
    pub validation: Stage<OidValidationResult>,
    pub retrieval: Stage<BTreeMap<String, ValueSetResult>>,
    pub mapping: Stage<MappingSummary>,
    pub sql: Stage<String>,
}

impl PipelineReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            cql: Stage::skipped("no CQL source or question given"),
            extraction: Stage::skipped("no CQL available"),
            validation: Stage::skipped("nothing extracted"),
            retrieval: Stage::skipped("no valid OIDs"),
            mapping: Stage::skipped("no value sets retrieved"),
            sql: Stage::skipped("no concept mapping"),
        }
    }
}

#[tracing::instrument(name = "pipeline.run", skip_all, fields(mode = %request.mode))]
pub async fn run_pipeline(state: &AppState, request: &PipelineRequest) -> PipelineReport {
    let mut report = PipelineReport::new();

    let cql = match (&request.cql, &request.question) {
        (Some(cql), _) if !cql.trim().is_empty() => cql.clone(),
        (_, Some(question)) if !question.trim().is_empty() => match state.llm() {
            None => {
                report.cql = Stage::skipped("language model not configured");
                return report;
            }
            Some(provider) => {
                match translate_to_cql(provider.as_ref(), state.llm_options(), question).await {
                    Ok(cql) => cql,
                    Err(e) => {
                        report.cql = Stage::Failed { error: e.to_json() };
                        return report;
                    }
                }
            }
        },
        _ => return report,
    };
    report.cql = Stage::Completed { output: cql.clone() };

    let extraction = match state.extract(&cql, ExtractionMode::Regex).await {
        Ok(extraction) => extraction,
        Err(e) => {
            report.extraction = Stage::Failed { error: e.to_json() };
            return report;
        }
    };
    let validation = partition_oids(&extraction.oids);
    report.extraction = Stage::Completed { output: extraction };
    let valid = validation.valid.clone();
    report.validation = Stage::Completed { output: validation };

    if valid.is_empty() {
        return report;
    }

    let credentials: Credentials =
        match state.credentials(request.username.as_deref(), request.password.as_deref()) {
            Ok(credentials) => credentials,
            Err(_) => {
                report.retrieval = Stage::skipped("VSAC credentials not provided");
                return report;
            }
        };

    let results = state.fetch_valuesets(&valid, &credentials).await;
    let mapped = if state.has_catalog() {
        Some(
            state
                .map_results(ordered_results(&valid, &results), request.mode)
                .await,
        )
    } else {
        None
    };
    report.retrieval = Stage::Completed {
        output: results.into_iter().collect(),
    };

    let summary = match mapped {
        None => {
            report.mapping = Stage::skipped("OMOP database not configured");
            report.sql = Stage::skipped("OMOP database not configured");
            return report;
        }
        Some(Err(e)) => {
            report.mapping = Stage::Failed { error: e.to_json() };
            return report;
        }
        Some(Ok(summary)) => summary,
    };

    report.sql = match state.generate_sql(
        &summary,
        request.schema.as_deref(),
        request.concept_set_only,
    ) {
        Ok(sql) => Stage::Completed { output: sql },
        Err(e) => Stage::Failed { error: e.to_json() },
    };
    report.mapping = Stage::Completed { output: summary };

    tracing::info!(sql = report.sql.is_completed(), "Pipeline finished");
    report
}
