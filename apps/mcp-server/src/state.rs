//! Application state
//!
//! The composition root: owns the value set cache and every collaborator the
//! tools need. Collaborators that are not configured stay `None` and the tools
//! depending on them report that instead of failing at startup.

use crate::config::Config;
use crate::error::{Error, Result};
use anyhow::Context;
use ferrum_cql::{ExtractionResult, ExtractionStrategy, LlmExtraction, RegexExtraction};
use ferrum_llm::{CompletionOptions, CompletionProvider, OpenAiCompatibleProvider};
use ferrum_omop::{
    generate_sql, ConceptCatalog, ConceptMapper, LlmVocabularyMapper, MappingMode,
    MappingSummary, PgConceptCatalog, SqlOptions, TableVocabularyMapper, VocabularyMapper,
};
use ferrum_vsac::{
    BatchResult, CacheStats, Credentials, HttpValueSetSource, InMemoryValueSetCache,
    LruValueSetCache, ValueSetCache, ValueSetResult, ValueSetSource, VsacClient,
};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

pub type SharedSource = Arc<dyn ValueSetSource>;

/// How OIDs are pulled out of CQL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtractionMode {
    #[default]
    Regex,
    Llm,
}

pub struct AppState {
    vsac: VsacClient<SharedSource>,
    credentials: Option<Credentials>,
    llm: Option<Arc<dyn CompletionProvider>>,
    llm_options: CompletionOptions,
    catalog: Option<Arc<dyn ConceptCatalog>>,
    vocabulary: Arc<dyn VocabularyMapper>,
    schema: String,
}

impl AppState {
    /// State with VSAC access only; attach optional collaborators with the
    /// `with_*` methods.
    pub fn new(vsac: VsacClient<SharedSource>, credentials: Option<Credentials>) -> Self {
        Self {
            vsac,
            credentials,
            llm: None,
            llm_options: CompletionOptions::default(),
            catalog: None,
            vocabulary: Arc::new(TableVocabularyMapper),
            schema: "cdm".to_string(),
        }
    }

    /// Attach a language model. Vocabulary lookups fall back to it for code
    /// systems missing from the static table.
    pub fn with_llm(
        mut self,
        provider: Arc<dyn CompletionProvider>,
        options: CompletionOptions,
    ) -> Self {
        self.vocabulary = Arc::new(LlmVocabularyMapper::new(provider.clone(), options.clone()));
        self.llm = Some(provider);
        self.llm_options = options;
        self
    }

    pub fn with_catalog(
        mut self,
        catalog: Arc<dyn ConceptCatalog>,
        schema: impl Into<String>,
    ) -> Self {
        self.catalog = Some(catalog);
        self.schema = schema.into();
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: Arc<dyn VocabularyMapper>) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let source = HttpValueSetSource::with_base_url(
            config.vsac.base_url.clone(),
            Duration::from_secs(config.vsac.timeout_seconds),
        )
        .context("Failed to build VSAC HTTP client")?;

        let cache: Arc<dyn ValueSetCache> =
            match config.cache.max_entries.and_then(NonZeroUsize::new) {
                Some(capacity) => Arc::new(LruValueSetCache::new(capacity)),
                None => Arc::new(InMemoryValueSetCache::new()),
            };

        let credentials = Credentials::from_parts(
            config.vsac.username.as_deref(),
            config.vsac.password.as_deref(),
        );
        if credentials.is_none() {
            tracing::warn!("No VSAC credentials configured; callers must pass them per request");
        }

        let mut state = Self::new(
            VsacClient::with_source(Arc::new(source) as SharedSource, cache),
            credentials,
        );

        if let Some(api_key) = config.llm.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            let provider = OpenAiCompatibleProvider::with_timeout(
                config.llm.base_url.clone(),
                api_key,
                Duration::from_secs(config.llm.timeout_seconds),
            )
            .context("Failed to build language model client")?;
            let options = CompletionOptions {
                model: config.llm.model.clone(),
                temperature: config.llm.temperature,
                max_tokens: config.llm.max_tokens,
            };
            state = state.with_llm(Arc::new(provider), options);
        } else {
            tracing::info!(
                "No language model configured; translation and LLM extraction are disabled"
            );
        }

        if let Some(url) = config.database.url.as_deref() {
            let catalog = PgConceptCatalog::connect_lazy(
                url,
                config.database.schema.clone(),
                config.database.max_connections,
            )
            .context("Failed to configure OMOP database pool")?;
            state = state.with_catalog(Arc::new(catalog), config.database.schema.clone());
        } else {
            tracing::info!("No OMOP database configured; mapping and SQL tools are disabled");
        }

        Ok(state)
    }

    pub fn llm(&self) -> Option<&Arc<dyn CompletionProvider>> {
        self.llm.as_ref()
    }

    pub fn llm_options(&self) -> &CompletionOptions {
        &self.llm_options
    }

    pub fn has_catalog(&self) -> bool {
        self.catalog.is_some()
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Credentials for one call: each per-call part overrides the configured one.
    pub fn credentials(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Credentials> {
        let configured = self.credentials.as_ref();
        let username = username
            .filter(|u| !u.trim().is_empty())
            .or_else(|| configured.map(Credentials::username));
        let password = password
            .filter(|p| !p.trim().is_empty())
            .or_else(|| configured.map(Credentials::password));
        Credentials::from_parts(username, password)
            .ok_or(Error::Vsac(ferrum_vsac::Error::MissingCredentials))
    }

    pub async fn extract(&self, cql: &str, mode: ExtractionMode) -> Result<ExtractionResult> {
        match mode {
            ExtractionMode::Regex => Ok(RegexExtraction.extract(cql).await?),
            ExtractionMode::Llm => {
                let provider = self.llm.clone().ok_or(Error::NotConfigured("Language model"))?;
                let strategy = LlmExtraction::new(provider, self.llm_options.clone());
                Ok(strategy.extract(cql).await?)
            }
        }
    }

    pub async fn fetch_valueset(
        &self,
        oid: &str,
        version: Option<&str>,
        credentials: &Credentials,
    ) -> Result<ValueSetResult> {
        Ok(self.vsac.retrieve(oid, version, credentials).await?)
    }

    pub async fn fetch_valuesets<S: AsRef<str>>(
        &self,
        oids: &[S],
        credentials: &Credentials,
    ) -> BatchResult {
        self.vsac.retrieve_many(oids, credentials).await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.vsac.cache().stats().await
    }

    pub async fn clear_cache(&self) -> CacheStats {
        let before = self.vsac.cache().stats().await;
        self.vsac.cache().clear().await;
        tracing::info!(entries = before.entries, "Cleared value set cache");
        before
    }

    /// Map already retrieved value sets, in the order given.
    pub async fn map_results<'r, I>(&self, results: I, mode: MappingMode) -> Result<MappingSummary>
    where
        I: IntoIterator<Item = (&'r str, &'r ValueSetResult)>,
    {
        let catalog = self
            .catalog
            .as_deref()
            .ok_or(Error::NotConfigured("OMOP database"))?;
        let mapper = ConceptMapper::new(self.vocabulary.as_ref(), catalog);
        Ok(mapper.map_all(results, mode).await?)
    }

    /// Retrieve then map. Fails before any VSAC call when no catalog is configured.
    pub async fn map_valuesets(
        &self,
        oids: &[String],
        mode: MappingMode,
        credentials: &Credentials,
    ) -> Result<MappingSummary> {
        if !self.has_catalog() {
            return Err(Error::NotConfigured("OMOP database"));
        }
        let results = self.fetch_valuesets(oids, credentials).await;
        let ordered = ordered_results(oids, &results);
        self.map_results(ordered, mode).await
    }

    pub fn generate_sql(
        &self,
        summary: &MappingSummary,
        schema: Option<&str>,
        concept_set_only: bool,
    ) -> Result<String> {
        let options = SqlOptions {
            schema: schema.unwrap_or(&self.schema).to_string(),
            concept_set_only,
        };
        Ok(generate_sql(summary, &options)?)
    }
}

/// Batch entries in input order, each distinct identifier once.
pub(crate) fn ordered_results<'a>(
    oids: &'a [String],
    results: &'a BatchResult,
) -> Vec<(&'a str, &'a ValueSetResult)> {
    let mut seen = std::collections::HashSet::new();
    oids.iter()
        .filter(|oid| seen.insert(oid.as_str()))
        .filter_map(|oid| results.get(oid).map(|r| (oid.as_str(), r)))
        .collect()
}
