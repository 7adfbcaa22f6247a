//! Cached single value set retrieval

use crate::cache::{CacheKey, InMemoryValueSetCache, ValueSetCache};
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::models::ValueSetResult;
use crate::normalize::normalize_response;
use crate::source::{HttpValueSetSource, ValueSetSource};
use std::sync::Arc;

/// VSAC client combining a [`ValueSetSource`] with a [`ValueSetCache`].
pub struct VsacClient<S = HttpValueSetSource> {
    source: S,
    cache: Arc<dyn ValueSetCache>,
}

impl VsacClient<HttpValueSetSource> {
    /// Client against the public VSAC endpoint with an unbounded in-memory cache.
    pub fn new() -> Result<Self> {
        Ok(Self::with_source(
            HttpValueSetSource::new()?,
            Arc::new(InMemoryValueSetCache::new()),
        ))
    }
}

impl<S: ValueSetSource> VsacClient<S> {
    pub fn with_source(source: S, cache: Arc<dyn ValueSetCache>) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &Arc<dyn ValueSetCache> {
        &self.cache
    }

    /// Fetch and normalize one value set.
    ///
    /// A cached result is returned without touching the network. Any payload
    /// that was transported successfully is cached, including sentinel
    /// outcomes; transport failures are returned and never cached.
    #[tracing::instrument(
        name = "vsac.retrieve",
        skip(self, credentials),
        fields(version = version.unwrap_or("latest"))
    )]
    pub async fn retrieve(
        &self,
        identifier: &str,
        version: Option<&str>,
        credentials: &Credentials,
    ) -> Result<ValueSetResult> {
        if !credentials.is_complete() {
            return Err(Error::MissingCredentials);
        }

        let oid = normalize_identifier(identifier);
        let key = CacheKey::new(oid, version);

        if let Some(cached) = self.cache.get(&key).await {
            tracing::debug!(%key, "Value set cache hit");
            return Ok(cached);
        }

        let payload = self.source.fetch(oid, version, credentials).await?;
        let result = normalize_response(&payload);

        tracing::info!(
            %key,
            concepts = result.concept_count(),
            sentinel = result.is_sentinel(),
            "Retrieved value set"
        );

        self.cache.set(key, result.clone()).await;
        Ok(result)
    }
}

/// Trim whitespace and an optional `urn:oid:` scheme.
pub(crate) fn normalize_identifier(identifier: &str) -> &str {
    let trimmed = identifier.trim();
    trimmed.strip_prefix("urn:oid:").unwrap_or(trimmed)
}
