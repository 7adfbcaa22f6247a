//! Transport for raw SVS payloads

use crate::credentials::Credentials;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

pub const VSAC_SVS_BASE_URL: &str = "https://vsac.nlm.nih.gov/vsac/svs";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Something that can hand back the raw XML for one value set.
#[async_trait]
pub trait ValueSetSource: Send + Sync {
    async fn fetch(
        &self,
        oid: &str,
        version: Option<&str>,
        credentials: &Credentials,
    ) -> Result<String>;
}

#[async_trait]
impl<T: ValueSetSource + ?Sized> ValueSetSource for Arc<T> {
    async fn fetch(
        &self,
        oid: &str,
        version: Option<&str>,
        credentials: &Credentials,
    ) -> Result<String> {
        (**self).fetch(oid, version, credentials).await
    }
}

/// SVS `RetrieveMultipleValueSets` over HTTPS with Basic auth.
pub struct HttpValueSetSource {
    client: Client,
    base_url: String,
}

impl HttpValueSetSource {
    pub fn new() -> Result<Self> {
        Self::with_base_url(
            VSAC_SVS_BASE_URL.to_string(),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn with_base_url(base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Unknown(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request_url(&self, oid: &str, version: Option<&str>) -> String {
        let mut url = format!(
            "{}/RetrieveMultipleValueSets?id={}",
            self.base_url,
            urlencoding::encode(oid)
        );
        if let Some(version) = version {
            url.push_str("&version=");
            url.push_str(&urlencoding::encode(version));
        }
        url
    }
}

#[async_trait]
impl ValueSetSource for HttpValueSetSource {
    async fn fetch(
        &self,
        oid: &str,
        version: Option<&str>,
        credentials: &Credentials,
    ) -> Result<String> {
        let url = self.request_url(oid, version);
        tracing::debug!(%url, "Requesting value set from VSAC");

        let response = self
            .client
            .get(&url)
            .basic_auth(credentials.username(), Some(credentials.password()))
            .header(reqwest::header::ACCEPT, "application/xml")
            .send()
            .await?;

        let status = response.status().as_u16();
        if let Some(err) = Error::from_status(status, oid) {
            return Err(err);
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_url_encodes_parameters() {
        let source = HttpValueSetSource::with_base_url(
            "https://example.org/svs/".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            source.request_url("1.2.3", None),
            "https://example.org/svs/RetrieveMultipleValueSets?id=1.2.3"
        );
        assert_eq!(
            source.request_url("1.2.3", Some("eCQM Update 2024-05-02")),
            "https://example.org/svs/RetrieveMultipleValueSets?id=1.2.3&version=eCQM%20Update%202024-05-02"
        );
    }
}
