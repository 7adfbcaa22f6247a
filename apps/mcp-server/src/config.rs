//! Server configuration
//!
//! Layered as built-in defaults, then an optional `config/ferrum-mcp.{toml,yaml,json}`
//! file, then `FERRUM__*` environment variables (for example
//! `FERRUM__VSAC__USERNAME`). A `.env` file in the working directory is loaded
//! first. The bare `VSAC_USERNAME`, `VSAC_PASSWORD` and `OPENAI_API_KEY`
//! variables are accepted as fallbacks.

use config::{ConfigError, Environment, File};
use ferrum_omop::is_plain_identifier;
use ferrum_vsac::VSAC_SVS_BASE_URL;
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub vsac: VsacConfig,
    pub cache: CacheConfig,
    pub llm: LlmConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct VsacConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for VsacConfig {
    fn default() -> Self {
        Self {
            base_url: VSAC_SVS_BASE_URL.to_string(),
            username: None,
            password: None,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Bound the value set cache to this many entries (LRU). Unbounded when unset.
    pub max_entries: Option<usize>,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            max_tokens: 2048,
            timeout_seconds: 60,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres URL of an OMOP CDM database. Mapping and SQL tools are
    /// unavailable without it.
    pub url: Option<String>,
    pub schema: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            schema: "cdm".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn redacted(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}

impl fmt::Debug for VsacConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VsacConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redacted(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The URL usually embeds a password.
        f.debug_struct("DatabaseConfig")
            .field("url", &redacted(&self.url))
            .field("schema", &self.schema)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut config: Config = config::Config::builder()
            .add_source(File::with_name("config/ferrum-mcp").required(false))
            .add_source(
                Environment::with_prefix("FERRUM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.apply_fallback_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn apply_fallback_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.vsac.username.is_none() {
            self.vsac.username = var("VSAC_USERNAME");
        }
        if self.vsac.password.is_none() {
            self.vsac.password = var("VSAC_PASSWORD");
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = var("OPENAI_API_KEY");
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vsac.timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "vsac.timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if self.llm.timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "llm.timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if self.cache.max_entries == Some(0) {
            return Err(ConfigError::Message(
                "cache.max_entries must be greater than zero when set".to_string(),
            ));
        }
        if !is_plain_identifier(&self.database.schema) {
            return Err(ConfigError::Message(format!(
                "database.schema '{}' is not a plain SQL identifier",
                self.database.schema
            )));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "database.max_connections must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.vsac.base_url, VSAC_SVS_BASE_URL);
        assert_eq!(config.vsac.timeout_seconds, 30);
        assert_eq!(config.database.schema, "cdm");
        assert!(config.cache.max_entries.is_none());
    }

    #[test]
    fn rejects_zero_timeout_and_capacity() {
        let mut config = Config::default();
        config.vsac.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache.max_entries = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unsafe_schema() {
        let mut config = Config::default();
        config.database.schema = "cdm;drop".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn fallback_variables_fill_only_missing_values() {
        let mut config = Config::default();
        config.vsac.username = Some("configured".to_string());
        config.apply_fallback_env(|name| Some(format!("env-{name}")));

        assert_eq!(config.vsac.username.as_deref(), Some("configured"));
        assert_eq!(config.vsac.password.as_deref(), Some("env-VSAC_PASSWORD"));
        assert_eq!(config.llm.api_key.as_deref(), Some("env-OPENAI_API_KEY"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let mut config = Config::default();
        config.vsac.password = Some("hunter2".to_string());
        config.llm.api_key = Some("sk-secret".to_string());
        config.database.url = Some("postgres://u:pw@localhost/omop".to_string());

        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("pw@"));
    }

    #[test]
    fn sections_deserialize_with_partial_input() {
        let config: Config = config::Config::builder()
            .set_override("cache.max_entries", 100)
            .unwrap()
            .set_override("database.schema", "omop")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.cache.max_entries, Some(100));
        assert_eq!(config.database.schema, "omop");
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }
}
