use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::EmbeddingError;

/// Default llama.cpp server address.
pub const DEFAULT_HOST: &str = "http://localhost:8080";

/// Model name sent when none is configured.
pub const DEFAULT_MODEL: &str = "nomic-embed-code";

/// Query prefix that steers code embedding models toward retrieval.
pub const DEFAULT_CODE_PREFIX: &str = "Represent this query for searching relevant code:";

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const MAX_TIMEOUT_MS: u64 = 600_000;
pub const DEFAULT_MAX_TOKENS: usize = 8192;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

/// Settings for the embedding provider.
///
/// Optional fields stay `None` when unspecified so the defaults above apply
/// at use time and an explicit value is always distinguishable from a default.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Fixed output dimension. When unset, it is detected from the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    /// Request timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_prefix: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_code_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "llamacpp".into(),
            host: None,
            model: None,
            dimension: None,
            max_tokens: None,
            timeout: None,
            code_prefix: None,
            custom_code_prefix: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Configured model name, or [`DEFAULT_MODEL`] when unset.
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms())
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    /// Code prefixing is on unless explicitly disabled.
    pub fn code_prefix_enabled(&self) -> bool {
        self.code_prefix.unwrap_or(true)
    }

    pub fn code_prefix_text(&self) -> &str {
        self.custom_code_prefix
            .as_deref()
            .unwrap_or(DEFAULT_CODE_PREFIX)
    }

    /// Check every field and return a normalized copy.
    pub fn validate(&self) -> crate::error::Result<Self> {
        let mut config = self.clone();
        if let Some(host) = &self.host {
            config.host = Some(normalize_host(host)?);
        }
        if let Some(model) = &self.model {
            validate_model(model)?;
        }
        if let Some(timeout) = self.timeout {
            validate_timeout(timeout)?;
        }
        if self.dimension == Some(0) {
            return Err(EmbeddingError::config("dimension must be a positive number"));
        }
        if self.max_tokens == Some(0) {
            return Err(EmbeddingError::config("max_tokens must be a positive number"));
        }
        if let Some(prefix) = &self.custom_code_prefix {
            validate_custom_prefix(prefix)?;
        }
        Ok(config)
    }

    /// Build a validated config from a loosely-typed JSON value.
    ///
    /// `null` fields count as unset. Unknown keys are ignored.
    pub fn from_value(value: Option<&Value>) -> crate::error::Result<Self> {
        let value = value
            .filter(|v| !v.is_null())
            .ok_or_else(|| EmbeddingError::config("embedding configuration is required"))?;
        let map = value
            .as_object()
            .ok_or_else(|| EmbeddingError::config("embedding configuration must be an object"))?;

        let mut config = EmbeddingConfig::default();
        if let Some(v) = field(map, "provider") {
            config.provider = string_field("provider", v)?;
        }
        if let Some(v) = field(map, "host") {
            config.host = Some(string_field("host", v)?);
        }
        if let Some(v) = field(map, "model") {
            config.model = Some(string_field("model", v)?);
        }
        if let Some(v) = field(map, "dimension") {
            config.dimension = Some(positive_integer("dimension", v)? as usize);
        }
        if let Some(v) = field(map, "max_tokens") {
            config.max_tokens = Some(positive_integer("max_tokens", v)? as usize);
        }
        if let Some(v) = field(map, "timeout") {
            let ms = v
                .as_f64()
                .filter(|n| n.is_finite() && *n > 0.0)
                .ok_or_else(|| EmbeddingError::config("timeout must be a positive number"))?;
            config.timeout = Some(ms.ceil() as u64);
        }
        if let Some(v) = field(map, "code_prefix") {
            let enabled = v
                .as_bool()
                .ok_or_else(|| EmbeddingError::config("code_prefix must be a boolean"))?;
            config.code_prefix = Some(enabled);
        }
        if let Some(v) = field(map, "custom_code_prefix") {
            config.custom_code_prefix = Some(string_field("custom_code_prefix", v)?);
        }

        config.validate()
    }
}

fn field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

fn string_field(name: &str, value: &Value) -> crate::error::Result<String> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| EmbeddingError::config(format!("{name} must be a string")))
}

fn positive_integer(name: &str, value: &Value) -> crate::error::Result<u64> {
    value
        .as_f64()
        .filter(|n| n.is_finite() && *n >= 1.0 && n.fract() == 0.0)
        .map(|n| n as u64)
        .ok_or_else(|| EmbeddingError::config(format!("{name} must be a positive number")))
}

/// Parse a server URL, require http(s), and strip trailing slashes.
pub fn normalize_host(host: &str) -> crate::error::Result<String> {
    let trimmed = host.trim();
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| EmbeddingError::config(format!("invalid host URL {trimmed:?}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(EmbeddingError::config(format!(
            "host must use http or https, got {:?}",
            parsed.scheme()
        )));
    }
    // The endpoint path is appended to the host string, so nothing may follow the path.
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(EmbeddingError::config(format!(
            "host must not contain a query string or fragment, got {trimmed:?}"
        )));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

pub fn validate_model(model: &str) -> crate::error::Result<()> {
    if model.trim().is_empty() {
        return Err(EmbeddingError::config("model must be a non-empty string"));
    }
    Ok(())
}

pub fn validate_timeout(timeout_ms: u64) -> crate::error::Result<()> {
    if timeout_ms == 0 {
        return Err(EmbeddingError::config("timeout must be a positive number"));
    }
    if timeout_ms > MAX_TIMEOUT_MS {
        return Err(EmbeddingError::config(format!(
            "timeout must not exceed {MAX_TIMEOUT_MS} ms, got {timeout_ms}"
        )));
    }
    Ok(())
}

pub fn validate_custom_prefix(prefix: &str) -> crate::error::Result<()> {
    if prefix.trim().is_empty() {
        return Err(EmbeddingError::config("custom code prefix must be a non-empty string"));
    }
    Ok(())
}

/// Returns `~/.llamaembed/`
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".llamaembed")
}

/// Returns the default config file path: `~/.llamaembed/config.toml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

impl AppConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            Self::from_toml_str(&contents)?
        } else {
            info!("no config file at {}, using defaults", path.display());
            AppConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse TOML text. The `[embedding]` table goes through
    /// [`EmbeddingConfig::from_value`] so type errors name the offending field.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mut table: toml::Table =
            toml::from_str(contents).context("failed to parse config TOML")?;

        let logging = match table.remove("logging") {
            Some(value) => value
                .try_into::<LoggingConfig>()
                .context("invalid [logging] section")?,
            None => LoggingConfig::default(),
        };
        let embedding = match table.remove("embedding") {
            Some(value) => {
                let json =
                    serde_json::to_value(value).context("failed to read [embedding] section")?;
                EmbeddingConfig::from_value(Some(&json)).context("invalid [embedding] section")?
            }
            None => EmbeddingConfig::default(),
        };

        Ok(Self { logging, embedding })
    }

    /// Apply environment variable overrides (LLAMAEMBED_HOST, LLAMAEMBED_MODEL,
    /// LLAMAEMBED_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LLAMAEMBED_HOST") {
            self.embedding.host = Some(val);
        }
        if let Ok(val) = std::env::var("LLAMAEMBED_MODEL") {
            self.embedding.model = Some(val);
        }
        if let Ok(val) = std::env::var("LLAMAEMBED_LOG_LEVEL") {
            self.logging.level = val;
        }
    }
}
