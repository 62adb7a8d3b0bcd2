//! llama.cpp HTTP embedding provider.
//!
//! Implements [`EmbeddingProvider`] against a llama.cpp-compatible server's
//! `/v1/embeddings` endpoint. Queries can be prefixed with an instruction
//! string for code-search models, and the output dimension is either fixed by
//! configuration or detected from the first successful response.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;

use super::http::{self, EmbeddingInput, EmbeddingRequest};
use super::{preprocess_text, EmbeddingProvider, EmbeddingVector};
use crate::config::{self, EmbeddingConfig};
use crate::error::{EmbeddingError, Result};

pub const PROVIDER_NAME: &str = "LlamaCpp";

/// Reported until the real dimension is detected or configured.
pub const DEFAULT_DIMENSION: usize = 768;

/// Text sent by [`LlamaCppEmbedding::detect_dimension`] when the caller has none.
pub const DETECTION_TEXT: &str = "test";

/// Embedding client for a llama.cpp server.
pub struct LlamaCppEmbedding {
    client: Client,
    config: EmbeddingConfig,
    dimension: AtomicUsize,
    /// Set once detection succeeds. Held across the detection request so
    /// concurrent first calls share one detection request.
    detected: Mutex<bool>,
}

impl LlamaCppEmbedding {
    /// Validate `config` and build the client. No request is sent.
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let config = config.validate()?;
        let dimension = config.dimension.unwrap_or(DEFAULT_DIMENSION);

        tracing::info!(
            host = config.host(),
            model = config.model(),
            fixed_dimension = ?config.dimension,
            code_prefix = config.code_prefix_enabled(),
            "llama.cpp embedding provider configured"
        );

        Ok(Self {
            client: Client::new(),
            config,
            dimension: AtomicUsize::new(dimension),
            detected: Mutex::new(false),
        })
    }

    /// Apply the code-search prefix when enabled and not already present.
    fn apply_code_prefix(&self, text: &str) -> String {
        if !self.config.code_prefix_enabled() {
            return text.to_string();
        }
        let prefix = self.config.code_prefix_text();
        if text.starts_with(prefix) {
            text.to_string()
        } else {
            format!("{prefix} {text}")
        }
    }

    fn prepare(&self, text: &str) -> String {
        preprocess_text(&self.apply_code_prefix(text), self.config.max_tokens())
    }

    async fn request(&self, input: EmbeddingInput<'_>) -> Result<serde_json::Value> {
        let request = EmbeddingRequest {
            input,
            model: self.config.model(),
        };
        http::post_embeddings(
            &self.client,
            self.config.host(),
            &request,
            self.config.timeout(),
        )
        .await
    }

    /// Embed `test_text` as-is and return the vector length.
    ///
    /// Does not touch the cached dimension.
    pub async fn detect_dimension(&self, test_text: &str) -> Result<usize> {
        let response = self.request(EmbeddingInput::Single(test_text)).await?;
        let vector = http::first_embedding(&response)?;
        if vector.is_empty() {
            return Err(EmbeddingError::network(format!(
                "llama.cpp server returned an empty embedding for model {}",
                self.config.model()
            )));
        }
        Ok(vector.len())
    }

    /// Detect and cache the dimension unless it is fixed or already known.
    pub(crate) async fn ensure_dimension_detected(&self) -> Result<()> {
        if self.config.dimension.is_some() {
            return Ok(());
        }
        let mut detected = self.detected.lock().await;
        if *detected {
            return Ok(());
        }

        let dimension = self.detect_dimension(DETECTION_TEXT).await?;
        self.dimension.store(dimension, Ordering::Release);
        *detected = true;
        tracing::info!(model = self.config.model(), dimension, "embedding dimension detected");
        Ok(())
    }

    pub async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let processed = self.prepare(text);
        self.ensure_dimension_detected().await?;

        let response = self.request(EmbeddingInput::Single(&processed)).await?;
        let vector = http::first_embedding(&response)?;
        Ok(EmbeddingVector {
            vector,
            dimension: self.dimension(),
        })
    }

    /// Embed every text in one request. Fails as a whole if any item is bad.
    ///
    /// Vectors are returned in response order, which llama.cpp keeps equal to
    /// input order.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Err(EmbeddingError::config("texts must be a non-empty list"));
        }
        let processed: Vec<String> = texts.iter().map(|t| self.prepare(t)).collect();
        self.ensure_dimension_detected().await?;

        let response = self.request(EmbeddingInput::Batch(&processed)).await?;
        let vectors = http::all_embeddings(&response)?;
        if vectors.len() != texts.len() {
            tracing::warn!(
                sent = texts.len(),
                received = vectors.len(),
                "llama.cpp returned a different number of embeddings than inputs"
            );
        }

        let dimension = self.dimension();
        Ok(vectors
            .into_iter()
            .map(|vector| EmbeddingVector { vector, dimension })
            .collect())
    }

    pub fn set_host(&mut self, host: &str) -> Result<()> {
        self.config.host = Some(config::normalize_host(host)?);
        Ok(())
    }

    /// Switch models. Without a fixed dimension this re-runs detection
    /// immediately, so it is the one setter that talks to the server.
    ///
    /// If that detection fails, [`dimension`](Self::dimension) reports
    /// [`DEFAULT_DIMENSION`] until a later call detects it.
    pub async fn set_model(&mut self, model: &str) -> Result<()> {
        config::validate_model(model)?;
        self.config.model = Some(model.to_string());
        if self.config.dimension.is_none() {
            *self.detected.get_mut() = false;
            self.dimension.store(DEFAULT_DIMENSION, Ordering::Release);
            tracing::debug!(model, "model changed, re-detecting dimension");
            self.ensure_dimension_detected().await?;
        }
        Ok(())
    }

    pub fn set_code_prefix(&mut self, enabled: bool) {
        self.config.code_prefix = Some(enabled);
    }

    /// Replace the prefix text. Also turns prefixing on.
    pub fn set_custom_code_prefix(&mut self, prefix: &str) -> Result<()> {
        config::validate_custom_prefix(prefix)?;
        self.config.custom_code_prefix = Some(prefix.to_string());
        self.config.code_prefix = Some(true);
        Ok(())
    }

    /// Set the request timeout in milliseconds (1..=600000).
    pub fn set_timeout(&mut self, timeout_ms: u64) -> Result<()> {
        config::validate_timeout(timeout_ms)?;
        self.config.timeout = Some(timeout_ms);
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension.load(Ordering::Acquire)
    }

    pub fn provider(&self) -> &'static str {
        PROVIDER_NAME
    }

    pub fn model(&self) -> &str {
        self.config.model()
    }

    pub fn host(&self) -> &str {
        self.config.host()
    }

    /// Owned snapshot of the current configuration.
    pub fn config(&self) -> EmbeddingConfig {
        self.config.clone()
    }
}

#[async_trait]
impl EmbeddingProvider for LlamaCppEmbedding {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        LlamaCppEmbedding::embed(self, text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>> {
        LlamaCppEmbedding::embed_batch(self, texts).await
    }

    fn dimension(&self) -> usize {
        LlamaCppEmbedding::dimension(self)
    }

    fn provider(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        LlamaCppEmbedding::model(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_CODE_PREFIX, DEFAULT_HOST, DEFAULT_MODEL};

    fn provider(config: EmbeddingConfig) -> LlamaCppEmbedding {
        LlamaCppEmbedding::new(config).unwrap()
    }

    #[test]
    fn defaults() {
        let p = provider(EmbeddingConfig::default());
        assert_eq!(p.host(), DEFAULT_HOST);
        assert_eq!(p.model(), DEFAULT_MODEL);
        assert_eq!(p.dimension(), DEFAULT_DIMENSION);
        assert_eq!(p.provider(), "LlamaCpp");
    }

    #[test]
    fn fixed_dimension_is_reported() {
        let p = provider(EmbeddingConfig {
            dimension: Some(3584),
            ..Default::default()
        });
        assert_eq!(p.dimension(), 3584);
    }

    #[test]
    fn new_rejects_invalid_config() {
        let bad = [
            EmbeddingConfig {
                host: Some("ftp://localhost:8080".into()),
                ..Default::default()
            },
            EmbeddingConfig {
                host: Some("::not-a-url".into()),
                ..Default::default()
            },
            EmbeddingConfig {
                timeout: Some(0),
                ..Default::default()
            },
            EmbeddingConfig {
                dimension: Some(0),
                ..Default::default()
            },
            EmbeddingConfig {
                max_tokens: Some(0),
                ..Default::default()
            },
        ];
        for config in bad {
            let err = LlamaCppEmbedding::new(config.clone()).err().expect("should fail");
            assert!(err.is_configuration(), "{config:?} -> {err}");
        }
    }

    #[test]
    fn host_trailing_slash_is_removed() {
        let p = provider(EmbeddingConfig {
            host: Some("http://127.0.0.1:9090/".into()),
            ..Default::default()
        });
        assert_eq!(p.host(), "http://127.0.0.1:9090");
    }

    #[test]
    fn prefix_is_prepended_once() {
        let p = provider(EmbeddingConfig::default());
        assert_eq!(
            p.apply_code_prefix("foo"),
            format!("{DEFAULT_CODE_PREFIX} foo")
        );
        let already = format!("{DEFAULT_CODE_PREFIX} foo");
        assert_eq!(p.apply_code_prefix(&already), already);
    }

    #[test]
    fn prefix_can_be_disabled() {
        let mut p = provider(EmbeddingConfig {
            code_prefix: Some(false),
            ..Default::default()
        });
        assert_eq!(p.apply_code_prefix("foo"), "foo");
        p.set_code_prefix(true);
        assert!(p.apply_code_prefix("foo").ends_with(" foo"));
    }

    #[test]
    fn custom_prefix_enables_prefixing() {
        let mut p = provider(EmbeddingConfig {
            code_prefix: Some(false),
            ..Default::default()
        });
        p.set_custom_code_prefix("search_query:").unwrap();
        assert_eq!(p.apply_code_prefix("parse json"), "search_query: parse json");
        assert_eq!(p.config().code_prefix, Some(true));
    }

    #[test]
    fn custom_prefix_must_not_be_blank() {
        let mut p = provider(EmbeddingConfig::default());
        assert!(p.set_custom_code_prefix("").unwrap_err().is_configuration());
        assert!(p.set_custom_code_prefix("   ").unwrap_err().is_configuration());
        assert_eq!(p.config().custom_code_prefix, None);
    }

    #[test]
    fn set_timeout_validates_range() {
        let mut p = provider(EmbeddingConfig::default());
        assert!(p.set_timeout(0).unwrap_err().is_configuration());
        assert!(p.set_timeout(600_001).unwrap_err().is_configuration());
        p.set_timeout(600_000).unwrap();
        assert_eq!(p.config().timeout, Some(600_000));
    }

    #[test]
    fn set_host_validates_and_normalizes() {
        let mut p = provider(EmbeddingConfig::default());
        assert!(p.set_host("ssh://box").unwrap_err().is_configuration());
        assert!(p.set_host("http://localhost:8080/?k=v").unwrap_err().is_configuration());
        assert!(p.set_host("http://localhost:8080#top").unwrap_err().is_configuration());
        assert_eq!(p.host(), DEFAULT_HOST);
        p.set_host("https://embed.example.com/").unwrap();
        assert_eq!(p.host(), "https://embed.example.com");
    }

    #[test]
    fn config_returns_a_snapshot() {
        let p = provider(EmbeddingConfig::default());
        let mut snapshot = p.config();
        snapshot.model = Some("other".into());
        snapshot.host = Some("http://elsewhere".into());
        assert_eq!(p.model(), DEFAULT_MODEL);
        assert_eq!(p.host(), DEFAULT_HOST);
    }

    #[test]
    fn prepare_truncates_after_prefixing() {
        let p = provider(EmbeddingConfig {
            max_tokens: Some(4),
            ..Default::default()
        });
        let out = p.prepare("fn main() {}");
        assert_eq!(out.chars().count(), 16);
        assert!(out.starts_with("Represent"));
    }

    #[test]
    fn new_rejects_host_with_query() {
        let err = LlamaCppEmbedding::new(EmbeddingConfig {
            host: Some("http://127.0.0.1:8080/?k=v".into()),
            dimension: Some(3),
            ..Default::default()
        })
        .err()
        .expect("should fail");
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn set_model_rejects_blank_names_without_io() {
        let mut p = provider(EmbeddingConfig {
            host: Some("http://127.0.0.1:1".into()),
            model: Some("model-a".into()),
            ..Default::default()
        });
        for name in ["", "   "] {
            let err = p.set_model(name).await.unwrap_err();
            assert!(err.is_configuration(), "{name:?} -> {err}");
        }
        assert_eq!(p.model(), "model-a");
    }

    #[tokio::test]
    async fn embed_batch_rejects_empty_input() {
        let p = provider(EmbeddingConfig::default());
        let err = p.embed_batch(&[]).await.unwrap_err();
        assert!(err.is_configuration());
    }
}
