//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait, the shared [`preprocess_text`]
//! hook, and a llama.cpp HTTP implementation. The provider is created via
//! [`create_provider`] from configuration.

pub mod http;
pub mod llamacpp;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::EmbeddingConfig;
use crate::error::{EmbeddingError, Result};

/// Rough characters-per-token ratio used to bound input length.
const CHARS_PER_TOKEN: usize = 4;

/// A single embedding and the dimension it represents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingVector {
    pub vector: Vec<f32>,
    pub dimension: usize,
}

/// Trait for embedding text into vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> Result<EmbeddingVector>;

    /// Embed a batch of text strings, one vector per input.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>>;

    /// Return the number of dimensions this provider produces.
    fn dimension(&self) -> usize;

    /// Constant name identifying the provider.
    fn provider(&self) -> &'static str;

    fn model(&self) -> &str;
}

/// Normalize text before it is sent to a model.
///
/// Empty input becomes a single space (servers reject empty strings) and
/// anything longer than `max_tokens * 4` characters is cut to that length.
pub fn preprocess_text(text: &str, max_tokens: usize) -> String {
    if text.is_empty() {
        return " ".to_string();
    }
    let max_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN);
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

/// Create an embedding provider from config.
///
/// Currently only `"llamacpp"` is supported.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "llamacpp" => {
            let provider = llamacpp::LlamaCppEmbedding::new(config.clone())?;
            Ok(Box::new(provider))
        }
        other => Err(EmbeddingError::config(format!(
            "unknown embedding provider: {other}. Supported: llamacpp"
        ))),
    }
}
