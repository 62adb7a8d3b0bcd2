//! Error classification for the embedding client.
//!
//! Every failure falls into one of two kinds: the caller handed us something
//! invalid ([`EmbeddingError::Configuration`]), or the round trip to the
//! server failed ([`EmbeddingError::Network`]).

use thiserror::Error;

/// Boxed underlying failure carried by [`EmbeddingError::Network`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Alias for results returning [`EmbeddingError`].
pub type Result<T> = std::result::Result<T, EmbeddingError>;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Invalid configuration or input, raised before any request is sent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failure of the outbound call or of its response.
    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl EmbeddingError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Network error that keeps the underlying failure for diagnostics.
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}
