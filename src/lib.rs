//! Embedding client for [llama.cpp](https://github.com/ggml-org/llama.cpp)-compatible
//! inference servers.
//!
//! `llamaembed` turns text into vectors by calling a server's OpenAI-style
//! `/v1/embeddings` endpoint. It validates configuration up front, optionally
//! prefixes queries with an instruction string for code-search models, detects
//! the output dimension from the server when it is not configured, and bounds
//! every request with a timeout.
//!
//! ```no_run
//! use llamaembed::config::EmbeddingConfig;
//! use llamaembed::embedding::llamacpp::LlamaCppEmbedding;
//!
//! # async fn run() -> llamaembed::Result<()> {
//! let embedder = LlamaCppEmbedding::new(EmbeddingConfig {
//!     host: Some("http://localhost:8080".into()),
//!     ..Default::default()
//! })?;
//! let result = embedder.embed("parse a toml file").await?;
//! println!("{} dims", result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`embedding`] — Provider trait, text preprocessing, and the llama.cpp client
//! - [`error`] — The two error kinds: configuration and network

pub mod config;
pub mod embedding;
pub mod error;

pub use config::EmbeddingConfig;
pub use error::{EmbeddingError, Result};
