//! CLI `embed`, `batch`, and `detect` commands.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::AsyncReadExt;

use llamaembed::config::AppConfig;
use llamaembed::embedding;
use llamaembed::embedding::llamacpp::LlamaCppEmbedding;

/// Embed one text and print `{"vector": [...], "dimension": N}`.
pub async fn embed(config: &AppConfig, text: &str) -> Result<()> {
    let provider = embedding::create_provider(&config.embedding)?;
    let result = provider.embed(text).await.context("embedding failed")?;
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

/// Embed each non-empty line of `file` (or stdin) in one request and print a
/// JSON array of results in input order.
pub async fn batch(config: &AppConfig, file: Option<&Path>) -> Result<()> {
    let contents = match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read stdin")?;
            buf
        }
    };

    let texts = input_lines(&contents);
    anyhow::ensure!(!texts.is_empty(), "no input texts (expected one per line)");

    let provider = embedding::create_provider(&config.embedding)?;
    let results = provider
        .embed_batch(&texts)
        .await
        .context("batch embedding failed")?;
    tracing::info!(count = results.len(), dimension = provider.dimension(), "batch embedded");

    println!("{}", serde_json::to_string(&results)?);
    Ok(())
}

/// Send `text` unprefixed and print the length of the returned vector.
pub async fn detect(config: &AppConfig, text: &str) -> Result<()> {
    let provider = LlamaCppEmbedding::new(config.embedding.clone())?;
    let dimension = provider
        .detect_dimension(text)
        .await
        .context("dimension detection failed")?;
    println!("{dimension}");
    Ok(())
}

fn input_lines(contents: &str) -> Vec<&str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}
