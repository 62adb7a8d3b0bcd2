//! CLI `doctor` command: show the effective configuration and check the server responds.

use anyhow::Result;
use std::time::Instant;

use llamaembed::config::{AppConfig, EmbeddingConfig};
use llamaembed::embedding::llamacpp::{LlamaCppEmbedding, DETECTION_TEXT};

/// Print a configuration report and check that the server answers.
pub async fn doctor(config: &AppConfig) -> Result<()> {
    let embedding = &config.embedding;

    let provider = LlamaCppEmbedding::new(embedding.clone());

    println!("llamaembed Health Report");
    println!("========================");
    println!();
    println!("Provider:          {}", embedding.provider);
    println!("Host:              {}", report_host(embedding, &provider));
    println!("Model:             {}", embedding.model());
    println!("Timeout:           {} ms", embedding.timeout_ms());
    println!("Max tokens:        {}", embedding.max_tokens());
    match embedding.dimension {
        Some(dim) => println!("Dimension:         {dim} (fixed)"),
        None => println!("Dimension:         auto-detect"),
    }
    if embedding.code_prefix_enabled() {
        println!("Code prefix:       {:?}", embedding.code_prefix_text());
    } else {
        println!("Code prefix:       disabled");
    }
    println!();

    let provider = match provider {
        Ok(provider) => provider,
        Err(e) => {
            println!("Configuration:     INVALID ({e})");
            return Ok(());
        }
    };
    println!("Configuration:     OK");

    let started = Instant::now();
    match provider.detect_dimension(DETECTION_TEXT).await {
        Ok(dim) => {
            println!(
                "Server:            OK ({dim} dims in {} ms)",
                started.elapsed().as_millis()
            );
            if let Some(fixed) = embedding.dimension {
                if fixed != dim {
                    println!("  WARNING: configured dimension {fixed} does not match server output {dim}.");
                }
            }
        }
        Err(e) => {
            println!("Server:            UNREACHABLE ({e})");
            println!();
            println!("Recovery steps:");
            println!("  1. Start the server with embeddings enabled:");
            println!("     llama-server -m <model.gguf> --embeddings --port 8080");
            println!("  2. Point llamaembed at it: --host http://<addr>:<port>");
        }
    }

    Ok(())
}

/// Host as the client will use it; the raw value when the config is invalid.
fn report_host<'a>(
    embedding: &'a EmbeddingConfig,
    provider: &'a llamaembed::Result<LlamaCppEmbedding>,
) -> &'a str {
    match provider {
        Ok(provider) => provider.host(),
        Err(_) => embedding.host(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_host_is_normalized() {
        let embedding = EmbeddingConfig {
            host: Some("http://gpu-box:8080/".into()),
            ..Default::default()
        };
        let provider = LlamaCppEmbedding::new(embedding.clone());
        assert_eq!(report_host(&embedding, &provider), "http://gpu-box:8080");
    }

    #[test]
    fn report_host_falls_back_to_raw_value() {
        let embedding = EmbeddingConfig {
            host: Some("ftp://gpu-box/".into()),
            ..Default::default()
        };
        let provider = LlamaCppEmbedding::new(embedding.clone());
        assert_eq!(report_host(&embedding, &provider), "ftp://gpu-box/");
    }
}
