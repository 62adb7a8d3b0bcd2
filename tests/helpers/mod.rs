#![allow(dead_code)]

use llamaembed::config::EmbeddingConfig;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const EMBEDDINGS_PATH: &str = "/v1/embeddings";

/// Build a llama.cpp-style embeddings response with `count` items of `dim`
/// components. Item `i` is filled with `i + 1` so order is observable.
pub fn embedding_response(count: usize, dim: usize) -> Value {
    let data: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "object": "embedding",
                "index": i,
                "embedding": vec![(i + 1) as f32; dim],
            })
        })
        .collect();
    json!({
        "object": "list",
        "data": data,
        "model": "nomic-embed-code",
        "usage": { "prompt_tokens": 4, "total_tokens": 4 },
    })
}

/// Mount a catch-all `POST /v1/embeddings` mock returning `count` vectors of
/// `dim` components.
pub async fn mount_embeddings(server: &MockServer, count: usize, dim: usize) {
    Mock::given(method("POST"))
        .and(path(EMBEDDINGS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_response(count, dim)))
        .mount(server)
        .await;
}

/// Mount a mock that answers only the dimension detection request for `model`, expected
/// to be hit exactly `times` times. Mount it before any catch-all mock.
pub async fn mount_detection(server: &MockServer, model: &str, dim: usize, times: u64) {
    Mock::given(method("POST"))
        .and(path(EMBEDDINGS_PATH))
        .and(body_partial_json(json!({ "input": "test", "model": model })))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_response(1, dim)))
        .expect(times)
        .mount(server)
        .await;
}

/// Config pointing at the mock server with auto-detection enabled.
pub fn config_for(server: &MockServer) -> EmbeddingConfig {
    EmbeddingConfig {
        host: Some(server.uri()),
        ..Default::default()
    }
}

/// Config pointing at the mock server with a fixed dimension (no detection request).
pub fn fixed_config_for(server: &MockServer, dimension: usize) -> EmbeddingConfig {
    EmbeddingConfig {
        dimension: Some(dimension),
        ..config_for(server)
    }
}

/// JSON bodies of every request the server has seen, in arrival order.
pub async fn sent_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}
