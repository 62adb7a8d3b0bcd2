//! Request execution against the llama.cpp `/v1/embeddings` endpoint.
//!
//! One POST per call, bounded by a deadline. Every failure is classified into
//! [`EmbeddingError::Network`]; the response is checked against the
//! `{ data: [ { embedding: [..] } ] }` shape before any vector is returned.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{EmbeddingError, Result};

pub const EMBEDDINGS_PATH: &str = "/v1/embeddings";

/// Stand-in for an error body that could not be read.
const UNREADABLE_BODY: &str = "<unable to read response body>";

/// `input` is a bare string for single requests and an array for batches.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum EmbeddingInput<'a> {
    Single(&'a str),
    Batch(&'a [String]),
}

#[derive(Debug, Serialize)]
pub struct EmbeddingRequest<'a> {
    pub input: EmbeddingInput<'a>,
    pub model: &'a str,
}

/// POST `request` to `{host}/v1/embeddings` and return the parsed JSON body.
///
/// The whole exchange (connect, send, body read) must finish within
/// `timeout`; otherwise the in-flight request is dropped.
pub async fn post_embeddings(
    client: &Client,
    host: &str,
    request: &EmbeddingRequest<'_>,
    timeout: Duration,
) -> Result<Value> {
    let url = format!("{host}{EMBEDDINGS_PATH}");
    let body = serde_json::to_vec(request).map_err(|e| {
        EmbeddingError::network_with_source("failed to serialize embedding request", e)
    })?;

    debug!(url = %url, model = request.model, bytes = body.len(), "sending embedding request");

    match tokio::time::timeout(timeout, execute(client, &url, host, body)).await {
        Ok(result) => result,
        Err(_) => Err(EmbeddingError::network(format!(
            "request timed out after {}ms waiting for llama.cpp server at {host}",
            timeout.as_millis()
        ))),
    }
}

async fn execute(client: &Client, url: &str, host: &str, body: Vec<u8>) -> Result<Value> {
    let response = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .map_err(|e| classify_transport_error(e, host))?;

    let status = response.status();
    if !status.is_success() {
        let text = error_body(response.text().await);
        return Err(EmbeddingError::network(format!(
            "llama.cpp server returned HTTP {} {}: {text}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown Status"),
        )));
    }

    let text = response
        .text()
        .await
        .map_err(|e| classify_transport_error(e, host))?;
    debug!(status = status.as_u16(), bytes = text.len(), "embedding response received");

    serde_json::from_str(&text).map_err(|e| {
        EmbeddingError::network_with_source("failed to parse llama.cpp response as JSON", e)
    })
}

fn error_body(text: reqwest::Result<String>) -> String {
    text.unwrap_or_else(|_| UNREADABLE_BODY.to_string())
}

fn classify_transport_error(err: reqwest::Error, host: &str) -> EmbeddingError {
    if err.is_connect() {
        EmbeddingError::network_with_source(
            format!("unable to connect to llama.cpp server at {host}; is it running?"),
            err,
        )
    } else {
        EmbeddingError::network_with_source("unexpected error during embedding request", err)
    }
}

/// Extract the embedding of `data[0]`.
pub fn first_embedding(response: &Value) -> Result<Vec<f32>> {
    let data = data_array(response)?;
    parse_item(&data[0], 0)
}

/// Extract every embedding in response order.
pub fn all_embeddings(response: &Value) -> Result<Vec<Vec<f32>>> {
    data_array(response)?
        .iter()
        .enumerate()
        .map(|(index, item)| parse_item(item, index))
        .collect()
}

fn invalid(detail: impl std::fmt::Display) -> EmbeddingError {
    EmbeddingError::network(format!("invalid response from llama.cpp server: {detail}"))
}

/// Returns the non-empty `data` array.
fn data_array(response: &Value) -> Result<&[Value]> {
    let object = response
        .as_object()
        .ok_or_else(|| invalid("expected a JSON object"))?;
    let data = object
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("missing or non-array 'data' field"))?;
    if data.is_empty() {
        return Err(invalid("'data' array is empty"));
    }
    Ok(data.as_slice())
}

fn parse_item(item: &Value, index: usize) -> Result<Vec<f32>> {
    let embedding = item
        .as_object()
        .and_then(|o| o.get("embedding"))
        .and_then(Value::as_array)
        .ok_or_else(|| invalid(format!("missing or non-array 'embedding' in data[{index}]")))?;

    embedding
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|x| x as f32)
                .ok_or_else(|| invalid(format!("non-numeric value in data[{index}].embedding")))
        })
        .collect()
}
