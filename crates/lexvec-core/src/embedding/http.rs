//! HTTP embedding provider for OpenAI-compatible `/embeddings` endpoints.
//!
//! Works with hosted APIs and with local model servers that speak the same
//! request/response shape:
//!
//! ```text
//! POST {endpoint}  {"model": "...", "input": ["text", ...]}
//! 200              {"data": [{"embedding": [...], "index": 0}, ...]}
//! ```
//!
//! One request per batch; retries are left to the caller.

use super::l2_normalize;
use super::traits::EmbeddingProvider;
use crate::error::EmbeddingError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Per-request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

/// OpenAI-compatible embedding client.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    normalize: bool,
}

impl HttpEmbeddingProvider {
    /// Creates a provider for `endpoint` serving `model`.
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, EmbeddingError> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(EmbeddingError::InvalidConfig(format!(
                "Unsupported endpoint {} (only http/https allowed)",
                endpoint
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("lexvec/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| EmbeddingError::InvalidConfig(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            api_key: None,
            normalize: false,
        })
    }

    /// Sends `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// L2-normalises returned vectors, for servers that do not.
    pub fn with_normalization(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut request = self.client.post(&self.endpoint).json(&EmbedRequest {
            model: &self.model,
            input,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmbeddingError::RequestFailed(format!("{}: {}", self.endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::RequestFailed(format!(
                "{} returned {}: {}",
                self.endpoint, status, body
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(format!("JSON parse error: {}", e)))?;

        let vectors = order_by_index(parsed.data, input.len())?;
        debug!("Received {} embeddings from {}", vectors.len(), self.endpoint);

        Ok(if self.normalize {
            vectors
                .into_iter()
                .map(|mut v| {
                    l2_normalize(&mut v);
                    v
                })
                .collect()
        } else {
            vectors
        })
    }
}

/// Places each item at its reported `index`, falling back to response order.
fn order_by_index(data: Vec<EmbedData>, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if data.len() != expected {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }

    if data.iter().any(|d| d.index.is_none()) {
        return Ok(data.into_iter().map(|d| d.embedding).collect());
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in data {
        let index = item.index.unwrap_or_default();
        let slot = slots
            .get_mut(index)
            .filter(|slot| slot.is_none())
            .ok_or_else(|| {
                EmbeddingError::InvalidResponse(format!(
                    "embedding index {} out of range or duplicated",
                    index
                ))
            })?;
        *slot = Some(item.embedding);
    }
    Ok(slots.into_iter().flatten().collect())
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.request(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(embedding: Vec<f32>, index: Option<usize>) -> EmbedData {
        EmbedData { embedding, index }
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        assert!(matches!(
            HttpEmbeddingProvider::new("ftp://example.com", "m"),
            Err(EmbeddingError::InvalidConfig(_))
        ));
        assert!(HttpEmbeddingProvider::new("http://localhost:8080/v1/embeddings", "m").is_ok());
    }

    #[test]
    fn test_reorders_by_index() {
        let data = vec![item(vec![2.0], Some(1)), item(vec![1.0], Some(0))];
        assert_eq!(order_by_index(data, 2).unwrap(), vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_missing_index_keeps_response_order() {
        let data = vec![item(vec![2.0], None), item(vec![1.0], Some(0))];
        assert_eq!(order_by_index(data, 2).unwrap(), vec![vec![2.0], vec![1.0]]);
    }

    #[test]
    fn test_duplicate_or_out_of_range_index() {
        let dup = vec![item(vec![1.0], Some(0)), item(vec![2.0], Some(0))];
        assert!(order_by_index(dup, 2).is_err());
        let oob = vec![item(vec![1.0], Some(5))];
        assert!(order_by_index(oob, 1).is_err());
    }

    #[test]
    fn test_count_mismatch() {
        assert!(order_by_index(vec![item(vec![1.0], Some(0))], 2).is_err());
    }

    #[test]
    fn test_response_parsing() {
        let parsed: EmbedResponse = serde_json::from_str(
            r#"{"object": "list", "data": [{"object": "embedding", "embedding": [0.1, 0.2], "index": 0}], "model": "m"}"#,
        )
        .unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2]);
        assert_eq!(parsed.data[0].index, Some(0));
    }
}
