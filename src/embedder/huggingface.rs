//! Hugging Face Inference API embedding client.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{l2_normalize, Embedder};
use crate::error::EmbeddingError;

pub(crate) const SERVICE_NAME: &str = "Hugging Face";

/// Blocking client for the `feature-extraction` pipeline of a sentence
/// embedding model hosted on Hugging Face.
#[derive(Clone)]
pub struct HuggingFaceEmbedder {
    client: Client,
    endpoint: String,
    model: String,
}

impl HuggingFaceEmbedder {
    /// Builds a client for `model` under `base_url`.
    ///
    /// # Arguments
    /// * `token` - Access token (usually from `HUGGINGFACEHUB_API_TOKEN`)
    /// * `base_url` - Models root, e.g. `https://router.huggingface.co/hf-inference/models`
    /// * `model` - Repository id, e.g. `sentence-transformers/all-MiniLM-L6-v2`
    pub fn new(
        token: String,
        base_url: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        if token.trim().is_empty() {
            return Err(EmbeddingError::MissingToken(SERVICE_NAME));
        }
        if model.trim().is_empty() {
            return Err(EmbeddingError::Config("missing embedding model name".into()));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(EmbeddingError::Config(format!(
                "embedding base URL must be http(s): {base_url}"
            )));
        }
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", token.trim());
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&auth)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        let endpoint = format!(
            "{}/{}/pipeline/feature-extraction",
            base_url.trim_end_matches('/'),
            model.trim_matches('/')
        );
        Ok(Self {
            client,
            endpoint,
            model,
        })
    }

    /// Fully-qualified feature-extraction endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Embedder for HuggingFaceEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = inputs.len(), model = %self.model, "requesting embeddings");
        let request = FeatureExtractionRequest {
            inputs,
            options: RequestOptions {
                wait_for_model: true,
            },
        };
        let resp = self.client.post(&self.endpoint).json(&request).send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbeddingError::Status { status, body });
        }
        let payload: FeatureExtractionResponse = resp
            .json()
            .map_err(|err| EmbeddingError::Decode(err.to_string()))?;
        let mut vectors = payload.into_sentence_vectors()?;
        if vectors.len() != inputs.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: inputs.len(),
                got: vectors.len(),
            });
        }
        for vector in vectors.iter_mut() {
            l2_normalize(vector);
        }
        Ok(vectors)
    }
}

#[derive(Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a [&'a str],
    options: RequestOptions,
}

#[derive(Serialize)]
struct RequestOptions {
    wait_for_model: bool,
}

/// Sentence-transformers models return one pooled vector per input; plain
/// encoders return one vector per token and are mean-pooled here.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureExtractionResponse {
    Pooled(Vec<Vec<f32>>),
    TokenLevel(Vec<Vec<Vec<f32>>>),
}

impl FeatureExtractionResponse {
    fn into_sentence_vectors(self) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        match self {
            Self::Pooled(vectors) => Ok(vectors),
            Self::TokenLevel(batches) => batches.into_iter().map(mean_pool).collect(),
        }
    }
}

fn mean_pool(tokens: Vec<Vec<f32>>) -> Result<Vec<f32>, EmbeddingError> {
    let dims = tokens
        .first()
        .map(Vec::len)
        .ok_or_else(|| EmbeddingError::Decode("token-level output with no tokens".into()))?;
    let mut pooled = vec![0.0f32; dims];
    for token in &tokens {
        if token.len() != dims {
            return Err(EmbeddingError::Decode(format!(
                "ragged token embeddings: expected {dims} values, got {}",
                token.len()
            )));
        }
        for (acc, value) in pooled.iter_mut().zip(token) {
            *acc += value;
        }
    }
    let count = tokens.len() as f32;
    for value in pooled.iter_mut() {
        *value /= count;
    }
    Ok(pooled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_model_endpoint() {
        let embedder = HuggingFaceEmbedder::new(
            "hf_test".into(),
            "https://router.huggingface.co/hf-inference/models/".into(),
            "sentence-transformers/all-MiniLM-L6-v2".into(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            embedder.endpoint(),
            "https://router.huggingface.co/hf-inference/models/sentence-transformers/all-MiniLM-L6-v2/pipeline/feature-extraction"
        );
        assert_eq!(embedder.model_id(), "sentence-transformers/all-MiniLM-L6-v2");
    }

    #[test]
    fn rejects_blank_token_and_bad_base() {
        let blank = HuggingFaceEmbedder::new(
            "  ".into(),
            "https://example.com".into(),
            "m".into(),
            Duration::from_secs(5),
        );
        assert!(matches!(blank, Err(EmbeddingError::MissingToken(_))));

        let bad_base = HuggingFaceEmbedder::new(
            "hf_test".into(),
            "ftp://example.com".into(),
            "m".into(),
            Duration::from_secs(5),
        );
        assert!(matches!(bad_base, Err(EmbeddingError::Config(_))));
    }

    #[test]
    fn parses_pooled_and_token_level_payloads() {
        let pooled: FeatureExtractionResponse =
            serde_json::from_str("[[0.1, 0.2], [0.3, 0.4]]").unwrap();
        assert_eq!(pooled.into_sentence_vectors().unwrap().len(), 2);

        let tokens: FeatureExtractionResponse =
            serde_json::from_str("[[[1.0, 3.0], [3.0, 5.0]]]").unwrap();
        assert_eq!(tokens.into_sentence_vectors().unwrap(), vec![vec![2.0, 4.0]]);
    }
}
