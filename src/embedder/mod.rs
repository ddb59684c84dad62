//! Embedding collaborators.
//!
//! The index builder and the retriever only see the [`Embedder`] trait. A
//! persisted index must be queried with the same model that built it.

use std::sync::Arc;

use crate::config::{EmbedderKind, EmbeddingConfig};
use crate::error::EmbeddingError;

pub mod hashing;
pub mod huggingface;

pub use hashing::HashingEmbedder;
pub use huggingface::HuggingFaceEmbedder;

/// Produces fixed-dimension vectors for text.
pub trait Embedder: Send + Sync {
    /// Identifier recorded in the index manifest.
    fn model_id(&self) -> &str;

    /// Embeds each input; the output order matches the input order.
    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embeds a single query string.
    fn embed_query(&self, query: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[query])?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                expected: 1,
                got: vectors.len(),
            });
        }
        vectors.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            got: 0,
        })
    }
}

/// Builds the embedder selected by `config`.
pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    match config.kind {
        EmbedderKind::HuggingFace => {
            let token = config
                .token
                .clone()
                .ok_or(EmbeddingError::MissingToken(huggingface::SERVICE_NAME))?;
            let embedder = HuggingFaceEmbedder::new(
                token,
                config.base_url.clone(),
                config.model.clone(),
                config.timeout,
            )?;
            Ok(Arc::new(embedder))
        }
        EmbedderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimensions)?)),
    }
}

/// Scales `vector` to unit length in place; zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector
        .iter()
        .map(|value| (*value as f64) * (*value as f64))
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value = (*value as f64 / norm) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_unit_length() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn huggingface_requires_a_token() {
        let config = EmbeddingConfig {
            token: None,
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            from_config(&config),
            Err(EmbeddingError::MissingToken(_))
        ));
    }

    #[test]
    fn hashing_embedder_needs_no_credentials() {
        let config = EmbeddingConfig {
            kind: EmbedderKind::Hashing,
            dimensions: 64,
            ..EmbeddingConfig::default()
        };
        let embedder = from_config(&config).unwrap();
        assert_eq!(embedder.embed_query("ninja").unwrap().len(), 64);
    }
}
