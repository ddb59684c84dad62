//! Local feature-hashing embedder.
//!
//! Needs no network or model weights, so offline index builds and the test
//! suite use it. Vectors are stable across runs and platforms because buckets
//! come from CRC32 rather than the std hasher.

use crc32fast::Hasher as Crc32;

use super::{l2_normalize, Embedder};
use crate::error::EmbeddingError;

/// Default vector width, matching `all-MiniLM-L6-v2`.
pub const DEFAULT_HASHING_DIMENSIONS: usize = 384;

const BIGRAM_WEIGHT: f32 = 0.5;

/// Signed feature hashing of lower-cased word unigrams and bigrams.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    model_id: String,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_HASHING_DIMENSIONS,
            model_id: model_id(DEFAULT_HASHING_DIMENSIONS),
        }
    }
}

impl HashingEmbedder {
    /// Embedder producing `dimensions`-wide vectors.
    pub fn new(dimensions: usize) -> Result<Self, EmbeddingError> {
        if dimensions == 0 {
            return Err(EmbeddingError::Config(
                "hashing dimensions must be greater than zero".into(),
            ));
        }
        Ok(Self {
            dimensions,
            model_id: model_id(dimensions),
        })
    }

    /// Output vector width.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embeds one text without the batch wrapper.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let tokens = tokenize(text);
        for token in &tokens {
            self.accumulate(&mut vector, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, bigram.as_bytes(), BIGRAM_WEIGHT);
        }
        l2_normalize(&mut vector);
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let mut hasher = Crc32::new();
        hasher.update(feature);
        let hash = hasher.finalize();
        let bucket = (hash & 0x7fff_ffff) as usize % self.dimensions;
        let sign = if hash >> 31 == 1 { -1.0 } else { 1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(inputs.iter().map(|text| self.embed_text(text)).collect())
    }
}

fn model_id(dimensions: usize) -> String {
    format!("anirec/hashing-v1-{dimensions}")
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}
