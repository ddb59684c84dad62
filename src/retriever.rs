//! Query-time retrieval over a persisted index.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::chunker::Chunk;
use crate::embedder::Embedder;
use crate::error::RetrievalError;
use crate::vector_store::{ScoredChunk, VectorIndex};

/// Embeds queries and searches the index with the same model that built it.
pub struct Retriever {
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
    default_k: usize,
}

impl Retriever {
    /// Wraps an opened index. Logs a warning when the index was built with a
    /// different embedding model, since scores are then meaningless.
    pub fn new(index: VectorIndex, embedder: Arc<dyn Embedder>, default_k: usize) -> Self {
        let built_with = index.manifest().embedding_model.as_str();
        if !index.is_empty() && built_with != embedder.model_id() {
            warn!(
                index_model = built_with,
                query_model = embedder.model_id(),
                "vector index was built with a different embedding model"
            );
        }
        Self {
            index,
            embedder,
            default_k,
        }
    }

    /// Underlying index.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Result count used by [`Retriever::retrieve_default`].
    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Up to `k` chunks, most similar first.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Chunk>, RetrievalError> {
        Ok(self
            .retrieve_scored(query, k)?
            .into_iter()
            .map(|hit| hit.chunk)
            .collect())
    }

    /// [`Retriever::retrieve`] with the configured default `k`.
    pub fn retrieve_default(&self, query: &str) -> Result<Vec<Chunk>, RetrievalError> {
        self.retrieve(query, self.default_k)
    }

    /// Like [`Retriever::retrieve`] but keeps similarity scores.
    pub fn retrieve_scored(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, RetrievalError> {
        if k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed_query(query)?;
        let hits = self.index.search(&vector, k)?;
        debug!(
            k,
            hits = hits.len(),
            top_score = hits.first().map(|hit| hit.score),
            "retrieved chunks"
        );
        Ok(hits)
    }
}
