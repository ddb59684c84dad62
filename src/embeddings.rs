//! Embedding records shared by the index builder and the vector store.

use serde::{Deserialize, Serialize};

use crate::chunker::{Chunk, ChunkMetadata};

/// One persisted line of the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    /// Position of the chunk within the index.
    pub chunk_id: usize,
    /// Chunk body submitted to the embedding model.
    pub text: String,
    /// Provenance of the chunk.
    pub metadata: ChunkMetadata,
    /// Model embedding vector.
    pub embedding: Vec<f32>,
}

impl EmbeddedChunk {
    /// Pairs a chunk with its embedding.
    pub fn new(chunk_id: usize, chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            chunk_id,
            text: chunk.text,
            metadata: chunk.metadata,
            embedding,
        }
    }

    /// Chunk view without the vector.
    pub fn to_chunk(&self) -> Chunk {
        Chunk {
            text: self.text.clone(),
            metadata: self.metadata.clone(),
        }
    }
}
