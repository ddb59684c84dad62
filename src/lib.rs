#![warn(missing_docs)]
//! Retrieval-augmented anime recommendations.
//!
//! The crate ingests a raw anime catalog into labelled documents, chunks and
//! embeds them into a local vector index, and answers free-text requests by
//! retrieving the closest chunks and asking a chat model to recommend titles
//! grounded in them.

pub mod catalog;
pub mod chunker;
pub mod config;
pub mod embedder;
pub mod embeddings;
pub mod error;
pub mod index_builder;
pub mod logging;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod recommender;
pub mod retriever;
pub mod vector_store;

pub use catalog::{CatalogColumns, CatalogDocument, CatalogLoader, CatalogRow, LoadReport};
pub use chunker::{Chunk, ChunkMetadata, TextSplitter};
pub use config::{EmbedderKind, EmbeddingConfig, LlmConfig, PipelineConfig};
pub use embedder::{Embedder, HashingEmbedder, HuggingFaceEmbedder};
pub use embeddings::EmbeddedChunk;
pub use error::{
    BuildError, CatalogError, EmbeddingError, GenerationError, PipelineError, RecommendError,
    RetrievalError, SplitterError, Stage, StoreError,
};
pub use index_builder::{BuildReport, IndexBuilder, IndexBuilderConfig};
pub use pipeline::RecommendationPipeline;
pub use prompt::PromptTemplate;
pub use providers::{GroqProvider, LlmProvider, ProviderRequest};
pub use recommender::{GenerationSettings, Recommendation, RecommendationEngine};
pub use retriever::Retriever;
pub use vector_store::{IndexManifest, ScoredChunk, VectorIndex};
