//! Pipeline facade.
//!
//! Construct once per process and reuse for every query: construction loads
//! the index and builds the HTTP clients. All failures leave through
//! [`PipelineError`], tagged with the stage that failed.

use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::PipelineConfig;
use crate::embedder::{self, Embedder};
use crate::error::{BoxError, PipelineError, Stage};
use crate::providers::{GroqProvider, LlmProvider};
use crate::recommender::{GenerationSettings, Recommendation, RecommendationEngine};
use crate::retriever::Retriever;
use crate::vector_store::VectorIndex;

/// Long-lived, read-only recommendation handle.
pub struct RecommendationPipeline<P = GroqProvider> {
    engine: RecommendationEngine<P>,
}

impl RecommendationPipeline<GroqProvider> {
    /// Builds the embedder and the Groq client from `config` and opens the
    /// index at `config.persist_dir`.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        info!(
            persist_dir = %config.persist_dir.display(),
            model = %config.llm.model_name,
            "initializing recommendation pipeline"
        );
        let embedder = embedder::from_config(&config.embedding).map_err(init_failure)?;
        let provider = GroqProvider::new(&config.llm).map_err(init_failure)?;
        Self::new(
            &config.persist_dir,
            embedder,
            provider,
            config.top_k,
            GenerationSettings::from(&config.llm),
        )
    }
}

impl<P: LlmProvider> RecommendationPipeline<P> {
    /// Opens the index at `persist_dir` and wires it to the given collaborators.
    pub fn new(
        persist_dir: impl AsRef<Path>,
        embedder: Arc<dyn Embedder>,
        provider: P,
        top_k: usize,
        settings: GenerationSettings,
    ) -> Result<Self, PipelineError> {
        let index = VectorIndex::open(persist_dir).map_err(init_failure)?;
        info!(
            chunks = index.len(),
            embedding_model = %index.manifest().embedding_model,
            llm = provider.model_name(),
            top_k,
            "recommendation pipeline ready"
        );
        let retriever = Retriever::new(index, embedder, top_k);
        Ok(Self {
            engine: RecommendationEngine::new(retriever, provider, settings),
        })
    }

    /// Engine behind the facade.
    pub fn engine(&self) -> &RecommendationEngine<P> {
        &self.engine
    }

    /// Answers one free-text query with up to three grounded recommendations.
    pub fn recommend(&self, query: &str) -> Result<Recommendation, PipelineError> {
        info!(query, "recommendation requested");
        match self.engine.get_recommendations(query) {
            Ok(recommendation) => {
                debug!(answer = %recommendation.answer, "recommendation generated");
                info!(sources = recommendation.sources.len(), "recommendation complete");
                Ok(recommendation)
            }
            Err(err) => {
                error!(error = %err, query, "recommendation failed");
                Err(PipelineError::new(Stage::Recommendation, err))
            }
        }
    }
}

fn init_failure<E>(err: E) -> PipelineError
where
    E: Into<BoxError> + Display,
{
    error!(error = %err, "pipeline initialization failed");
    PipelineError::new(Stage::Initialization, err)
}
