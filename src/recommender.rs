//! Retrieval-augmented recommendation engine.

use tracing::debug;

use crate::chunker::Chunk;
use crate::config::LlmConfig;
use crate::error::RecommendError;
use crate::prompt::PromptTemplate;
use crate::providers::{LlmProvider, ProviderRequest};
use crate::retriever::Retriever;

/// Generated answer plus the exact chunks the model saw.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    /// Model output.
    pub answer: String,
    /// Chunks rendered into the prompt, in prompt order.
    pub sources: Vec<Chunk>,
}

/// Sampling settings forwarded to the provider on every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

impl From<&LlmConfig> for GenerationSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Retrieves context, renders the prompt and asks the model. Never retries.
pub struct RecommendationEngine<P> {
    retriever: Retriever,
    provider: P,
    template: PromptTemplate,
    settings: GenerationSettings,
}

impl<P: LlmProvider> RecommendationEngine<P> {
    /// Engine with the default prompt template.
    pub fn new(retriever: Retriever, provider: P, settings: GenerationSettings) -> Self {
        Self {
            retriever,
            provider,
            template: PromptTemplate::default(),
            settings,
        }
    }

    /// Replaces the prompt template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Retriever backing the engine.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Language-model provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Runs retrieve → render → generate for one query.
    pub fn get_recommendations(&self, query: &str) -> Result<Recommendation, RecommendError> {
        let sources = self.retriever.retrieve_default(query)?;
        let prompt = self.template.render(&sources, query);
        debug!(
            sources = sources.len(),
            prompt_chars = prompt.len(),
            model = self.provider.model_name(),
            "prompt rendered"
        );
        let request = ProviderRequest {
            prompt: &prompt,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };
        let answer = self.provider.generate(&request)?;
        Ok(Recommendation { answer, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkMetadata;
    use crate::embedder::{Embedder, HashingEmbedder};
    use crate::embeddings::EmbeddedChunk;
    use crate::error::{GenerationError, RetrievalError};
    use crate::vector_store::VectorIndex;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingProvider {
        prompts: Mutex<Vec<String>>,
    }

    impl LlmProvider for RecordingProvider {
        fn model_name(&self) -> &str {
            "recording"
        }

        fn generate(&self, request: &ProviderRequest<'_>) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(request.prompt.to_string());
            Ok("1. **Naruto**".to_string())
        }
    }

    struct FailingProvider;

    impl LlmProvider for FailingProvider {
        fn model_name(&self) -> &str {
            "failing"
        }

        fn generate(&self, _request: &ProviderRequest<'_>) -> Result<String, GenerationError> {
            Err(GenerationError::EmptyResponse)
        }
    }

    fn retriever(dir: &std::path::Path, texts: &[&str]) -> Retriever {
        let embedder = HashingEmbedder::default();
        let records = texts
            .iter()
            .enumerate()
            .map(|(row, text)| {
                let chunk = Chunk {
                    text: text.to_string(),
                    metadata: ChunkMetadata {
                        source: "clean.csv".into(),
                        row,
                    },
                };
                EmbeddedChunk::new(row, chunk, embedder.embed_text(text))
            })
            .collect();
        let index = VectorIndex::build(dir, embedder.model_id(), records).unwrap();
        Retriever::new(index, Arc::new(embedder), 10)
    }

    #[test]
    fn sources_are_exactly_what_the_prompt_contained() {
        let dir = tempdir().unwrap();
        let texts = [
            "Title: Naruto\nGenres: Action, Adventure\nSynopsis: A ninja boy...",
            "Title: Monster\nGenres: Mystery\nSynopsis: A surgeon hunts a killer.",
        ];
        let engine = RecommendationEngine::new(
            retriever(dir.path(), &texts),
            RecordingProvider::default(),
            GenerationSettings::default(),
        );

        let result = engine.get_recommendations("ninja action show").unwrap();
        assert_eq!(result.answer, "1. **Naruto**");
        assert_eq!(result.sources.len(), 2);

        let prompts = engine.provider().prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("ninja action show"));
        for source in &result.sources {
            assert!(prompts[0].contains(&source.text));
        }
    }

    #[test]
    fn generation_failures_are_not_retried() {
        let dir = tempdir().unwrap();
        let engine = RecommendationEngine::new(
            retriever(dir.path(), &["Title: Naruto"]),
            FailingProvider,
            GenerationSettings::default(),
        );
        let err = engine.get_recommendations("ninja").unwrap_err();
        assert!(matches!(
            err,
            RecommendError::Generation(GenerationError::EmptyResponse)
        ));
    }

    #[test]
    fn retrieval_failures_short_circuit_generation() {
        let dir = tempdir().unwrap();
        let embedder = HashingEmbedder::new(8).unwrap();
        let chunk = Chunk {
            text: "Title: Naruto".into(),
            metadata: ChunkMetadata {
                source: "clean.csv".into(),
                row: 0,
            },
        };
        let index = VectorIndex::build(
            dir.path(),
            embedder.model_id(),
            vec![EmbeddedChunk::new(0, chunk, embedder.embed_text("Title: Naruto"))],
        )
        .unwrap();
        let retriever = Retriever::new(index, Arc::new(HashingEmbedder::new(16).unwrap()), 10);
        let engine = RecommendationEngine::new(
            retriever,
            RecordingProvider::default(),
            GenerationSettings::default(),
        );

        let err = engine.get_recommendations("ninja").unwrap_err();
        assert!(matches!(err, RecommendError::Retrieval(RetrievalError::Store(_))));
        assert!(engine.provider().prompts.lock().unwrap().is_empty());
    }
}
