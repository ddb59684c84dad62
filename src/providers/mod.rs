//! Language-model collaborators.

mod groq;

pub use groq::GroqProvider;

use crate::error::GenerationError;

/// Trait implemented by concrete LLM providers.
pub trait LlmProvider: Send + Sync {
    /// Model that will answer the request.
    fn model_name(&self) -> &str;

    /// Generates a completion for a fully rendered prompt.
    fn generate(&self, request: &ProviderRequest<'_>) -> Result<String, GenerationError>;
}

/// Request envelope shared by the various providers.
#[derive(Debug, Clone, Copy)]
pub struct ProviderRequest<'a> {
    /// Rendered prompt, sent as a single user message.
    pub prompt: &'a str,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: usize,
}
