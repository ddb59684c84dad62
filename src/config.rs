//! Explicit configuration objects and the clap argument groups that fill them.
//!
//! Nothing here reads process state on its own: binaries parse arguments (with
//! environment fallbacks) and hand the resulting structs to the library.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};

use crate::embedder::hashing::DEFAULT_HASHING_DIMENSIONS;

/// Default sentence-embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
/// Default Hugging Face inference root.
pub const DEFAULT_EMBEDDING_BASE: &str = "https://router.huggingface.co/hf-inference/models";
/// Default generation model: Groq's small instant-tier model.
pub const DEFAULT_MODEL_NAME: &str = "llama-3.1-8b-instant";
/// Default OpenAI-compatible endpoint root (Groq).
pub const DEFAULT_LLM_BASE: &str = "https://api.groq.com/openai/v1";
/// Default persisted index location.
pub const DEFAULT_PERSIST_DIR: &str = "data/gold";
/// Number of chunks retrieved per query.
pub const DEFAULT_TOP_K: usize = 10;

/// Embedding backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Hugging Face Inference API (needs a token).
    #[value(name = "huggingface")]
    HuggingFace,
    /// Local feature hashing; offline and deterministic.
    Hashing,
}

/// Embedding collaborator settings.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingConfig {
    /// Backend selection.
    pub kind: EmbedderKind,
    /// Hugging Face model repository id.
    pub model: String,
    /// Hugging Face access token.
    pub token: Option<String>,
    /// Hugging Face inference root URL.
    pub base_url: String,
    /// Vector width for the hashing backend.
    pub dimensions: usize,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            kind: EmbedderKind::HuggingFace,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            token: None,
            base_url: DEFAULT_EMBEDDING_BASE.to_string(),
            dimensions: DEFAULT_HASHING_DIMENSIONS,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Language-model collaborator settings.
#[derive(Clone, Debug, PartialEq)]
pub struct LlmConfig {
    /// API key; construction fails without one.
    pub api_key: Option<String>,
    /// Generation model.
    pub model_name: String,
    /// OpenAI-compatible endpoint root.
    pub base_url: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: usize,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            base_url: DEFAULT_LLM_BASE.to_string(),
            temperature: 0.0,
            max_tokens: 1024,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Everything the pipeline facade needs at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Persisted index directory.
    pub persist_dir: PathBuf,
    /// Chunks retrieved per query.
    pub top_k: usize,
    /// Embedding settings; must match the ones used to build the index.
    pub embedding: EmbeddingConfig,
    /// Language-model settings.
    pub llm: LlmConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            persist_dir: PathBuf::from(DEFAULT_PERSIST_DIR),
            top_k: DEFAULT_TOP_K,
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

/// Embedding arguments shared by the build and chat binaries.
#[derive(Args, Debug, Clone)]
pub struct EmbeddingArgs {
    /// Embedding backend
    #[arg(long, env = "ANIREC_EMBEDDER", value_enum, default_value_t = EmbedderKind::HuggingFace)]
    pub embedder: EmbedderKind,

    /// Hugging Face embedding model
    #[arg(long, env = "ANIREC_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    pub embedding_model: String,

    /// Hugging Face access token
    #[arg(long, env = "HUGGINGFACEHUB_API_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    /// Hugging Face inference root URL
    #[arg(long, env = "ANIREC_EMBEDDING_BASE", default_value = DEFAULT_EMBEDDING_BASE)]
    pub embedding_base_url: String,

    /// Vector width for the hashing embedder
    #[arg(long, env = "ANIREC_HASHING_DIMENSIONS", default_value_t = DEFAULT_HASHING_DIMENSIONS)]
    pub hashing_dimensions: usize,

    /// Max seconds to wait for each embedding request
    #[arg(long, env = "ANIREC_EMBEDDING_TIMEOUT_SECS", default_value_t = 30)]
    pub embedding_timeout_secs: u64,
}

impl EmbeddingArgs {
    /// Converts the parsed arguments into an [`EmbeddingConfig`].
    pub fn to_config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            kind: self.embedder,
            model: self.embedding_model.clone(),
            token: non_blank(self.hf_token.as_deref()),
            base_url: self.embedding_base_url.clone(),
            dimensions: self.hashing_dimensions,
            timeout: Duration::from_secs(self.embedding_timeout_secs.max(1)),
        }
    }
}

/// Language-model arguments for the chat binary.
#[derive(Args, Debug, Clone)]
pub struct LlmArgs {
    /// API key for the generation endpoint
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub groq_api_key: Option<String>,

    /// Generation model
    #[arg(long, env = "MODEL_NAME", default_value = DEFAULT_MODEL_NAME)]
    pub model_name: String,

    /// Base URL of the OpenAI-compatible chat API
    #[arg(long, env = "ANIREC_LLM_BASE", default_value = DEFAULT_LLM_BASE)]
    pub llm_base_url: String,

    /// Sampling temperature for the answer model
    #[arg(long, default_value_t = 0.0)]
    pub temperature: f32,

    /// Maximum tokens to request from the completion model
    #[arg(long, default_value_t = 1024)]
    pub max_completion_tokens: usize,

    /// Max seconds to wait for a completion
    #[arg(long, env = "ANIREC_LLM_TIMEOUT_SECS", default_value_t = 60)]
    pub llm_timeout_secs: u64,
}

impl LlmArgs {
    /// Converts the parsed arguments into an [`LlmConfig`].
    pub fn to_config(&self) -> LlmConfig {
        LlmConfig {
            api_key: non_blank(self.groq_api_key.as_deref()),
            model_name: self.model_name.clone(),
            base_url: self.llm_base_url.clone(),
            temperature: self.temperature,
            max_tokens: self.max_completion_tokens,
            timeout: Duration::from_secs(self.llm_timeout_secs.max(1)),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        embedding: EmbeddingArgs,
        #[command(flatten)]
        llm: LlmArgs,
    }

    #[test]
    fn defaults_match_the_reference_deployment() {
        let config = PipelineConfig::default();
        assert_eq!(config.top_k, 10);
        assert_eq!(config.persist_dir, PathBuf::from("data/gold"));
        assert_eq!(config.llm.model_name, "llama-3.1-8b-instant");
        assert_eq!(config.embedding.model, "sentence-transformers/all-MiniLM-L6-v2");
    }

    #[test]
    fn parses_flags_into_configs() {
        let cli = TestCli::parse_from([
            "test",
            "--embedder",
            "hashing",
            "--hashing-dimensions",
            "64",
            "--groq-api-key",
            "  gsk_test ",
            "--model-name",
            "llama-3.3-70b-versatile",
        ]);
        let embedding = cli.embedding.to_config();
        assert_eq!(embedding.kind, EmbedderKind::Hashing);
        assert_eq!(embedding.dimensions, 64);

        let llm = cli.llm.to_config();
        assert_eq!(llm.api_key.as_deref(), Some("gsk_test"));
        assert_eq!(llm.model_name, "llama-3.3-70b-versatile");
    }

    #[test]
    fn blank_secrets_count_as_missing() {
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
