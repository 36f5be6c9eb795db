//! Shared configuration types.

use serde::{Deserialize, Serialize};
use validator::Validate;

fn validate_embedding_dim(dim: usize) -> Result<(), validator::ValidationError> {
    if dim == 0 {
        return Err(validator::ValidationError::new("embedding_dim must be > 0"));
    }
    Ok(())
}

fn validate_threshold(t: f32) -> Result<(), validator::ValidationError> {
    if !(t > 0.0 && t <= 1.0) {
        return Err(validator::ValidationError::new(
            "similarity_threshold must be in (0, 1]",
        ));
    }
    Ok(())
}

/// Central configuration loaded from environment variables.
///
/// Missing required variables are a fatal startup error — no batch is
/// processed with an incomplete configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PipelineConfig {
    /// API key for the OpenAI-compatible endpoint serving extraction,
    /// judgment, and embeddings.
    #[validate(length(min = 1))]
    pub openai_api_key: String,

    /// Optional custom API base URL (e.g. a local inference server).
    pub api_base: Option<String>,

    /// Model used for mention and subgraph extraction.
    pub model_name: String,

    /// Smaller/cheaper model used for same-entity judgments.
    pub judge_model_name: String,

    /// Embedding model name.
    pub embedding_model: String,

    /// Embedding vector dimension (must be > 0).
    #[validate(custom(function = validate_embedding_dim))]
    pub embedding_dim: usize,

    /// Cosine similarity threshold for candidate pairs; pairs strictly
    /// above this value are sent to judgment.
    #[validate(custom(function = validate_threshold))]
    pub similarity_threshold: f32,

    /// Number of retrieved context sentences per entity extraction.
    pub retrieval_top_k: usize,

    /// Directory for intermediate artifact logs (JSONL).
    pub artifact_dir: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            api_base: None,
            model_name: "gpt-4o".to_string(),
            judge_model_name: "gpt-4.1-nano".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dim: 1536,
            similarity_threshold: 0.60,
            retrieval_top_k: 5,
            artifact_dir: "artifacts".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` first (non-fatal if `.env` is absent),
    /// then reads each variable from the process environment. The required
    /// variable (`OPENAI_API_KEY`) returns a
    /// [`crate::TextKgError::Validation`] error when absent or empty.
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();

        let openai_api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            crate::TextKgError::Validation("OPENAI_API_KEY is required".to_string())
        })?;

        let api_base = std::env::var("OPENAI_API_BASE").ok();

        let model_name = std::env::var("MODEL_NAME").unwrap_or_else(|_| "gpt-4o".to_string());

        let judge_model_name =
            std::env::var("JUDGE_MODEL_NAME").unwrap_or_else(|_| "gpt-4.1-nano".to_string());

        let embedding_model = std::env::var("EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());

        let embedding_dim = match std::env::var("EMBEDDING_DIM") {
            Ok(val) => val.parse::<usize>().map_err(|_| {
                crate::TextKgError::Validation(
                    "EMBEDDING_DIM must be a positive integer".to_string(),
                )
            })?,
            Err(_) => 1536,
        };

        let similarity_threshold = match std::env::var("SIMILARITY_THRESHOLD") {
            Ok(val) => val.parse::<f32>().map_err(|_| {
                crate::TextKgError::Validation(
                    "SIMILARITY_THRESHOLD must be a number in (0, 1]".to_string(),
                )
            })?,
            Err(_) => 0.60,
        };

        let retrieval_top_k = match std::env::var("RETRIEVAL_TOP_K") {
            Ok(val) => val.parse::<usize>().map_err(|_| {
                crate::TextKgError::Validation(
                    "RETRIEVAL_TOP_K must be a non-negative integer".to_string(),
                )
            })?,
            Err(_) => 5,
        };

        let artifact_dir =
            std::env::var("ARTIFACT_DIR").unwrap_or_else(|_| "artifacts".to_string());

        let config = Self {
            openai_api_key,
            api_base,
            model_name,
            judge_model_name,
            embedding_model,
            embedding_dim,
            similarity_threshold,
            retrieval_top_k,
            artifact_dir,
        };

        config
            .validate()
            .map_err(|e| crate::TextKgError::Validation(e.to_string()))?;

        Ok(config)
    }
}
