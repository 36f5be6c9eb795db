//! Error types for textkg.

/// Alias for Results returning [`TextKgError`].
pub type Result<T> = std::result::Result<T, TextKgError>;

/// Top-level error type for textkg.
#[derive(Debug, thiserror::Error)]
pub enum TextKgError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Embedder error: {0}")]
    Embedder(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// LLM-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limited")]
    RateLimit,

    #[error("Model refused to respond")]
    Refusal,

    #[error("Empty response from LLM")]
    EmptyResponse,

    #[error("Response was not parseable JSON")]
    MalformedResponse,

    #[error("Authentication failed")]
    Authentication,

    #[error("API error: HTTP {status} — {message}")]
    Api { status: u16, message: String },
}
