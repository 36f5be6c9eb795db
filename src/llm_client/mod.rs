//! LLM client abstraction.
//!
//! Provides a trait for calling chat-completion models. The extraction
//! oracle built on top of this never trusts reply shapes; the client's job
//! is only transport, caching, and pulling a JSON value out of the reply
//! text when one is present.
//!
//! # Implementations
//! - [`openai::OpenAiClient`] — any OpenAI-compatible endpoint via `async-openai`.

pub mod openai;

use crate::errors::Result;
use serde::Serialize;

/// A chat message for the LLM conversation.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Speaker role in a chat conversation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Trait for LLM clients.
#[allow(async_fn_in_trait)]
pub trait LlmClient: Send + Sync {
    /// Send a request and return the response as plain text.
    async fn generate(&self, messages: &[Message]) -> Result<String>;

    /// Send a request and parse the first JSON object or array found in the
    /// response text (fenced or bare) into a [`serde_json::Value`].
    ///
    /// Errors with [`crate::LlmError::MalformedResponse`] when the reply
    /// contains no parseable JSON at all. Shape validation is the caller's
    /// problem, not the client's.
    async fn generate_json(&self, messages: &[Message]) -> Result<serde_json::Value>;
}
