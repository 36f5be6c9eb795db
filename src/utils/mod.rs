//! Shared utilities.
//!
//! Includes:
//! - Vector similarity (cosine over f32 slices)
//! - Text helpers (whitespace normalization, JSON extraction from LLM
//!   replies, output quote sanitation)
//! - Bounded fixed-delay retry with a terminal fallback value

pub mod retry;
pub mod similarity;
pub mod text;

pub use retry::RetryPolicy;
pub use similarity::cosine_similarity;
pub use text::{extract_json_from_response, normalize_whitespace, sanitize_quotes};
