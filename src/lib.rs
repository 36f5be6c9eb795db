//! textkg — knowledge-graph construction from unstructured text.
//!
//! A batch pipeline that segments input text, extracts entity mentions with
//! an LLM, resolves duplicate mentions through embedding similarity plus an
//! LLM same-entity judge, extracts an entity-centric subgraph per resolved
//! entity, and assembles everything into one JSON knowledge graph.
//!
//! The LLM is treated as an unreliable oracle throughout: every reply shape
//! is normalized tolerantly, every call is retried and degrades locally, and
//! only the embedding provider is allowed to fail a batch.
//!
//! # Example
//!
//! ```no_run
//! use textkg::pipeline::Pipeline;
//! use textkg::types::PipelineConfig;
//!
//! # async fn run() -> textkg::Result<()> {
//! let config = PipelineConfig::from_env()?;
//! let pipeline = Pipeline::from_config(&config)?;
//! let report = pipeline.process_batch("medicine", "NSAIDs reduce fever.").await?;
//! println!("{}", report.graph.to_json_pretty()?);
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod assembler;
pub mod embedder;
pub mod errors;
pub mod graph;
pub mod llm_client;
pub mod normalize;
pub mod oracle;
pub mod pipeline;
pub mod prompts;
pub mod resolution;
pub mod segment;
pub mod similarity;
pub mod types;
pub mod utils;

pub use errors::{LlmError, Result, TextKgError};
pub use graph::KnowledgeGraph;
pub use pipeline::{BatchReport, Pipeline};
pub use types::PipelineConfig;
