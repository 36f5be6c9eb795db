//! The external judgment/extraction oracle contract.
//!
//! Every call site degrades locally: a bounded fixed-delay retry wraps each
//! oracle operation, and exhaustion yields a safe fallback (an unknown
//! verdict, an empty subgraph, zero mentions) instead of a batch failure.

use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;
use tracing::warn;

use crate::graph::{EntityMention, RawSubgraph};
use crate::llm_client::{LlmClient, Message};
use crate::prompts;
use crate::utils::retry::RetryPolicy;
use crate::utils::text::extract_json_from_response;

/// Outcome of a same-entity judgment.
///
/// `Unknown` is distinct from `Different`: it means the judgment service
/// could not answer (retries exhausted, unparseable reply). Resolution treats
/// it as not-same — fail closed — but callers can count outages separately
/// from confirmed differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Same,
    Different,
    Unknown,
}

impl Verdict {
    pub fn is_same(self) -> bool {
        matches!(self, Verdict::Same)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Same => "same",
            Verdict::Different => "different",
            Verdict::Unknown => "unknown",
        }
    }
}

/// Operations the core depends on from the external oracle.
#[allow(async_fn_in_trait)]
pub trait ExtractionOracle: Send + Sync {
    /// Extract named-entity mentions from one sentence. The reply is the raw
    /// JSON object (`entityN` → record); failure yields an empty object.
    async fn extract_mentions(&self, sentence: &str) -> serde_json::Value;

    /// Judge whether two mentions denote the same real-world entity.
    async fn judge_same(&self, a: &EntityMention, b: &EntityMention) -> Verdict;

    /// Extract the subgraph centered on `target` from `context`. Failure
    /// yields an empty, degraded record.
    async fn extract_subgraph(&self, context: &str, target: &str, related_kg: &str)
        -> RawSubgraph;
}

static RESULT_RE: OnceLock<Regex> = OnceLock::new();

fn result_re() -> &'static Regex {
    // Matches `"result": true`, `'result': True`, `result: FALSE`, …
    RESULT_RE.get_or_init(|| {
        Regex::new(r#"(?i)['"]?result['"]?\s*:\s*['"]?(true|false)"#).expect("static regex is valid")
    })
}

/// Parse a judgment reply tolerantly.
///
/// Accepts strict JSON (`{"result": true}`), boolean-as-string values, and
/// Python-literal replies (`{'result': True}`) that are not valid JSON.
pub(crate) fn parse_verdict(reply: &str) -> Verdict {
    if let Some(json_str) = extract_json_from_response(reply) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(json_str) {
            match value.get("result") {
                Some(serde_json::Value::Bool(b)) => {
                    return if *b { Verdict::Same } else { Verdict::Different };
                }
                Some(serde_json::Value::String(s)) => {
                    match s.trim().to_ascii_lowercase().as_str() {
                        "true" | "yes" => return Verdict::Same,
                        "false" | "no" => return Verdict::Different,
                        _ => {}
                    }
                }
                _ => {}
            }
        }
    }

    // Python-literal or otherwise non-JSON reply: pattern-scan for the verdict.
    if let Some(caps) = result_re().captures(reply) {
        return if caps[1].eq_ignore_ascii_case("true") {
            Verdict::Same
        } else {
            Verdict::Different
        };
    }

    Verdict::Unknown
}

/// Oracle implementation backed by two LLM clients: a capable model for
/// extraction and a smaller one for judgments.
pub struct LlmOracle<C: LlmClient> {
    extract_client: C,
    judge_client: C,
    policy: RetryPolicy,
}

impl<C: LlmClient> LlmOracle<C> {
    pub fn new(extract_client: C, judge_client: C) -> Self {
        Self {
            extract_client,
            judge_client,
            policy: RetryPolicy::default(),
        }
    }

    /// Override the per-call retry policy (default: 3 attempts, 3 s apart).
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl<C: LlmClient> ExtractionOracle for LlmOracle<C> {
    async fn extract_mentions(&self, sentence: &str) -> serde_json::Value {
        let prompt = prompts::mention_extraction(sentence);
        let messages = [Message::user(prompt)];

        self.policy
            .run_with_fallback(
                "extract_mentions",
                || self.extract_client.generate_json(&messages),
                json!({}),
            )
            .await
    }

    async fn judge_same(&self, a: &EntityMention, b: &EntityMention) -> Verdict {
        let entity1 = serde_json::to_string(a).unwrap_or_default();
        let entity2 = serde_json::to_string(b).unwrap_or_default();
        let prompt = prompts::judge_same_entity(&entity1, &entity2);
        let messages = [Message::user(prompt)];

        let reply = self
            .policy
            .run("judge_same", || self.judge_client.generate(&messages))
            .await;

        match reply {
            Ok(text) => {
                let verdict = parse_verdict(&text);
                if verdict == Verdict::Unknown {
                    warn!(a = %a.name, b = %b.name, "judgment reply carried no verdict");
                }
                verdict
            }
            Err(_) => Verdict::Unknown,
        }
    }

    async fn extract_subgraph(
        &self,
        context: &str,
        target: &str,
        related_kg: &str,
    ) -> RawSubgraph {
        let prompt = prompts::subgraph_extraction(context, target, related_kg);
        let messages = [Message::user(prompt)];

        let reply = self
            .policy
            .run("extract_subgraph", || {
                self.extract_client.generate_json(&messages)
            })
            .await;

        match reply {
            Ok(value) => RawSubgraph::from_reply(value),
            Err(_) => {
                warn!(target, "subgraph extraction degraded to empty after retries");
                RawSubgraph::empty(true)
            }
        }
    }
}
