//! Similarity index: embeds every mention and proposes candidate pairs for
//! the same-entity judge.
//!
//! Candidate generation is a recall filter, not a decision: anything it emits
//! still has to pass judgment, so the only hard requirement is that it embeds
//! exactly what the mentions declare and applies the threshold strictly.

use tracing::debug;

use crate::embedder::EmbedderClient;
use crate::errors::Result;
use crate::graph::{MentionId, MentionSet};
use crate::utils::similarity::cosine_similarity;

/// A pair of mentions whose embedding similarity exceeds the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidatePair {
    pub a: MentionId,
    pub b: MentionId,
    pub score: f32,
}

/// Pairwise cosine scan over mention embeddings.
pub struct SimilarityIndex {
    threshold: f32,
}

impl SimilarityIndex {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Embed every live mention and return the unordered pairs scoring
    /// strictly above the threshold, in insertion order of the first member.
    ///
    /// Embedding failure is fatal: a partial candidate set would silently
    /// under-merge, so the error propagates instead of degrading.
    pub async fn candidate_pairs<E: EmbedderClient>(
        &self,
        embedder: &E,
        mentions: &MentionSet,
    ) -> Result<Vec<CandidatePair>> {
        let live: Vec<(MentionId, String)> = mentions
            .iter()
            .map(|(id, m)| (id, m.embedding_text()))
            .collect();
        if live.len() < 2 {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = live.iter().map(|(_, t)| t.as_str()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;

        let mut pairs = Vec::new();
        for i in 0..live.len() {
            for j in (i + 1)..live.len() {
                let score = cosine_similarity(&embeddings[i], &embeddings[j]);
                if score > self.threshold {
                    pairs.push(CandidatePair {
                        a: live[i].0,
                        b: live[j].0,
                        score,
                    });
                }
            }
        }

        debug!(
            mentions = live.len(),
            candidates = pairs.len(),
            threshold = self.threshold,
            "similarity scan complete"
        );
        Ok(pairs)
    }
}
