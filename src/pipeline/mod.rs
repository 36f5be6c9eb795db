//! Batch pipeline: text in, knowledge graph out.
//!
//! One `process_batch` call owns all of its state; nothing is shared between
//! batches, so concurrent batches on one runtime cannot interfere. Oracle
//! calls degrade locally (a failed sentence contributes nothing), while
//! embedding failure aborts the batch — a partial similarity scan would
//! silently under-merge.

use serde_json::Value;
use tracing::{info, warn};

use crate::artifacts::ArtifactWriter;
use crate::assembler::{assemble, EntitySubgraph};
use crate::embedder::{Embedding, EmbedderClient};
use crate::errors::Result;
use crate::graph::{EntityMention, KnowledgeGraph, MentionId, MentionSet};
use crate::normalize::{normalize_attributes, normalize_relationships};
use crate::oracle::ExtractionOracle;
use crate::resolution::{resolve, ResolutionReport};
use crate::segment::SegmentedText;
use crate::similarity::SimilarityIndex;
use crate::types::PipelineConfig;
use crate::utils::similarity::cosine_similarity;

/// Everything one batch produced, beyond the graph itself.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub graph: KnowledgeGraph,
    pub sentences: usize,
    pub mentions: usize,
    pub resolution: ResolutionReport,
    /// Entities whose subgraph extraction fell back to empty after retries.
    pub degraded_entities: usize,
    /// Relationship fragments the normalizer could not interpret.
    pub dropped_fragments: usize,
}

/// The batch pipeline, generic over its oracle and embedder.
pub struct Pipeline<O, E> {
    oracle: O,
    embedder: E,
    similarity_threshold: f32,
    retrieval_top_k: usize,
    artifacts: Option<ArtifactWriter>,
}

impl<O: ExtractionOracle, E: EmbedderClient> Pipeline<O, E> {
    pub fn new(oracle: O, embedder: E) -> Self {
        let defaults = PipelineConfig::default();
        Self {
            oracle,
            embedder,
            similarity_threshold: defaults.similarity_threshold,
            retrieval_top_k: defaults.retrieval_top_k,
            artifacts: None,
        }
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_retrieval_top_k(mut self, top_k: usize) -> Self {
        self.retrieval_top_k = top_k;
        self
    }

    /// Attach an artifact writer; stage records are appended as the batch
    /// progresses.
    pub fn with_artifacts(mut self, artifacts: ArtifactWriter) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Run the full batch: segment, extract mentions, resolve duplicates,
    /// extract per-entity subgraphs, assemble the graph.
    pub async fn process_batch(&self, topic: &str, content: &str) -> Result<BatchReport> {
        let segmented = SegmentedText::segment(topic, content);
        if segmented.is_empty() {
            info!(topic, "empty input, empty graph");
            return Ok(BatchReport::default());
        }

        let sentence_texts: Vec<&str> =
            segmented.chunks().iter().map(|c| c.text.as_str()).collect();
        let sentence_embeddings = self.embedder.embed_batch(&sentence_texts).await?;

        let mut mentions = self.extract_mentions(&segmented).await?;
        let mention_count = mentions.len();

        let index = SimilarityIndex::new(self.similarity_threshold);
        let pairs = index.candidate_pairs(&self.embedder, &mentions).await?;

        let resolution = resolve(&self.oracle, &mut mentions, &pairs).await;
        if let Some(w) = &self.artifacts {
            for j in &resolution.judged {
                w.record_candidate(&j.a_name, &j.b_name, j.score, j.verdict.as_str())?;
            }
            w.record_merges(&resolution.merged_names)?;
        }

        let (subgraphs, degraded_entities, dropped_fragments) = self
            .extract_subgraphs(&segmented, &sentence_embeddings, &mentions)
            .await?;

        let graph = assemble(&subgraphs);
        if let Some(w) = &self.artifacts {
            w.write_graph(&graph)?;
        }

        info!(
            topic,
            sentences = segmented.len(),
            mentions = mention_count,
            entities = graph.entities.len(),
            relations = graph.relations.len(),
            degraded_entities,
            dropped_fragments,
            "batch complete"
        );
        Ok(BatchReport {
            graph,
            sentences: segmented.len(),
            mentions: mention_count,
            resolution,
            degraded_entities,
            dropped_fragments,
        })
    }

    /// Per-sentence mention extraction. Replies carrying a `State` key are
    /// the oracle's way of declaring a sentence has nothing to extract.
    async fn extract_mentions(&self, segmented: &SegmentedText) -> Result<MentionSet> {
        let mut mentions = MentionSet::new();
        for chunk in segmented.chunks() {
            let reply = self.oracle.extract_mentions(&chunk.text).await;
            if let Some(w) = &self.artifacts {
                w.record_mentions(&chunk.id, &reply)?;
            }
            if reply.get("State").is_some() {
                continue;
            }
            for record in mention_records(&reply) {
                let name = field_str(record, "name");
                if name.is_empty() {
                    continue;
                }
                mentions.insert(EntityMention::new(
                    name,
                    field_str(record, "type"),
                    field_str(record, "description"),
                    chunk.id.clone(),
                ));
            }
        }
        Ok(mentions)
    }

    /// Sequential per-entity subgraph extraction in mention insertion order,
    /// so first-writer-wins assembly is deterministic.
    async fn extract_subgraphs(
        &self,
        segmented: &SegmentedText,
        sentence_embeddings: &[Embedding],
        mentions: &MentionSet,
    ) -> Result<(Vec<EntitySubgraph>, usize, usize)> {
        let mut subgraphs = Vec::new();
        let mut degraded_entities = 0usize;
        let mut dropped_fragments = 0usize;

        let ids: Vec<MentionId> = mentions.ids();
        for id in ids {
            let Some(mention) = mentions.get(id) else { continue };
            let context = self
                .retrieval_context(segmented, sentence_embeddings, mention)
                .await?;
            let related_kg = related_kg_context(&subgraphs, mentions, mention);

            let raw = self
                .oracle
                .extract_subgraph(&context, &mention.name, &related_kg)
                .await;
            if raw.degraded {
                degraded_entities += 1;
            }

            let central = raw.central_entity.unwrap_or(Value::Null);
            let outcome = normalize_relationships(
                central.get("relationships").unwrap_or(&Value::Null),
            );
            dropped_fragments += outcome.dropped;

            let sub = EntitySubgraph {
                name: mention.name.clone(),
                entity_type: non_empty_or(field_str(&central, "type"), &mention.entity_type),
                description: non_empty_or(
                    field_str(&central, "description"),
                    &mention.description,
                ),
                attributes: normalize_attributes(
                    central.get("attributes").unwrap_or(&Value::Null),
                ),
                relations: outcome.records,
            };
            if let Some(w) = &self.artifacts {
                w.record_subgraph(&sub, raw.degraded, outcome.dropped)?;
            }
            subgraphs.push(sub);
        }

        Ok((subgraphs, degraded_entities, dropped_fragments))
    }

    /// Extraction context for one entity: its own source sentences plus the
    /// top-k sentences most similar to its name, first occurrence kept.
    async fn retrieval_context(
        &self,
        segmented: &SegmentedText,
        sentence_embeddings: &[Embedding],
        mention: &EntityMention,
    ) -> Result<String> {
        let mut sentences: Vec<&str> = Vec::new();
        for chunk_id in &mention.source_refs {
            match segmented.text_of(chunk_id) {
                Some(text) => sentences.push(text),
                None => warn!(chunk_id, entity = %mention.name, "source chunk missing, skipped"),
            }
        }

        if self.retrieval_top_k > 0 && !sentence_embeddings.is_empty() {
            let name_embedding = self.embedder.embed(&mention.name).await?;
            let mut scored: Vec<(usize, f32)> = sentence_embeddings
                .iter()
                .enumerate()
                .map(|(i, e)| (i, cosine_similarity(&name_embedding, e)))
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            for (i, _) in scored.into_iter().take(self.retrieval_top_k) {
                sentences.push(&segmented.chunks()[i].text);
            }
        }

        let mut deduped: Vec<&str> = Vec::new();
        for s in sentences {
            if !deduped.contains(&s) {
                deduped.push(s);
            }
        }
        Ok(deduped.join(", "))
    }
}

impl
    Pipeline<
        crate::oracle::LlmOracle<crate::llm_client::openai::OpenAiClient>,
        crate::embedder::openai::OpenAiEmbedder,
    >
{
    /// Wire the OpenAI-backed stack from configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        use crate::embedder::openai::OpenAiEmbedder;
        use crate::llm_client::openai::{CacheConfig, OpenAiClient};
        use crate::oracle::LlmOracle;

        let (extract_client, judge_client, embedder) = match &config.api_base {
            Some(base) => (
                OpenAiClient::with_base_url(
                    &config.openai_api_key,
                    &config.model_name,
                    base,
                    CacheConfig::default(),
                ),
                OpenAiClient::with_base_url(
                    &config.openai_api_key,
                    &config.judge_model_name,
                    base,
                    CacheConfig::default(),
                ),
                OpenAiEmbedder::with_base_url(
                    &config.openai_api_key,
                    &config.embedding_model,
                    config.embedding_dim,
                    base,
                ),
            ),
            None => (
                OpenAiClient::new(
                    &config.openai_api_key,
                    &config.model_name,
                    CacheConfig::default(),
                ),
                OpenAiClient::new(
                    &config.openai_api_key,
                    &config.judge_model_name,
                    CacheConfig::default(),
                ),
                OpenAiEmbedder::new(
                    &config.openai_api_key,
                    &config.embedding_model,
                    config.embedding_dim,
                ),
            ),
        };

        let pipeline = Pipeline::new(LlmOracle::new(extract_client, judge_client), embedder)
            .with_similarity_threshold(config.similarity_threshold)
            .with_retrieval_top_k(config.retrieval_top_k)
            .with_artifacts(ArtifactWriter::new(&config.artifact_dir)?);
        Ok(pipeline)
    }
}

/// Mention records out of an extraction reply: `entity1`, `entity2`, … read
/// in numeric order, then any stray object entries the numbering missed.
fn mention_records(reply: &Value) -> Vec<&Value> {
    let Some(map) = reply.as_object() else {
        return Vec::new();
    };
    let mut records = Vec::new();
    let mut consumed = Vec::new();
    let mut n = 1usize;
    while let Some(record) = map.get(&format!("entity{n}")) {
        if record.is_object() {
            records.push(record);
        }
        consumed.push(format!("entity{n}"));
        n += 1;
    }
    for (key, value) in map {
        if value.is_object() && !consumed.contains(key) {
            records.push(value);
        }
    }
    records
}

/// Already-extracted subgraphs for entities that share a source sentence with
/// `mention`, serialized as judgment context. `"none"` when there are none.
fn related_kg_context(
    subgraphs: &[EntitySubgraph],
    mentions: &MentionSet,
    mention: &EntityMention,
) -> String {
    let related: Vec<&EntitySubgraph> = subgraphs
        .iter()
        .filter(|sub| {
            mentions.iter().any(|(_, m)| {
                m.name == sub.name
                    && m.source_refs.intersection(&mention.source_refs).next().is_some()
            })
        })
        .collect();
    if related.is_empty() {
        return "none".to_string();
    }
    serde_json::to_string(&related).unwrap_or_else(|_| "none".to_string())
}

fn field_str(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mention_records_follow_numbering() {
        let reply = json!({
            "entity1": {"name": "A"},
            "entity2": {"name": "B"},
            "entity3": {"name": "C"},
        });
        let names: Vec<String> = mention_records(&reply)
            .iter()
            .map(|r| field_str(r, "name"))
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn mention_records_pick_up_stray_keys() {
        // Numbering gap: entity2 missing, but the record is still an object
        // under another key.
        let reply = json!({
            "entity1": {"name": "A"},
            "entity_extra": {"name": "B"},
        });
        let names: Vec<String> = mention_records(&reply)
            .iter()
            .map(|r| field_str(r, "name"))
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn mention_records_of_non_object_reply_are_empty() {
        assert!(mention_records(&json!([])).is_empty());
        assert!(mention_records(&json!("no entities")).is_empty());
    }

    #[test]
    fn non_empty_or_prefers_reply_value() {
        assert_eq!(non_empty_or("Drug".to_string(), "Thing"), "Drug");
        assert_eq!(non_empty_or(String::new(), "Thing"), "Thing");
    }
}
