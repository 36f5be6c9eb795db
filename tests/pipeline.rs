//! End-to-end pipeline tests over scripted oracle and embedder fakes.

use std::collections::HashMap;

use serde_json::{json, Value};

use textkg::embedder::{EmbedderClient, Embedding};
use textkg::errors::Result;
use textkg::graph::{EntityMention, RawSubgraph};
use textkg::oracle::{ExtractionOracle, Verdict};
use textkg::pipeline::Pipeline;

/// Scripted oracle: mention replies keyed by sentence text, same-verdicts by
/// name pair, subgraph replies keyed by target name.
#[derive(Default)]
struct ScriptedOracle {
    mentions: HashMap<String, Value>,
    same: Vec<(String, String)>,
    subgraphs: HashMap<String, Value>,
    degraded: Vec<String>,
}

impl ScriptedOracle {
    fn mentions_for(mut self, sentence: &str, reply: Value) -> Self {
        self.mentions.insert(sentence.to_string(), reply);
        self
    }

    fn same_entity(mut self, a: &str, b: &str) -> Self {
        self.same.push((a.to_string(), b.to_string()));
        self
    }

    fn subgraph_for(mut self, target: &str, reply: Value) -> Self {
        self.subgraphs.insert(target.to_string(), reply);
        self
    }

    fn degraded_for(mut self, target: &str) -> Self {
        self.degraded.push(target.to_string());
        self
    }
}

impl ExtractionOracle for ScriptedOracle {
    async fn extract_mentions(&self, sentence: &str) -> Value {
        self.mentions
            .get(sentence)
            .cloned()
            .unwrap_or_else(|| json!({"State": "no entities"}))
    }

    async fn judge_same(&self, a: &EntityMention, b: &EntityMention) -> Verdict {
        let hit = self.same.iter().any(|(x, y)| {
            (x == &a.name && y == &b.name) || (x == &b.name && y == &a.name)
        });
        if hit {
            Verdict::Same
        } else {
            Verdict::Different
        }
    }

    async fn extract_subgraph(&self, _context: &str, target: &str, _related_kg: &str) -> RawSubgraph {
        if self.degraded.iter().any(|t| t == target) {
            return RawSubgraph::empty(true);
        }
        match self.subgraphs.get(target) {
            Some(reply) => RawSubgraph::from_reply(reply.clone()),
            None => RawSubgraph::empty(false),
        }
    }
}

/// Embeds known texts to fixed vectors; everything else gets a shared
/// fallback direction.
struct ScriptedEmbedder {
    vectors: HashMap<String, Embedding>,
}

impl ScriptedEmbedder {
    fn new(entries: &[(&str, [f32; 3])]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_vec()))
                .collect(),
        }
    }
}

impl EmbedderClient for ScriptedEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![0.0, 0.0, 1.0]))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed(t).await?);
        }
        Ok(out)
    }

    fn dim(&self) -> usize {
        3
    }
}

const SENTENCE_1: &str = "NSAIDs reduce fever.";
const SENTENCE_2: &str = "NSAID is a class of drug.";

fn merge_scenario_oracle() -> ScriptedOracle {
    ScriptedOracle::default()
        .mentions_for(
            SENTENCE_1,
            json!({
                "entity1": {"name": "NSAIDs", "type": "Drug", "description": "pain relievers"},
                "entity2": {"name": "Fever", "type": "Symptom", "description": "high temperature"},
            }),
        )
        .mentions_for(
            SENTENCE_2,
            json!({
                "entity1": {"name": "NSAID", "type": "Drug", "description": "drug class"},
            }),
        )
        .same_entity("NSAIDs", "NSAID")
        .subgraph_for(
            "NSAIDs",
            json!({
                "central_entity": {
                    "name": "NSAIDs",
                    "type": "Drug",
                    "description": "anti-inflammatory drugs",
                    "attributes": [{"key": "Class", "value": "Anti-inflammatory"}],
                    "relationships": [
                        {"relation": "Treats", "target_name": "Fever", "target_type": "Symptom"},
                    ],
                }
            }),
        )
        .subgraph_for(
            "Fever",
            json!({
                "central_entity": {
                    "name": "Fever",
                    "type": "Symptom",
                    "relationships": ["none"],
                }
            }),
        )
}

fn merge_scenario_embedder() -> ScriptedEmbedder {
    ScriptedEmbedder::new(&[
        ("NSAIDs Drug", [1.0, 0.0, 0.0]),
        ("NSAID Drug", [0.95, 0.05, 0.0]),
        ("Fever Symptom", [0.0, 1.0, 0.0]),
    ])
}

#[tokio::test]
async fn duplicate_mentions_merge_end_to_end() {
    let pipeline = Pipeline::new(merge_scenario_oracle(), merge_scenario_embedder());
    let report = pipeline
        .process_batch("medicine", &format!("{SENTENCE_1} {SENTENCE_2}"))
        .await
        .unwrap();

    assert_eq!(report.sentences, 2);
    assert_eq!(report.mentions, 3);
    assert_eq!(report.resolution.confirmed, 1);
    assert_eq!(report.resolution.merged, 1);
    assert_eq!(
        report.resolution.merged_names.get("NSAID").unwrap(),
        "NSAIDs"
    );

    // First-inserted mention survives under its own name.
    let names: Vec<&str> = report.graph.entities.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["NSAIDs", "Fever"]);

    let nsaids = &report.graph.entities[0];
    assert_eq!(nsaids.entity_type, "Drug");
    assert_eq!(nsaids.description, "anti-inflammatory drugs");
    assert_eq!(nsaids.attributes.get("Class").unwrap(), "Anti-inflammatory");

    assert_eq!(report.graph.relations.len(), 1);
    let rel = &report.graph.relations[0];
    assert_eq!(rel.source, "NSAIDs");
    assert_eq!(rel.relation, "Treats");
    assert_eq!(rel.target, "Fever");
}

#[tokio::test]
async fn every_relation_endpoint_is_registered() {
    let pipeline = Pipeline::new(merge_scenario_oracle(), merge_scenario_embedder());
    let report = pipeline
        .process_batch("medicine", &format!("{SENTENCE_1} {SENTENCE_2}"))
        .await
        .unwrap();

    let names: Vec<&str> = report.graph.entities.iter().map(|e| e.name.as_str()).collect();
    for rel in &report.graph.relations {
        assert!(names.contains(&rel.source.as_str()));
        assert!(names.contains(&rel.target.as_str()));
    }
}

#[tokio::test]
async fn repeated_runs_are_deterministic() {
    let once = Pipeline::new(merge_scenario_oracle(), merge_scenario_embedder())
        .process_batch("medicine", &format!("{SENTENCE_1} {SENTENCE_2}"))
        .await
        .unwrap();
    let twice = Pipeline::new(merge_scenario_oracle(), merge_scenario_embedder())
        .process_batch("medicine", &format!("{SENTENCE_1} {SENTENCE_2}"))
        .await
        .unwrap();

    assert_eq!(once.graph, twice.graph);
    assert_eq!(once.graph.to_json_pretty().unwrap(), twice.graph.to_json_pretty().unwrap());
}

#[tokio::test]
async fn degraded_extraction_keeps_the_entity() {
    let oracle = ScriptedOracle::default()
        .mentions_for(
            SENTENCE_1,
            json!({"entity1": {"name": "NSAIDs", "type": "Drug", "description": "pain relievers"}}),
        )
        .degraded_for("NSAIDs");
    let pipeline = Pipeline::new(oracle, merge_scenario_embedder());

    let report = pipeline.process_batch("medicine", SENTENCE_1).await.unwrap();

    assert_eq!(report.degraded_entities, 1);
    // The resolved entity still appears, with its mention-level fields.
    assert_eq!(report.graph.entities.len(), 1);
    assert_eq!(report.graph.entities[0].name, "NSAIDs");
    assert_eq!(report.graph.entities[0].description, "pain relievers");
    assert!(report.graph.relations.is_empty());
}

#[tokio::test]
async fn unparseable_relationship_fragments_are_counted_not_fatal() {
    let oracle = ScriptedOracle::default()
        .mentions_for(
            SENTENCE_1,
            json!({"entity1": {"name": "NSAIDs", "type": "Drug", "description": ""}}),
        )
        .subgraph_for(
            "NSAIDs",
            json!({
                "central_entity": {
                    "name": "NSAIDs",
                    "type": "Drug",
                    "relationships": ["note: no structured relations here", "NSAIDs - Treats - Fever"],
                }
            }),
        );
    let pipeline = Pipeline::new(oracle, merge_scenario_embedder());

    let report = pipeline.process_batch("medicine", SENTENCE_1).await.unwrap();

    assert_eq!(report.graph.relations.len(), 1);
    assert_eq!(report.graph.relations[0].relation, "Treats");
    assert_eq!(report.dropped_fragments, 1);
}

#[tokio::test]
async fn state_replies_contribute_no_mentions() {
    let oracle = ScriptedOracle::default(); // every sentence gets a State reply
    let pipeline = Pipeline::new(oracle, merge_scenario_embedder());

    let report = pipeline
        .process_batch("medicine", "Nothing nameable here. Still nothing.")
        .await
        .unwrap();

    assert_eq!(report.sentences, 2);
    assert_eq!(report.mentions, 0);
    assert!(report.graph.entities.is_empty());
}

#[tokio::test]
async fn empty_input_yields_empty_graph() {
    let pipeline = Pipeline::new(ScriptedOracle::default(), merge_scenario_embedder());
    let report = pipeline.process_batch("medicine", "   ").await.unwrap();
    assert_eq!(report.sentences, 0);
    assert!(report.graph.entities.is_empty());
    assert!(report.graph.relations.is_empty());
}

#[tokio::test]
async fn artifacts_are_written_along_the_way() {
    use textkg::artifacts::ArtifactWriter;

    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(merge_scenario_oracle(), merge_scenario_embedder())
        .with_artifacts(ArtifactWriter::new(dir.path()).unwrap());

    pipeline
        .process_batch("medicine", &format!("{SENTENCE_1} {SENTENCE_2}"))
        .await
        .unwrap();

    let mention_lines = std::fs::read_to_string(dir.path().join("mentions.jsonl")).unwrap();
    assert_eq!(mention_lines.lines().count(), 2);

    let graph: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("graph.json")).unwrap())
            .unwrap();
    assert_eq!(graph["entities"][0]["name"], "NSAIDs");

    let candidates = std::fs::read_to_string(dir.path().join("candidates.jsonl")).unwrap();
    let first: Value = serde_json::from_str(candidates.lines().next().unwrap()).unwrap();
    assert_eq!(first["verdict"], "same");
}
