//! Run artifacts: append-only JSONL records of each pipeline stage, plus the
//! final graph file.
//!
//! Every line carries the run id and an RFC 3339 timestamp so interleaved
//! runs against the same directory stay attributable.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::assembler::EntitySubgraph;
use crate::errors::Result;
use crate::graph::KnowledgeGraph;

const MENTIONS_FILE: &str = "mentions.jsonl";
const CANDIDATES_FILE: &str = "candidates.jsonl";
const MERGES_FILE: &str = "merges.jsonl";
const SUBGRAPHS_FILE: &str = "subgraphs.jsonl";
const GRAPH_FILE: &str = "graph.json";

/// Writes stage records for one pipeline run.
pub struct ArtifactWriter {
    dir: PathBuf,
    run_id: String,
}

impl ArtifactWriter {
    /// Create the artifact directory if needed and mint a fresh run id.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            run_id: Uuid::new_v4().to_string(),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn append(&self, file: &str, mut payload: serde_json::Value) -> Result<()> {
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("run_id".to_string(), json!(self.run_id));
            obj.insert("ts".to_string(), json!(Utc::now().to_rfc3339()));
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))?;
        writeln!(f, "{payload}")?;
        f.flush()?;
        Ok(())
    }

    /// Raw mention-extraction reply for one sentence.
    pub fn record_mentions(&self, chunk_id: &str, reply: &serde_json::Value) -> Result<()> {
        self.append(MENTIONS_FILE, json!({ "chunk_id": chunk_id, "reply": reply }))
    }

    /// One judged candidate pair.
    pub fn record_candidate(&self, a: &str, b: &str, score: f32, verdict: &str) -> Result<()> {
        self.append(
            CANDIDATES_FILE,
            json!({ "a": a, "b": b, "score": score, "verdict": verdict }),
        )
    }

    /// Absorbed-name → survivor-name map for one resolution pass.
    pub fn record_merges(
        &self,
        merged_names: &std::collections::BTreeMap<String, String>,
    ) -> Result<()> {
        self.append(MERGES_FILE, json!({ "merged": merged_names }))
    }

    /// One normalized per-entity subgraph, with degradation markers.
    pub fn record_subgraph(
        &self,
        sub: &EntitySubgraph,
        degraded: bool,
        dropped: usize,
    ) -> Result<()> {
        self.append(
            SUBGRAPHS_FILE,
            json!({ "subgraph": sub, "degraded": degraded, "dropped_fragments": dropped }),
        )
    }

    /// Write the assembled graph as pretty-printed JSON, returning its path.
    pub fn write_graph(&self, kg: &KnowledgeGraph) -> Result<PathBuf> {
        let path = self.dir.join(GRAPH_FILE);
        let mut f = File::create(&path)?;
        f.write_all(kg.to_json_pretty()?.as_bytes())?;
        Ok(path)
    }
}
