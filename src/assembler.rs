//! Graph assembly: fold per-entity subgraph records into one output graph.
//!
//! Two passes keep registration deterministic: every central entity is
//! registered before any relationship target, so a target stub can never
//! shadow a real entity record that appears later in the batch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::graph::{
    GraphEntity, KnowledgeGraph, NormalizedAttribute, NormalizedRelation, RelationTuple,
};

/// One normalized per-entity extraction, ready for assembly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySubgraph {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub description: String,
    pub attributes: Vec<NormalizedAttribute>,
    pub relations: Vec<NormalizedRelation>,
}

/// First-seen-ordered entity registry.
#[derive(Debug, Default)]
struct Registry {
    entities: Vec<GraphEntity>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Register `name` if unseen; an existing entry is left untouched.
    /// Returns the entry index and whether this call created it.
    fn register(&mut self, name: &str, entity_type: &str, description: &str) -> (usize, bool) {
        if let Some(&i) = self.index.get(name) {
            return (i, false);
        }
        self.entities
            .push(GraphEntity::new(name, entity_type, description));
        self.index.insert(name.to_string(), self.entities.len() - 1);
        (self.entities.len() - 1, true)
    }
}

/// Assemble the output graph from per-entity subgraphs.
///
/// Pass 1 registers central entities: the first record with a given name wins
/// entirely — identity fields and attributes; a later duplicate-named record
/// contributes nothing. Within the winning record's own attribute list, a
/// repeated key keeps its last value. Pass 2 registers relationship targets
/// that are not already known and appends one relation tuple per record —
/// duplicates included, since repeated assertions are evidence, not noise.
/// Targets with empty names are skipped.
pub fn assemble(subgraphs: &[EntitySubgraph]) -> KnowledgeGraph {
    let mut registry = Registry::default();
    let mut relations: Vec<RelationTuple> = Vec::new();

    for sub in subgraphs {
        if sub.name.is_empty() {
            continue;
        }
        let (i, created) = registry.register(&sub.name, &sub.entity_type, &sub.description);
        if !created {
            continue;
        }
        for attr in &sub.attributes {
            if attr.key.is_empty() {
                continue;
            }
            registry.entities[i]
                .attributes
                .insert(attr.key.clone(), attr.value.clone());
        }
    }

    for sub in subgraphs {
        if sub.name.is_empty() {
            continue;
        }
        for rel in &sub.relations {
            if rel.target_name.is_empty() {
                continue;
            }
            registry.register(&rel.target_name, &rel.target_type, &rel.target_description);
            relations.push(RelationTuple::new(
                &sub.name,
                &rel.relation,
                &rel.target_name,
                &rel.relation_description,
            ));
        }
    }

    info!(
        entities = registry.entities.len(),
        relations = relations.len(),
        "graph assembled"
    );
    KnowledgeGraph {
        entities: registry.entities,
        relations,
    }
}
