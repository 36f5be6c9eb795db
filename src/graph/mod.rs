//! Core data model: entity mentions, raw extraction records, and the output
//! knowledge graph.

pub mod kg;
pub mod mention;

pub use kg::{GraphEntity, KnowledgeGraph, NormalizedAttribute, NormalizedRelation, RawSubgraph, RelationTuple};
pub use mention::{EntityMention, MentionId, MentionSet, DESCRIPTION_SEPARATOR};
