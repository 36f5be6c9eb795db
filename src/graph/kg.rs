//! Raw extraction records and the canonical output knowledge graph.

use std::collections::BTreeMap;

use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::utils::text::sanitize_quotes;

/// A per-entity subgraph extraction reply, shape untrusted.
///
/// `central_entity` is kept as a raw JSON value; the record normalizer is the
/// only component that interprets its `attributes`/`relationships` fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSubgraph {
    pub central_entity: Option<serde_json::Value>,
    /// True when this record is a retry-exhaustion fallback rather than a
    /// genuine (possibly empty) extraction.
    pub degraded: bool,
}

impl RawSubgraph {
    /// Empty record: the entity contributes nothing to the graph.
    pub fn empty(degraded: bool) -> Self {
        Self {
            central_entity: None,
            degraded,
        }
    }

    /// Interpret an oracle reply. Anything without an object-valued
    /// `central_entity` key is treated as empty.
    pub fn from_reply(value: serde_json::Value) -> Self {
        let central_entity = match value.get("central_entity") {
            Some(ce) if ce.is_object() => Some(ce.clone()),
            _ => None,
        };
        Self {
            central_entity,
            degraded: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.central_entity.is_none()
    }
}

/// A canonical attribute after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedAttribute {
    pub key: String,
    pub value: String,
}

/// A canonical relationship record after normalization. All fields default to
/// empty when the raw fragment did not carry them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedRelation {
    pub relation: String,
    pub target_name: String,
    pub target_type: String,
    pub target_description: String,
    pub relation_description: String,
}

/// One entity entry in the output graph registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub description: String,
    pub attributes: BTreeMap<String, String>,
}

impl GraphEntity {
    pub fn new(
        name: impl Into<String>,
        entity_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            description: description.into(),
            attributes: BTreeMap::new(),
        }
    }
}

/// The canonical 4-element relation tuple: source, relation, target,
/// relation description. Serializes as a JSON array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationTuple {
    pub source: String,
    pub relation: String,
    pub target: String,
    pub description: String,
}

impl RelationTuple {
    pub fn new(
        source: impl Into<String>,
        relation: impl Into<String>,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            relation: relation.into(),
            target: target.into(),
            description: description.into(),
        }
    }
}

impl Serialize for RelationTuple {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(4))?;
        seq.serialize_element(&self.source)?;
        seq.serialize_element(&self.relation)?;
        seq.serialize_element(&self.target)?;
        seq.serialize_element(&self.description)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for RelationTuple {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TupleVisitor;

        impl<'de> Visitor<'de> for TupleVisitor {
            type Value = RelationTuple;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a [source, relation, target, description] array")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let source = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(0, &self))?;
                let relation = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(1, &self))?;
                let target = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(2, &self))?;
                let description = seq.next_element()?.unwrap_or_default();
                Ok(RelationTuple {
                    source,
                    relation,
                    target,
                    description,
                })
            }
        }

        deserializer.deserialize_seq(TupleVisitor)
    }
}

/// The assembled output graph for one batch.
///
/// `entities` preserves first-seen registry order; `relations` preserves
/// append order and permits duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub entities: Vec<GraphEntity>,
    pub relations: Vec<RelationTuple>,
}

impl KnowledgeGraph {
    /// Serialize to a JSON value with apostrophe-style quotes in string
    /// values rewritten to standard double quotes.
    pub fn to_sanitized_value(&self) -> crate::Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)?;
        sanitize_quotes(&mut value);
        Ok(value)
    }

    /// Pretty-printed sanitized JSON. Non-Latin scripts are emitted as-is.
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        let value = self.to_sanitized_value()?;
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_subgraph_from_reply_extracts_central_entity() {
        let sub = RawSubgraph::from_reply(json!({
            "central_entity": {"name": "NSAID", "type": "Drug"}
        }));
        assert!(!sub.is_empty());
        assert_eq!(sub.central_entity.unwrap()["name"], "NSAID");
    }

    #[test]
    fn raw_subgraph_from_non_object_reply_is_empty() {
        assert!(RawSubgraph::from_reply(json!({"central_entity": "NSAID"})).is_empty());
        assert!(RawSubgraph::from_reply(json!({"State": "no entities"})).is_empty());
        assert!(RawSubgraph::from_reply(json!([])).is_empty());
    }

    #[test]
    fn relation_tuple_serializes_as_array() {
        let t = RelationTuple::new("A", "Located In", "B", "");
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v, json!(["A", "Located In", "B", ""]));
    }

    #[test]
    fn relation_tuple_deserializes_from_array() {
        let t: RelationTuple =
            serde_json::from_value(json!(["A", "Part Of", "Body", "anatomy"])).unwrap();
        assert_eq!(t.source, "A");
        assert_eq!(t.relation, "Part Of");
        assert_eq!(t.target, "Body");
        assert_eq!(t.description, "anatomy");
    }

    #[test]
    fn graph_serializes_with_type_key_and_preserves_scripts() {
        let mut entity = GraphEntity::new("河南商报", "媒体机构", "报纸");
        entity
            .attributes
            .insert("创办时间".to_string(), "1985".to_string());
        let kg = KnowledgeGraph {
            entities: vec![entity],
            relations: vec![RelationTuple::new("河南商报", "位于", "河南", "")],
        };

        let pretty = kg.to_json_pretty().unwrap();
        assert!(pretty.contains("河南商报"));
        assert!(pretty.contains(r#""type": "媒体机构""#));
    }

    #[test]
    fn graph_output_sanitizes_single_quotes() {
        let kg = KnowledgeGraph {
            entities: vec![GraphEntity::new("O'Brien", "Person", "Miles O'Brien")],
            relations: vec![],
        };
        let value = kg.to_sanitized_value().unwrap();
        assert_eq!(value["entities"][0]["name"], "O\"Brien");
        assert_eq!(value["entities"][0]["description"], "Miles O\"Brien");
    }
}
