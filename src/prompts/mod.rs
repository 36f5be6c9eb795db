//! Prompt templates for LLM interactions.
//!
//! Prompts are stored as Rust string literals (not external files) for
//! compile-time inclusion and zero-cost access. Each builder fills the
//! template with the call-specific inputs.

/// Prompt for per-sentence named-entity extraction.
///
/// The model is asked for a JSON object keyed `entity1`, `entity2`, … with
/// `name`/`type`/`description` per entry. Replies are not trusted to match
/// this shape.
pub fn mention_extraction(text: &str) -> String {
    format!(
        r#"Output must be valid JSON.
You are a named entity recognition assistant. Extract every named entity from the text below.
Text: {text}
Requirements:
1. Extract all entities mentioned in the text: people, organizations, places, concepts, products, diseases, drugs, and any other named things.
2. For each entity provide its name, a short type label, and a one-sentence description grounded in the text.
3. The output format must be:
{{
  "entity1": {{"name": "", "type": "", "description": ""}},
  "entity2": {{"name": "", "type": "", "description": ""}}
}}
with one entry per entity, numbered consecutively from entity1."#
    )
}

/// Prompt for the same-entity judgment call.
///
/// The model answers `{{"result": true}}` or `{{"result": false}}`; some
/// models emit Python-style `{{'result': True}}`, which the oracle parses
/// tolerantly.
pub fn judge_same_entity(entity1: &str, entity2: &str) -> String {
    format!(
        r#"Output must be valid JSON.
You are a knowledge graph entity disambiguation assistant responsible for determining whether two entities are essentially the same real-world entity.
Entity 1: {entity1}
Entity 2: {entity2}
Notes:
1. Judge first from the names and types whether the two entities could be the same; if they could, analyze the descriptions in detail to decide.
2. Plural forms and spelling variants of one name denote the same entity.
3. Output {{"result": true}} if they are the same entity, {{"result": false}} otherwise."#
    )
}

/// Prompt for entity-centric subgraph extraction.
///
/// The requested shape is `central_entity` with `attributes` (key/value list)
/// and `relationships` (relation/target records). Replies frequently deviate
/// from this shape; the record normalizer handles the deviations.
pub fn subgraph_extraction(text: &str, target_entity: &str, related_kg: &str) -> String {
    format!(
        r#"Output must be valid JSON.
You are a knowledge graph extraction assistant, responsible for extracting attributes and relationships related to a specified entity from the text, in combination with other relevant knowledge graphs.
Text: {text}
Target Entity: {target_entity}
Related Knowledge Graphs: {related_kg}
Requirements:
1. Integrate the entire text to comprehensively extract relationships related to the specified entity and build a sub-graph for it.
2. Extract both attributes of the specified entity and relationships between the specified entity and other entities.
   - Attributes describe characteristics of the specified entity, e.g. in "Michael Jordan - Gender: Male", gender is an attribute.
   - For relationships, the head entity must be the specified entity: "Specified Entity - Owns - Other Entity" is valid, "Other Entity - Is Owned By - Specified Entity" is not.
3. Decide per piece of information whether it is a relationship or an attribute.
4. Use the related knowledge graphs to understand the entity more fully and to establish reverse relationships where appropriate.
5. Remove duplicate attributes and duplicate relationships, keeping one instance of each.
6. The output format must be:
{{
  "central_entity": {{
    "name": "",
    "type": "",
    "description": "",
    "attributes": [
      {{"key": "", "value": ""}}
    ],
    "relationships": [
      {{"relation": "", "target_name": "", "target_type": "", "target_description": "", "relation_description": ""}}
    ]
  }}
}}"#
    )
}
