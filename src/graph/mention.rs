//! EntityMention — a raw, as-extracted reference to a named entity, and the
//! batch-scoped arena that owns all mentions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Separator token joining merged descriptions and source references.
pub const DESCRIPTION_SEPARATOR: &str = ";;;";

/// Batch-local mention identifier: the position at which the mention was
/// inserted into its [`MentionSet`]. Stable across merges.
pub type MentionId = usize;

/// A raw entity mention extracted from one sentence, prior to resolution.
///
/// After resolution, the surviving mention of each cluster doubles as the
/// resolved entity: first-seen name and type, merged description, and the
/// union of source references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMention {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub description: String,
    /// Chunk ids of the sentences this mention (or its absorbed duplicates)
    /// came from.
    pub source_refs: BTreeSet<String>,
}

impl EntityMention {
    pub fn new(
        name: impl Into<String>,
        entity_type: impl Into<String>,
        description: impl Into<String>,
        chunk_id: impl Into<String>,
    ) -> Self {
        let mut source_refs = BTreeSet::new();
        source_refs.insert(chunk_id.into());
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            description: description.into(),
            source_refs,
        }
    }

    /// Text the similarity index embeds for this mention.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.name, self.entity_type)
    }
}

/// Arena of mentions for one batch.
///
/// Ids are positional and never reused; merged-away mentions leave an empty
/// slot so surviving ids stay stable. Iteration follows insertion order,
/// which is what makes survivor selection and assembly deterministic.
#[derive(Debug, Default, Clone)]
pub struct MentionSet {
    slots: Vec<Option<EntityMention>>,
}

impl MentionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mention, returning its batch-local id.
    pub fn insert(&mut self, mention: EntityMention) -> MentionId {
        self.slots.push(Some(mention));
        self.slots.len() - 1
    }

    /// Number of ids ever issued (live or merged away).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live mentions.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: MentionId) -> Option<&EntityMention> {
        self.slots.get(id).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: MentionId) -> Option<&mut EntityMention> {
        self.slots.get_mut(id).and_then(|s| s.as_mut())
    }

    /// Remove a mention (after it has been absorbed into a survivor).
    pub fn remove(&mut self, id: MentionId) -> Option<EntityMention> {
        self.slots.get_mut(id).and_then(|s| s.take())
    }

    /// Live (id, mention) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (MentionId, &EntityMention)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|m| (id, m)))
    }

    /// Live ids in insertion order.
    pub fn ids(&self) -> Vec<MentionId> {
        self.iter().map(|(id, _)| id).collect()
    }
}
