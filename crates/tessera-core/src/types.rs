//! Core domain types for the Tessera property graph.
//!
//! Entities are the nodes and relationships are the directed, typed edges.
//! Both carry free-form string types and arbitrary JSON-like metadata.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

// ── Identifiers ───────────────────────────────────────────────────

/// Unique identifier for an entity (graph node).
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(transparent)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Unique identifier for a relationship (graph edge).
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(transparent)]
pub struct RelationshipId(pub Uuid);

impl RelationshipId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RelationshipId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RelationshipId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ── Metadata ──────────────────────────────────────────────────────

/// A single metadata value.
///
/// Untagged, so the wire form is plain JSON. Variant order matters for
/// deserialization: serde tries them top to bottom.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<MetadataValue>),
    Map(Metadata),
}

impl From<serde_json::Value> for MetadataValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Map(Metadata::from_json_map(map)),
        }
    }
}

impl From<MetadataValue> for serde_json::Value {
    fn from(value: MetadataValue) -> Self {
        match value {
            MetadataValue::Null => Self::Null,
            MetadataValue::Bool(b) => Self::Bool(b),
            MetadataValue::Number(n) => Self::Number(n),
            MetadataValue::String(s) => Self::String(s),
            MetadataValue::List(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            MetadataValue::Map(meta) => meta.into(),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

/// Key-ordered metadata map attached to entities and relationships.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Metadata(pub BTreeMap<String, MetadataValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlay `other` onto this map; keys in `other` win.
    pub fn merge(&mut self, other: Metadata) {
        self.0.extend(other.0);
    }

    fn from_json_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(
            map.into_iter()
                .map(|(k, v)| (k, MetadataValue::from(v)))
                .collect(),
        )
    }
}

impl TryFrom<serde_json::Value> for Metadata {
    type Error = CoreError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(map) => Ok(Self::from_json_map(map)),
            other => Err(CoreError::Validation(format!(
                "metadata must be a JSON object, got {other}"
            ))),
        }
    }
}

impl From<Metadata> for serde_json::Value {
    fn from(meta: Metadata) -> Self {
        Self::Object(
            meta.0
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::from(v)))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<MetadataValue>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// ── Entities & Relationships ──────────────────────────────────────

/// A typed, named node in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            entity_type: entity_type.into(),
            name: name.into(),
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Trim `type` and `name`, rejecting blanks.
    pub fn normalized(mut self) -> Result<Self, CoreError> {
        self.entity_type = non_blank("entity type", &self.entity_type)?;
        self.name = non_blank("entity name", &self.name)?;
        Ok(self)
    }
}

/// How an update treats existing metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataMode {
    /// Keep existing keys, overwrite those present in the update.
    Merge,
    /// Discard existing metadata.
    #[default]
    Replace,
}

impl std::str::FromStr for MetadataMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(Self::Merge),
            "replace" => Ok(Self::Replace),
            other => Err(CoreError::Validation(format!(
                "metadata mode must be 'merge' or 'replace', got {other:?}"
            ))),
        }
    }
}

/// Partial update of an entity. Unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityPatch {
    #[serde(default, rename = "type")]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl EntityPatch {
    pub fn is_empty(&self) -> bool {
        self.entity_type.is_none() && self.name.is_none() && self.metadata.is_none()
    }
}

impl Entity {
    /// Apply `patch`, validate the result and bump `updated_at`.
    pub fn patched(mut self, patch: EntityPatch, mode: MetadataMode) -> Result<Self, CoreError> {
        if let Some(entity_type) = patch.entity_type {
            self.entity_type = entity_type;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(metadata) = patch.metadata {
            match mode {
                MetadataMode::Merge => self.metadata.merge(metadata),
                MetadataMode::Replace => self.metadata = metadata,
            }
        }
        self.updated_at = Utc::now().max(self.updated_at);
        self.normalized()
    }
}

/// A typed, directed edge between two entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub source_entity_id: EntityId,
    pub target_entity_id: EntityId,
    #[serde(rename = "type")]
    pub relationship_type: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Relationship {
    pub fn new(
        source_entity_id: EntityId,
        target_entity_id: EntityId,
        relationship_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RelationshipId::new(),
            source_entity_id,
            target_entity_id,
            relationship_type: relationship_type.into(),
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_self_relationship(&self) -> bool {
        self.source_entity_id == self.target_entity_id
    }

    /// The endpoint opposite `from`. For a self-relationship this is `from` itself.
    pub fn other_endpoint(&self, from: &EntityId) -> EntityId {
        if self.source_entity_id == *from {
            self.target_entity_id
        } else {
            self.source_entity_id
        }
    }

    /// The (source, target, type) triple that must be unique across the store.
    pub fn key(&self) -> (EntityId, EntityId, &str) {
        (
            self.source_entity_id,
            self.target_entity_id,
            self.relationship_type.as_str(),
        )
    }

    /// Trim `type`, rejecting blanks.
    pub fn normalized(mut self) -> Result<Self, CoreError> {
        self.relationship_type = non_blank("relationship type", &self.relationship_type)?;
        Ok(self)
    }
}

fn non_blank(field: &str, value: &str) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}
