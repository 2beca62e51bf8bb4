//! Request and response types for snapshot operations.

use serde::{Deserialize, Serialize};

use tessera_core::{EntityId, Metadata, RelationshipId};

/// Which part of the graph a snapshot covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    All,
    ByType,
    Neighborhood,
}

/// Request for a graph snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRequest {
    #[serde(default)]
    pub scope: Scope,
    /// Required for `by_type`.
    #[serde(default)]
    pub entity_type: Option<String>,
    /// Optional filter, applies to every scope.
    #[serde(default)]
    pub relationship_type: Option<String>,
    /// Required for `neighborhood`.
    #[serde(default)]
    pub root_id: Option<EntityId>,
    /// Neighborhood depth (default: 1).
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default = "default_include_metadata")]
    pub include_metadata: bool,
    /// Node budget. Falls back to the configured default.
    #[serde(default)]
    pub limit_nodes: Option<usize>,
    /// Edge budget. Falls back to the configured default.
    #[serde(default)]
    pub limit_edges: Option<usize>,
}

fn default_depth() -> u32 {
    1
}

fn default_include_metadata() -> bool {
    true
}

impl Default for SnapshotRequest {
    fn default() -> Self {
        Self {
            scope: Scope::All,
            entity_type: None,
            relationship_type: None,
            root_id: None,
            depth: default_depth(),
            include_metadata: default_include_metadata(),
            limit_nodes: None,
            limit_edges: None,
        }
    }
}

impl SnapshotRequest {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_type(entity_type: impl Into<String>) -> Self {
        Self {
            scope: Scope::ByType,
            entity_type: Some(entity_type.into()),
            ..Self::default()
        }
    }

    pub fn neighborhood(root_id: EntityId, depth: u32) -> Self {
        Self {
            scope: Scope::Neighborhood,
            root_id: Some(root_id),
            depth,
            ..Self::default()
        }
    }

    pub fn with_relationship_type(mut self, relationship_type: impl Into<String>) -> Self {
        self.relationship_type = Some(relationship_type.into());
        self
    }

    pub fn with_limits(mut self, limit_nodes: usize, limit_edges: usize) -> Self {
        self.limit_nodes = Some(limit_nodes);
        self.limit_edges = Some(limit_edges);
        self
    }

    pub fn without_metadata(mut self) -> Self {
        self.include_metadata = false;
        self
    }
}

/// A node in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// An edge in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeView {
    pub id: RelationshipId,
    pub source: EntityId,
    pub target: EntityId,
    #[serde(rename = "type")]
    pub edge_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Counts and completeness of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub node_count: usize,
    pub edge_count: usize,
    /// Set when a budget kept the snapshot from being the complete
    /// eligible subgraph. When set, an edge may reference a node that
    /// is absent from `nodes`.
    pub truncated: bool,
}

/// Complete result of a snapshot request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
    pub stats: SnapshotStats,
}
