//! Projection of a fetched subgraph into the snapshot view.

use tessera_core::{Entity, Relationship};

use crate::fetch::Subgraph;
use crate::types::{EdgeView, GraphSnapshot, NodeView, SnapshotStats};

/// Render `subgraph`. With `include_metadata` off the metadata field is
/// left out of every node and edge rather than emptied.
pub fn assemble(subgraph: Subgraph, include_metadata: bool) -> GraphSnapshot {
    let nodes: Vec<NodeView> = subgraph
        .nodes
        .into_iter()
        .map(|e| node_view(e, include_metadata))
        .collect();
    let edges: Vec<EdgeView> = subgraph
        .edges
        .into_iter()
        .map(|r| edge_view(r, include_metadata))
        .collect();

    GraphSnapshot {
        stats: SnapshotStats {
            node_count: nodes.len(),
            edge_count: edges.len(),
            truncated: subgraph.truncated,
        },
        nodes,
        edges,
    }
}

fn node_view(entity: Entity, include_metadata: bool) -> NodeView {
    NodeView {
        id: entity.id,
        node_type: entity.entity_type,
        name: entity.name,
        metadata: include_metadata.then_some(entity.metadata),
    }
}

fn edge_view(rel: Relationship, include_metadata: bool) -> EdgeView {
    EdgeView {
        id: rel.id,
        source: rel.source_entity_id,
        target: rel.target_entity_id,
        edge_type: rel.relationship_type,
        metadata: include_metadata.then_some(rel.metadata),
    }
}
