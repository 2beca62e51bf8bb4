//! Listing fetchers for the `all` and `by_type` scopes.

use std::collections::HashSet;

use tessera_core::{Entity, EntityId, Relationship};
use tessera_graph::{EntityFilter, RelationshipFilter, StoreSession};

use crate::budget::{cap, Budget};
use crate::error::Result;

/// Entities and relationships selected for a snapshot, before projection.
#[derive(Debug, Clone, Default)]
pub struct Subgraph {
    pub nodes: Vec<Entity>,
    pub edges: Vec<Relationship>,
    pub truncated: bool,
}

/// Fetch up to `budget.limit_nodes` entities matching `filter`, then the
/// relationships with both endpoints among them.
pub async fn fetch_listed<S: StoreSession>(
    session: &S,
    filter: &EntityFilter,
    relationship_type: Option<&str>,
    budget: Budget,
) -> Result<Subgraph> {
    let mut nodes = session.list_entities(filter, budget.node_fetch_limit()).await?;
    let nodes_truncated = cap(&mut nodes, budget.limit_nodes);

    if nodes.is_empty() {
        return Ok(Subgraph {
            truncated: nodes_truncated,
            ..Subgraph::default()
        });
    }

    let ids: HashSet<EntityId> = nodes.iter().map(|e| e.id).collect();
    let rel_filter = RelationshipFilter::new()
        .within(&ids)
        .with_type(relationship_type);
    let mut edges = session
        .list_relationships(&rel_filter, Some(budget.edge_fetch_limit()))
        .await?;
    let edges_truncated = cap(&mut edges, budget.limit_edges);

    tracing::debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        nodes_truncated,
        edges_truncated,
        "Fetched listed subgraph"
    );

    Ok(Subgraph {
        nodes,
        edges,
        truncated: nodes_truncated || edges_truncated,
    })
}
