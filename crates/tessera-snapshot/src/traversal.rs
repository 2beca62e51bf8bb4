//! Neighborhood traversal.
//!
//! Level-synchronous BFS from a root entity over an undirected view of the
//! stored (directed) relationships. For every frontier node the outgoing and
//! incoming relationships are fetched as two separate queries; fetches for
//! one level run concurrently, but their results are merged one node at a
//! time, in frontier order, outgoing before incoming. Budget checks happen
//! only in that merge.
//!
//! Admission is "first N encountered" in merge order:
//!
//! - an unseen relationship is kept while the edge budget has room,
//!   otherwise the snapshot is marked truncated and scanning continues;
//! - the far endpoint of a kept relationship is visited once; it is added
//!   and expanded on the next level while the node budget has room,
//!   otherwise the snapshot is marked truncated and the node is dropped.
//!
//! A kept edge can therefore point at a dropped node. `truncated` is the
//! signal that `nodes` and `edges` are not mutually exhaustive.

use std::collections::HashSet;

use futures::stream::{self, StreamExt, TryStreamExt};

use tessera_core::{EntityId, Relationship, RelationshipId};
use tessera_graph::{RelationshipFilter, StoreSession};

use crate::budget::Budget;
use crate::error::{Result, SnapshotError};
use crate::fetch::Subgraph;

/// Parameters of one neighborhood traversal.
#[derive(Debug, Clone, Copy)]
pub struct Traversal<'a> {
    pub root_id: EntityId,
    pub depth: u32,
    pub relationship_type: Option<&'a str>,
    pub budget: Budget,
    /// Frontier nodes whose relationships are fetched at the same time.
    pub concurrency: usize,
}

impl Traversal<'_> {
    /// Run the traversal. Fails with `NotFound` after a single lookup if
    /// the root does not exist.
    pub async fn run<S: StoreSession>(&self, session: &S) -> Result<Subgraph> {
        let root = session
            .get_entity(&self.root_id)
            .await?
            .ok_or(SnapshotError::NotFound {
                entity_id: self.root_id,
            })?;

        let budget = self.budget;
        let mut visited: HashSet<EntityId> = HashSet::from([self.root_id]);
        let mut seen_edges: HashSet<RelationshipId> = HashSet::new();
        let mut nodes = vec![root];
        let mut edges: Vec<Relationship> = Vec::new();
        let mut truncated = false;
        let mut frontier = vec![self.root_id];

        for level in 1..=self.depth {
            if frontier.is_empty() {
                break;
            }
            if budget.saturated(nodes.len(), edges.len()) {
                truncated = true;
                break;
            }

            let incident = self.fetch_incident(session, &frontier).await?;
            let mut next_frontier = Vec::new();

            for (current, (outgoing, incoming)) in frontier.iter().zip(incident) {
                // A full fetch means this node alone has more eligible
                // relationships than the whole edge budget.
                if outgoing.len() > budget.limit_edges || incoming.len() > budget.limit_edges {
                    truncated = true;
                }

                for rel in outgoing.into_iter().chain(incoming) {
                    if seen_edges.contains(&rel.id) {
                        continue;
                    }
                    if !budget.edge_room(edges.len()) {
                        truncated = true;
                        continue;
                    }
                    seen_edges.insert(rel.id);
                    let other = rel.other_endpoint(current);
                    edges.push(rel);

                    if !visited.insert(other) {
                        continue;
                    }
                    if !budget.node_room(nodes.len()) {
                        truncated = true;
                        continue;
                    }
                    match session.get_entity(&other).await? {
                        Some(entity) => {
                            nodes.push(entity);
                            next_frontier.push(other);
                        }
                        None => {
                            tracing::warn!(
                                entity_id = %other,
                                "Relationship endpoint missing from store"
                            );
                        }
                    }
                }
            }

            tracing::debug!(
                level,
                nodes = nodes.len(),
                edges = edges.len(),
                next_frontier = next_frontier.len(),
                truncated,
                "Expanded neighborhood level"
            );
            frontier = next_frontier;
        }

        Ok(Subgraph {
            nodes,
            edges,
            truncated,
        })
    }

    /// Outgoing and incoming relationships of every frontier node, in
    /// frontier order.
    async fn fetch_incident<S: StoreSession>(
        &self,
        session: &S,
        frontier: &[EntityId],
    ) -> Result<Vec<(Vec<Relationship>, Vec<Relationship>)>> {
        let relationship_type = self.relationship_type;
        let fetch_limit = Some(self.budget.edge_fetch_limit());

        let incident = stream::iter(frontier.iter().copied())
            .map(|id| async move {
                let outgoing = RelationshipFilter::new()
                    .outgoing_from(id)
                    .with_type(relationship_type);
                let incoming = RelationshipFilter::new()
                    .incoming_to(id)
                    .with_type(relationship_type);
                futures::try_join!(
                    session.list_relationships(&outgoing, fetch_limit),
                    session.list_relationships(&incoming, fetch_limit),
                )
            })
            .buffered(self.concurrency.max(1))
            .try_collect::<Vec<_>>()
            .await?;

        Ok(incident)
    }
}
