//! tessera-snapshot: bounded, truncation-aware views of the Tessera graph.
//!
//! A [`SnapshotRequest`] is validated by the [`ScopeResolver`], fetched
//! through one request-scoped store session by the matching strategy
//! (a listing for `all`/`by_type`, a BFS for `neighborhood`), and projected
//! into a [`GraphSnapshot`]. Node and edge counts never exceed the request's
//! budgets; `stats.truncated` reports whether a budget cut the view short.

pub mod assemble;
pub mod budget;
pub mod error;
pub mod fetch;
pub mod scope;
pub mod traversal;
pub mod types;

pub use error::SnapshotError;
pub use scope::{ResolvedScope, ScopeResolver};
pub use types::{EdgeView, GraphSnapshot, NodeView, Scope, SnapshotRequest, SnapshotStats};

use std::time::{Duration, Instant};

use tessera_core::GraphSettings;
use tessera_graph::{EntityFilter, GraphStore, StoreSession};

use crate::budget::Budget;
use crate::fetch::Subgraph;
use crate::traversal::Traversal;

/// The snapshot engine. Holds no per-request state.
pub struct SnapshotEngine<S> {
    store: S,
    resolver: ScopeResolver,
    settings: GraphSettings,
}

impl<S: GraphStore> SnapshotEngine<S> {
    pub fn new(store: S, settings: GraphSettings) -> Self {
        Self {
            store,
            resolver: ScopeResolver::new(settings.clone()),
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Build a snapshot.
    ///
    /// Invalid requests fail before any store access. The store session is
    /// held for the duration of the fetch and released on every exit path;
    /// dropping the returned future abandons the request without issuing
    /// further queries.
    pub async fn snapshot(&self, request: SnapshotRequest) -> error::Result<GraphSnapshot> {
        let start = Instant::now();
        let (scope, budget) = self.resolver.resolve(&request)?;

        tracing::info!(
            scope = scope.name(),
            limit_nodes = budget.limit_nodes,
            limit_edges = budget.limit_edges,
            include_metadata = request.include_metadata,
            "Building graph snapshot"
        );

        let max_seconds = self.settings.request_timeout_secs;
        let subgraph = tokio::time::timeout(
            Duration::from_secs(max_seconds),
            self.fetch(&scope, budget),
        )
        .await
        .map_err(|_| SnapshotError::Timeout { max_seconds })??;

        let snapshot = assemble::assemble(subgraph, request.include_metadata);

        tracing::info!(
            scope = scope.name(),
            nodes = snapshot.stats.node_count,
            edges = snapshot.stats.edge_count,
            truncated = snapshot.stats.truncated,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Graph snapshot complete"
        );
        Ok(snapshot)
    }

    async fn fetch(&self, scope: &ResolvedScope, budget: Budget) -> error::Result<Subgraph> {
        let session = self.store.session().await?;
        run_scope(&session, scope, budget, self.settings.fetch_concurrency).await
    }
}

/// Dispatch a resolved scope to its fetcher.
pub async fn run_scope<T: StoreSession>(
    session: &T,
    scope: &ResolvedScope,
    budget: Budget,
    concurrency: usize,
) -> error::Result<Subgraph> {
    match scope {
        ResolvedScope::All { relationship_type } => {
            fetch::fetch_listed(
                session,
                &EntityFilter::all(),
                relationship_type.as_deref(),
                budget,
            )
            .await
        }
        ResolvedScope::ByType {
            entity_type,
            relationship_type,
        } => {
            fetch::fetch_listed(
                session,
                &EntityFilter::of_type(entity_type.as_str()),
                relationship_type.as_deref(),
                budget,
            )
            .await
        }
        ResolvedScope::Neighborhood {
            root_id,
            depth,
            relationship_type,
        } => {
            Traversal {
                root_id: *root_id,
                depth: *depth,
                relationship_type: relationship_type.as_deref(),
                budget,
                concurrency,
            }
            .run(session)
            .await
        }
    }
}
