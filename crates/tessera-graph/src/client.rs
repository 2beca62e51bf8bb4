//! Neo4j connection management and the shared graph client.

use std::time::Instant;

use neo4rs::{ConfigBuilder, Graph, Query};
use tessera_core::Neo4jSettings;

use crate::error::GraphError;
use crate::store::GraphStore;

/// Thread-safe Neo4j graph client with connection pooling.
///
/// Entities are stored as `(:Entity)` nodes and relationships as
/// `[:RELATED_TO]` edges carrying their free-form type in a `type` property.
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
    allow_self_relationships: bool,
}

impl GraphClient {
    /// Connect to Neo4j with the given settings.
    pub async fn connect(settings: &Neo4jSettings) -> Result<Self, GraphError> {
        let neo_config = ConfigBuilder::default()
            .uri(&settings.uri)
            .user(&settings.user)
            .password(&settings.password)
            .max_connections(settings.max_connections as usize)
            .fetch_size(settings.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %settings.uri, "Connected to Neo4j");
        Ok(Self {
            graph,
            allow_self_relationships: false,
        })
    }

    /// Allow or forbid relationships whose source equals their target.
    pub fn with_self_relationships(mut self, allow: bool) -> Self {
        self.allow_self_relationships = allow;
        self
    }

    pub(crate) fn allows_self_relationships(&self) -> bool {
        self.allow_self_relationships
    }

    /// Execute a write-only query (CREATE, MERGE, DELETE, SET).
    pub async fn run(&self, query: Query) -> Result<(), GraphError> {
        self.graph.run(query).await?;
        Ok(())
    }

    /// Execute a read query and collect all rows.
    pub async fn query_rows(&self, query: Query) -> Result<Vec<neo4rs::Row>, GraphError> {
        let mut stream = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a read query and return the first row, if any.
    pub async fn query_one(&self, query: Query) -> Result<Option<neo4rs::Row>, GraphError> {
        let mut stream = self.graph.execute(query).await?;
        Ok(stream.next().await?)
    }
}

impl GraphStore for GraphClient {
    type Session<'a> = Neo4jSession<'a>;

    async fn session(&self) -> Result<Neo4jSession<'_>, GraphError> {
        tracing::trace!("Opened Neo4j session");
        Ok(Neo4jSession {
            client: self,
            opened_at: Instant::now(),
        })
    }
}

/// A request-scoped view of the client.
///
/// neo4rs checks a pooled connection out per query and returns it when the
/// row stream is drained or dropped, so the session itself holds no
/// connection; it bounds the request's reads and logs their lifetime.
pub struct Neo4jSession<'a> {
    pub(crate) client: &'a GraphClient,
    opened_at: Instant,
}

impl Drop for Neo4jSession<'_> {
    fn drop(&mut self) {
        tracing::trace!(
            elapsed_ms = self.opened_at.elapsed().as_millis() as u64,
            "Released Neo4j session"
        );
    }
}
