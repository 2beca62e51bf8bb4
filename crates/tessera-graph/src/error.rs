//! Errors from graph store operations.

use tessera_core::{CoreError, EntityId};

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Self-relationships are not allowed by configuration (entity {entity_id})")]
    SelfRelationship { entity_id: EntityId },

    #[error("Invalid record: {0}")]
    Invalid(#[from] CoreError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    pub fn entity_not_found(id: &EntityId) -> Self {
        Self::NotFound {
            kind: "Entity",
            id: id.to_string(),
        }
    }
}
