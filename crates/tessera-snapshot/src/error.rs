//! Error types for the tessera-snapshot crate.

use tessera_core::EntityId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Invalid snapshot request: {0}")]
    InvalidRequest(String),

    #[error("Root entity not found: {entity_id}")]
    NotFound { entity_id: EntityId },

    #[error("Store error: {0}")]
    Store(#[from] tessera_graph::GraphError),

    #[error("Snapshot timeout: exceeded {max_seconds}s limit")]
    Timeout { max_seconds: u64 },
}

impl SnapshotError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}

pub type Result<T> = std::result::Result<T, SnapshotError>;
