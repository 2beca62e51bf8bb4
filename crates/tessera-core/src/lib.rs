//! tessera-core: Shared data model, configuration, and error handling for Tessera.
//!
//! This crate provides the foundational types used across all Tessera components:
//! - Entities (typed, named nodes) and relationships (typed, directed edges)
//! - Ordered, JSON-like metadata attached to both
//! - Configuration loading for graph limits and the Neo4j connection
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{GraphSettings, Neo4jSettings, TesseraConfig};
pub use error::CoreError;
pub use types::{
    Entity, EntityId, EntityPatch, Metadata, MetadataMode, MetadataValue, Relationship,
    RelationshipId,
};
