//! Tessera Graph — entity/relationship stores for the property graph.
//!
//! Every read the snapshot engine performs goes through the [`GraphStore`] /
//! [`StoreSession`] contract defined here. Two stores implement it: an
//! in-memory store used for fixtures and tests, and the Neo4j-backed
//! [`GraphClient`].

pub mod client;
pub mod error;
pub mod memory;
pub mod mutations;
pub mod queries;
pub mod store;

pub use client::GraphClient;
pub use error::GraphError;
pub use memory::{GraphFixture, MemoryStore};
pub use store::{
    EntityFilter, EntityPage, EntitySort, GraphStore, RelationshipFilter, SortDirection,
    SortField, StoreSession,
};
