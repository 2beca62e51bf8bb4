//! In-memory graph store.
//!
//! Backs fixtures, the CLI's `--fixture` mode, and the engine's tests. Applies
//! the same write rules as the Neo4j store: endpoints must exist, the
//! (source, target, type) triple is unique, self-relationships follow the
//! configured policy, and deleting an entity cascades to its relationships.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard};

use tessera_core::{Entity, EntityId, EntityPatch, MetadataMode, Relationship, RelationshipId};

use crate::error::GraphError;
use crate::store::{
    check_page_limit, EntityFilter, EntityPage, EntitySort, GraphStore, RelationshipFilter,
    StoreSession,
};

#[derive(Debug, Default)]
struct MemoryGraph {
    entities: BTreeMap<EntityId, Entity>,
    relationships: BTreeMap<RelationshipId, Relationship>,
    outgoing: HashMap<EntityId, BTreeSet<RelationshipId>>,
    incoming: HashMap<EntityId, BTreeSet<RelationshipId>>,
    keys: HashMap<(EntityId, EntityId, String), RelationshipId>,
}

impl MemoryGraph {
    fn remove_relationship(&mut self, id: &RelationshipId) -> Option<Relationship> {
        let rel = self.relationships.remove(id)?;
        if let Some(ids) = self.outgoing.get_mut(&rel.source_entity_id) {
            ids.remove(id);
        }
        if let Some(ids) = self.incoming.get_mut(&rel.target_entity_id) {
            ids.remove(id);
        }
        self.keys.remove(&owned_key(&rel));
        Some(rel)
    }

    fn indexed(
        &self,
        index: &HashMap<EntityId, BTreeSet<RelationshipId>>,
        id: &EntityId,
    ) -> Vec<&Relationship> {
        index
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|rid| self.relationships.get(rid))
            .collect()
    }
}

fn owned_key(rel: &Relationship) -> (EntityId, EntityId, String) {
    let (source, target, relationship_type) = rel.key();
    (source, target, relationship_type.to_string())
}

/// Read counters, for observing how many store round-trips a request made.
#[derive(Debug, Default)]
pub struct QueryCounters {
    entity_lookups: AtomicUsize,
    entity_listings: AtomicUsize,
    relationship_queries: AtomicUsize,
}

impl QueryCounters {
    pub fn entity_lookups(&self) -> usize {
        self.entity_lookups.load(Ordering::Relaxed)
    }

    pub fn entity_listings(&self) -> usize {
        self.entity_listings.load(Ordering::Relaxed)
    }

    pub fn relationship_queries(&self) -> usize {
        self.relationship_queries.load(Ordering::Relaxed)
    }
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    graph: RwLock<MemoryGraph>,
    counters: QueryCounters,
    allow_self_relationships: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow or forbid relationships whose source equals their target.
    pub fn with_self_relationships(mut self, allow: bool) -> Self {
        self.allow_self_relationships = allow;
        self
    }

    /// Build a store from a fixture, validating every record on the way in.
    pub async fn from_fixture(
        fixture: GraphFixture,
        allow_self_relationships: bool,
    ) -> Result<Self, GraphError> {
        let store = Self::new().with_self_relationships(allow_self_relationships);
        for entity in fixture.entities {
            store.create_entity(entity).await?;
        }
        for rel in fixture.relationships {
            store.create_relationship(rel).await?;
        }
        tracing::info!(
            entities = store.entity_count().await,
            relationships = store.relationship_count().await,
            "Loaded graph fixture"
        );
        Ok(store)
    }

    pub fn counters(&self) -> &QueryCounters {
        &self.counters
    }

    pub async fn entity_count(&self) -> usize {
        self.graph.read().await.entities.len()
    }

    pub async fn relationship_count(&self) -> usize {
        self.graph.read().await.relationships.len()
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Insert a new entity. Its id must not already exist.
    pub async fn create_entity(&self, entity: Entity) -> Result<Entity, GraphError> {
        let entity = entity.normalized()?;
        let mut graph = self.graph.write().await;
        if graph.entities.contains_key(&entity.id) {
            return Err(GraphError::Conflict(format!(
                "Entity with ID {} already exists",
                entity.id
            )));
        }
        graph.entities.insert(entity.id, entity.clone());
        Ok(entity)
    }

    /// Apply a partial update to an existing entity.
    pub async fn update_entity(
        &self,
        id: &EntityId,
        patch: EntityPatch,
        mode: MetadataMode,
    ) -> Result<Entity, GraphError> {
        let mut graph = self.graph.write().await;
        let current = graph
            .entities
            .get(id)
            .cloned()
            .ok_or_else(|| GraphError::entity_not_found(id))?;
        let updated = current.patched(patch, mode)?;
        graph.entities.insert(*id, updated.clone());
        Ok(updated)
    }

    /// Insert a new relationship between two existing entities.
    pub async fn create_relationship(&self, rel: Relationship) -> Result<Relationship, GraphError> {
        self.write_relationship(rel, false).await
    }

    /// Like [`create_relationship`](Self::create_relationship), but if the
    /// (source, target, type) triple already exists its metadata is replaced
    /// (when `rel` carries any) and the stored relationship is returned.
    pub async fn upsert_relationship(&self, rel: Relationship) -> Result<Relationship, GraphError> {
        self.write_relationship(rel, true).await
    }

    async fn write_relationship(
        &self,
        rel: Relationship,
        upsert: bool,
    ) -> Result<Relationship, GraphError> {
        let rel = rel.normalized()?;
        let mut graph = self.graph.write().await;

        for endpoint in [&rel.source_entity_id, &rel.target_entity_id] {
            if !graph.entities.contains_key(endpoint) {
                return Err(GraphError::entity_not_found(endpoint));
            }
        }
        if rel.is_self_relationship() && !self.allow_self_relationships {
            return Err(GraphError::SelfRelationship {
                entity_id: rel.source_entity_id,
            });
        }
        let key = owned_key(&rel);
        if let Some(existing_id) = graph.keys.get(&key).copied() {
            if !upsert {
                return Err(GraphError::Conflict(
                    "Relationship with the same source, target, and type already exists"
                        .to_string(),
                ));
            }
            let existing = graph
                .relationships
                .get_mut(&existing_id)
                .ok_or_else(|| GraphError::NotFound {
                    kind: "Relationship",
                    id: existing_id.to_string(),
                })?;
            if !rel.metadata.is_empty() {
                existing.metadata = rel.metadata;
                existing.updated_at = Utc::now().max(existing.updated_at);
            }
            return Ok(existing.clone());
        }
        if graph.relationships.contains_key(&rel.id) {
            return Err(GraphError::Conflict(format!(
                "Relationship with ID {} already exists",
                rel.id
            )));
        }
        graph.keys.insert(key, rel.id);

        graph
            .outgoing
            .entry(rel.source_entity_id)
            .or_default()
            .insert(rel.id);
        graph
            .incoming
            .entry(rel.target_entity_id)
            .or_default()
            .insert(rel.id);
        graph.relationships.insert(rel.id, rel.clone());
        Ok(rel)
    }

    /// One page of matching entities in `sort` order.
    pub async fn list_entities_page(
        &self,
        filter: &EntityFilter,
        sort: EntitySort,
        offset: usize,
        limit: usize,
    ) -> Result<EntityPage, GraphError> {
        check_page_limit(limit)?;
        let graph = self.graph.read().await;
        let mut matching: Vec<&Entity> = graph
            .entities
            .values()
            .filter(|e| filter.matches(e))
            .collect();
        matching.sort_by(|a, b| sort.compare(a, b));

        Ok(EntityPage {
            total: matching.len(),
            items: matching
                .into_iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
            limit,
            offset,
        })
    }

    pub async fn delete_relationship(&self, id: &RelationshipId) -> Result<(), GraphError> {
        let mut graph = self.graph.write().await;
        graph
            .remove_relationship(id)
            .map(|_| ())
            .ok_or_else(|| GraphError::NotFound {
                kind: "Relationship",
                id: id.to_string(),
            })
    }

    /// Delete an entity and every relationship touching it.
    /// Returns the number of relationships removed.
    pub async fn delete_entity(&self, id: &EntityId) -> Result<usize, GraphError> {
        let mut graph = self.graph.write().await;
        if graph.entities.remove(id).is_none() {
            return Err(GraphError::entity_not_found(id));
        }

        let mut incident = graph.outgoing.remove(id).unwrap_or_default();
        incident.extend(graph.incoming.remove(id).unwrap_or_default());
        for rid in &incident {
            graph.remove_relationship(rid);
        }

        tracing::debug!(entity_id = %id, cascaded = incident.len(), "Deleted entity");
        Ok(incident.len())
    }
}

impl GraphStore for MemoryStore {
    type Session<'a> = MemorySession<'a>;

    async fn session(&self) -> Result<MemorySession<'_>, GraphError> {
        Ok(MemorySession {
            graph: self.graph.read().await,
            counters: &self.counters,
        })
    }
}

/// A read session holding the store's read lock for the whole request.
pub struct MemorySession<'a> {
    graph: RwLockReadGuard<'a, MemoryGraph>,
    counters: &'a QueryCounters,
}

impl StoreSession for MemorySession<'_> {
    async fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>, GraphError> {
        self.counters.entity_lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.graph.entities.get(id).cloned())
    }

    async fn list_entities(
        &self,
        filter: &EntityFilter,
        limit: usize,
    ) -> Result<Vec<Entity>, GraphError> {
        self.counters.entity_listings.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .graph
            .entities
            .values()
            .filter(|e| filter.matches(e))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_relationships(
        &self,
        filter: &RelationshipFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Relationship>, GraphError> {
        self.counters
            .relationship_queries
            .fetch_add(1, Ordering::Relaxed);

        // Direction filters narrow the scan through the adjacency indexes.
        let candidates: Vec<&Relationship> = match (&filter.source, &filter.target) {
            (Some(source), _) => self.graph.indexed(&self.graph.outgoing, source),
            (None, Some(target)) => self.graph.indexed(&self.graph.incoming, target),
            (None, None) => self.graph.relationships.values().collect(),
        };

        Ok(candidates
            .into_iter()
            .filter(|r| filter.matches(r))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}

/// A serializable graph, used to seed a [`MemoryStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphFixture {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl GraphFixture {
    /// Read a fixture from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| GraphError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tessera_core::{Metadata, MetadataValue};

    async fn seeded() -> (MemoryStore, Vec<EntityId>) {
        let store = MemoryStore::new();
        let mut ids = Vec::new();
        for (t, n) in [("person", "Alice"), ("person", "Bob"), ("organization", "TechCorp")] {
            ids.push(store.create_entity(Entity::new(t, n)).await.unwrap().id);
        }
        store
            .create_relationship(Relationship::new(ids[0], ids[2], "works_for"))
            .await
            .unwrap();
        store
            .create_relationship(Relationship::new(ids[1], ids[2], "works_for"))
            .await
            .unwrap();
        store
            .create_relationship(Relationship::new(ids[1], ids[0], "manages"))
            .await
            .unwrap();
        (store, ids)
    }

    #[tokio::test]
    async fn test_list_entities_filters_and_limits() {
        let (store, _) = seeded().await;
        let session = store.session().await.unwrap();

        let people = session
            .list_entities(&EntityFilter::of_type("person"), 10)
            .await
            .unwrap();
        assert_eq!(people.len(), 2);
        assert!(people.iter().all(|e| e.entity_type == "person"));

        let one = session.list_entities(&EntityFilter::all(), 1).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(store.counters().entity_listings(), 2);
    }

    #[tokio::test]
    async fn test_listings_are_in_id_order() {
        let (store, _) = seeded().await;
        let session = store.session().await.unwrap();

        let entities = session.list_entities(&EntityFilter::all(), 10).await.unwrap();
        let ids: Vec<_> = entities.iter().map(|e| e.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);

        let rels = session
            .list_relationships(&RelationshipFilter::new(), None)
            .await
            .unwrap();
        let rids: Vec<_> = rels.iter().map(|r| r.id).collect();
        let mut sorted = rids.clone();
        sorted.sort();
        assert_eq!(rids, sorted);
    }

    #[tokio::test]
    async fn test_directional_relationship_queries() {
        let (store, ids) = seeded().await;
        let session = store.session().await.unwrap();

        let out_bob = session
            .list_relationships(&RelationshipFilter::new().outgoing_from(ids[1]), None)
            .await
            .unwrap();
        assert_eq!(out_bob.len(), 2);

        let into_corp = session
            .list_relationships(
                &RelationshipFilter::new()
                    .incoming_to(ids[2])
                    .with_type(Some("works_for")),
                None,
            )
            .await
            .unwrap();
        assert_eq!(into_corp.len(), 2);

        let into_alice_typed = session
            .list_relationships(
                &RelationshipFilter::new()
                    .incoming_to(ids[0])
                    .with_type(Some("works_for")),
                None,
            )
            .await
            .unwrap();
        assert!(into_alice_typed.is_empty());
        assert_eq!(store.counters().relationship_queries(), 3);
    }

    #[tokio::test]
    async fn test_relationship_requires_existing_endpoints() {
        let (store, ids) = seeded().await;
        let err = store
            .create_relationship(Relationship::new(ids[0], EntityId::new(), "knows"))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::NotFound { kind: "Entity", .. }));
    }

    #[tokio::test]
    async fn test_duplicate_triple_is_conflict() {
        let (store, ids) = seeded().await;
        let err = store
            .create_relationship(Relationship::new(ids[0], ids[2], "works_for"))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Conflict(_)));

        // Same endpoints, different type is fine.
        store
            .create_relationship(Relationship::new(ids[0], ids[2], "invests_in"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_self_relationship_policy() {
        let store = MemoryStore::new();
        let a = store.create_entity(Entity::new("person", "Alice")).await.unwrap().id;
        let err = store
            .create_relationship(Relationship::new(a, a, "knows"))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::SelfRelationship { .. }));

        let permissive = MemoryStore::new().with_self_relationships(true);
        let b = permissive.create_entity(Entity::new("person", "Bob")).await.unwrap().id;
        permissive
            .create_relationship(Relationship::new(b, b, "knows"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_entity_cascades() {
        let (store, ids) = seeded().await;
        let removed = store.delete_entity(&ids[1]).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.relationship_count().await, 1);
        assert_eq!(store.entity_count().await, 2);
        assert!(matches!(
            store.delete_entity(&ids[1]).await,
            Err(GraphError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_relationship_frees_triple() {
        let (store, ids) = seeded().await;
        let session = store.session().await.unwrap();
        let rel = session
            .list_relationships(&RelationshipFilter::new().outgoing_from(ids[0]), None)
            .await
            .unwrap()
            .remove(0);
        drop(session);

        store.delete_relationship(&rel.id).await.unwrap();
        store
            .create_relationship(Relationship::new(ids[0], ids[2], "works_for"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upsert_replaces_metadata_of_existing_triple() {
        let (store, ids) = seeded().await;
        let meta: Metadata = [("since", 2021_i64)].into_iter().collect();

        let upserted = store
            .upsert_relationship(Relationship::new(ids[0], ids[2], "works_for").with_metadata(meta))
            .await
            .unwrap();
        assert_eq!(upserted.metadata.get("since"), Some(&MetadataValue::from(2021_i64)));
        assert_eq!(store.relationship_count().await, 3);

        // Empty metadata leaves the stored relationship untouched.
        let again = store
            .upsert_relationship(Relationship::new(ids[0], ids[2], "works_for"))
            .await
            .unwrap();
        assert_eq!(again.id, upserted.id);
        assert_eq!(again.metadata.len(), 1);

        // A new triple is created as usual.
        store
            .upsert_relationship(Relationship::new(ids[2], ids[0], "employs"))
            .await
            .unwrap();
        assert_eq!(store.relationship_count().await, 4);
    }

    #[tokio::test]
    async fn test_upsert_still_enforces_endpoints() {
        let (store, ids) = seeded().await;
        let err = store
            .upsert_relationship(Relationship::new(ids[0], EntityId::new(), "knows"))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_entity() {
        let (store, ids) = seeded().await;
        let meta: Metadata = [("role", "developer"), ("team", "core")].into_iter().collect();
        store
            .update_entity(
                &ids[0],
                EntityPatch {
                    metadata: Some(meta),
                    ..EntityPatch::default()
                },
                MetadataMode::Replace,
            )
            .await
            .unwrap();

        let update: Metadata = [("role", "lead")].into_iter().collect();
        let merged = store
            .update_entity(
                &ids[0],
                EntityPatch {
                    name: Some("Alice Smith".to_string()),
                    metadata: Some(update),
                    ..EntityPatch::default()
                },
                MetadataMode::Merge,
            )
            .await
            .unwrap();
        assert_eq!(merged.name, "Alice Smith");
        assert_eq!(merged.metadata.len(), 2);
        assert_eq!(merged.metadata.get("role"), Some(&MetadataValue::from("lead")));

        let session = store.session().await.unwrap();
        let stored = session.get_entity(&ids[0]).await.unwrap().unwrap();
        assert_eq!(stored.name, "Alice Smith");
        drop(session);

        let missing = store
            .update_entity(&EntityId::new(), EntityPatch::default(), MetadataMode::Merge)
            .await
            .unwrap_err();
        assert!(matches!(missing, GraphError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_entities_page() {
        let (store, _) = seeded().await;
        let by_name = EntitySort::parse("name:asc");

        let first = store
            .list_entities_page(&EntityFilter::all(), by_name, 0, 2)
            .await
            .unwrap();
        assert_eq!(first.total, 3);
        let names: Vec<_> = first.items.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Alice", "Bob"]);

        let rest = store
            .list_entities_page(&EntityFilter::all(), by_name, 2, 2)
            .await
            .unwrap();
        assert_eq!(rest.items.len(), 1);
        assert_eq!(rest.items[0].name, "TechCorp");

        let people = store
            .list_entities_page(
                &EntityFilter::of_type("person"),
                EntitySort::parse("name:desc"),
                0,
                10,
            )
            .await
            .unwrap();
        assert_eq!(people.total, 2);
        assert_eq!(people.items[0].name, "Bob");

        let err = store
            .list_entities_page(&EntityFilter::all(), by_name, 0, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_blank_type_rejected() {
        let store = MemoryStore::new();
        let err = store.create_entity(Entity::new(" ", "Nobody")).await.unwrap_err();
        assert!(matches!(err, GraphError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_fixture_round_trip_from_file() {
        let a = Entity::new("person", "Alice");
        let b = Entity::new("person", "Bob");
        let fixture = GraphFixture {
            relationships: vec![Relationship::new(a.id, b.id, "knows")],
            entities: vec![a, b],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(serde_json::to_string(&fixture).unwrap().as_bytes())
            .unwrap();

        let loaded = GraphFixture::from_path(&path).unwrap();
        let store = MemoryStore::from_fixture(loaded, false).await.unwrap();
        assert_eq!(store.entity_count().await, 2);
        assert_eq!(store.relationship_count().await, 1);
    }
}
