//! Write operations for the Neo4j store.
//!
//! Validation mirrors the in-memory store: blank types and names are
//! rejected, relationship endpoints must exist, the (source, target, type)
//! triple is unique unless upserting, and deleting an entity detaches its
//! relationships.

use chrono::Utc;
use neo4rs::query;

use tessera_core::{Entity, EntityId, EntityPatch, MetadataMode, Relationship, RelationshipId};

use crate::client::GraphClient;
use crate::error::GraphError;
use crate::queries::{relation_to_relationship, required};

impl GraphClient {
    // ── Schema ───────────────────────────────────────────────────

    /// Create the uniqueness constraints and lookup indexes the store relies on.
    pub async fn ensure_schema(&self) -> Result<(), GraphError> {
        for statement in [
            "CREATE CONSTRAINT entity_id IF NOT EXISTS FOR (n:Entity) REQUIRE n.id IS UNIQUE",
            "CREATE INDEX entity_type IF NOT EXISTS FOR (n:Entity) ON (n.type)",
            "CREATE INDEX related_to_id IF NOT EXISTS FOR ()-[r:RELATED_TO]-() ON (r.id)",
            "CREATE INDEX related_to_type IF NOT EXISTS FOR ()-[r:RELATED_TO]-() ON (r.type)",
        ] {
            self.run(query(statement)).await?;
        }
        tracing::info!("Ensured Neo4j schema");
        Ok(())
    }

    // ── Entities ─────────────────────────────────────────────────

    /// Create an entity. Its id must not already exist.
    pub async fn create_entity(&self, entity: Entity) -> Result<Entity, GraphError> {
        let entity = entity.normalized()?;
        if self.get_entity(&entity.id).await?.is_some() {
            return Err(GraphError::Conflict(format!(
                "Entity with ID {} already exists",
                entity.id
            )));
        }

        let q = query(
            "CREATE (n:Entity {
               id: $id, type: $type, name: $name, metadata: $metadata,
               created_at: $created_at, updated_at: $updated_at
             })",
        )
        .param("id", entity.id.to_string())
        .param("type", entity.entity_type.clone())
        .param("name", entity.name.clone())
        .param("metadata", metadata_json(&entity.metadata)?)
        .param("created_at", entity.created_at.to_rfc3339())
        .param("updated_at", entity.updated_at.to_rfc3339());

        self.run(q).await?;
        Ok(entity)
    }

    /// Apply a partial update to an existing entity.
    pub async fn update_entity(
        &self,
        id: &EntityId,
        patch: EntityPatch,
        mode: MetadataMode,
    ) -> Result<Entity, GraphError> {
        let current = self
            .get_entity(id)
            .await?
            .ok_or_else(|| GraphError::entity_not_found(id))?;
        let updated = current.patched(patch, mode)?;

        let q = query(
            "MATCH (n:Entity {id: $id})
             SET n.type = $type, n.name = $name, n.metadata = $metadata,
                 n.updated_at = $updated_at
             RETURN n.id AS id",
        )
        .param("id", id.to_string())
        .param("type", updated.entity_type.clone())
        .param("name", updated.name.clone())
        .param("metadata", metadata_json(&updated.metadata)?)
        .param("updated_at", updated.updated_at.to_rfc3339());

        match self.query_one(q).await? {
            Some(_) => Ok(updated),
            None => Err(GraphError::entity_not_found(id)),
        }
    }

    /// Delete an entity and every relationship touching it.
    /// Returns the number of relationships removed.
    pub async fn delete_entity(&self, id: &EntityId) -> Result<usize, GraphError> {
        let q = query(
            "MATCH (n:Entity {id: $id})
             OPTIONAL MATCH (n)-[r:RELATED_TO]-()
             WITH n, count(DISTINCT r) AS rels
             DETACH DELETE n
             RETURN rels",
        )
        .param("id", id.to_string());

        match self.query_one(q).await? {
            Some(row) => {
                let rels = row.get::<i64>("rels").unwrap_or(0);
                tracing::debug!(entity_id = %id, cascaded = rels, "Deleted entity");
                Ok(usize::try_from(rels).unwrap_or(0))
            }
            None => Err(GraphError::entity_not_found(id)),
        }
    }

    // ── Relationships ────────────────────────────────────────────

    /// Create a relationship between two existing entities.
    pub async fn create_relationship(&self, rel: Relationship) -> Result<Relationship, GraphError> {
        self.write_relationship(rel, false).await
    }

    /// Like [`create_relationship`](Self::create_relationship), but if the
    /// (source, target, type) triple already exists its metadata is replaced
    /// (when `rel` carries any) and the stored relationship is returned.
    pub async fn upsert_relationship(&self, rel: Relationship) -> Result<Relationship, GraphError> {
        self.write_relationship(rel, true).await
    }

    /// The MERGE keys on (source, target, type); if it matched an existing
    /// edge the returned id differs from ours. Without `upsert` that is a
    /// conflict and the ON MATCH branch leaves the edge untouched.
    async fn write_relationship(
        &self,
        rel: Relationship,
        upsert: bool,
    ) -> Result<Relationship, GraphError> {
        let rel = rel.normalized()?;
        for endpoint in [&rel.source_entity_id, &rel.target_entity_id] {
            if self.get_entity(endpoint).await?.is_none() {
                return Err(GraphError::entity_not_found(endpoint));
            }
        }
        if rel.is_self_relationship() && !self.allows_self_relationships() {
            return Err(GraphError::SelfRelationship {
                entity_id: rel.source_entity_id,
            });
        }

        let q = query(
            "MATCH (a:Entity {id: $source_id})
             MATCH (b:Entity {id: $target_id})
             MERGE (a)-[r:RELATED_TO {type: $type}]->(b)
             ON CREATE SET
               r.id = $id, r.metadata = $metadata,
               r.created_at = $created_at, r.updated_at = $updated_at
             ON MATCH SET
               r.metadata = CASE WHEN $replace THEN $metadata ELSE r.metadata END,
               r.updated_at = CASE WHEN $replace THEN $updated_at ELSE r.updated_at END
             RETURN r, a.id AS source_id, b.id AS target_id",
        )
        .param("source_id", rel.source_entity_id.to_string())
        .param("target_id", rel.target_entity_id.to_string())
        .param("type", rel.relationship_type.clone())
        .param("id", rel.id.to_string())
        .param("metadata", metadata_json(&rel.metadata)?)
        .param("replace", upsert && !rel.metadata.is_empty())
        .param("created_at", rel.created_at.to_rfc3339())
        .param("updated_at", Utc::now().to_rfc3339());

        let row = match self.query_one(q).await? {
            Some(row) => row,
            // An endpoint vanished between the existence check and the write.
            None => return Err(GraphError::entity_not_found(&rel.source_entity_id)),
        };
        let relation: neo4rs::Relation = required(row.get("r"), "relation")?;
        let source_id: String = required(row.get("source_id"), "source_id")?;
        let target_id: String = required(row.get("target_id"), "target_id")?;
        let stored = relation_to_relationship(&relation, &source_id, &target_id)?;

        if stored.id != rel.id && !upsert {
            return Err(GraphError::Conflict(
                "Relationship with the same source, target, and type already exists".to_string(),
            ));
        }
        Ok(stored)
    }

    pub async fn delete_relationship(&self, id: &RelationshipId) -> Result<(), GraphError> {
        let q = query(
            "MATCH ()-[r:RELATED_TO {id: $id}]->()
             DELETE r
             RETURN count(r) AS cnt",
        )
        .param("id", id.to_string());

        let deleted = match self.query_one(q).await? {
            Some(row) => row.get::<i64>("cnt").unwrap_or(0),
            None => 0,
        };
        if deleted == 0 {
            return Err(GraphError::NotFound {
                kind: "Relationship",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

fn metadata_json(metadata: &tessera_core::Metadata) -> Result<String, GraphError> {
    serde_json::to_string(metadata).map_err(|e| GraphError::Serialization(e.to_string()))
}
