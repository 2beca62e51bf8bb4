//! Read operations against Neo4j.

use chrono::{DateTime, Utc};
use neo4rs::{query, Query};
use uuid::Uuid;

use tessera_core::{Entity, EntityId, Metadata, Relationship, RelationshipId};

use crate::client::{GraphClient, Neo4jSession};
use crate::error::GraphError;
use crate::store::{
    check_page_limit, EntityFilter, EntityPage, EntitySort, RelationshipFilter, SortDirection,
    StoreSession,
};

impl GraphClient {
    // ── Single Lookups ───────────────────────────────────────────

    /// Get an entity by id.
    pub async fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>, GraphError> {
        let q = query(
            "MATCH (n:Entity {id: $id})
             RETURN n",
        )
        .param("id", id.to_string());

        self.query_one(q).await?.as_ref().map(row_to_entity).transpose()
    }

    // ── List Queries ─────────────────────────────────────────────

    /// List entities in id order.
    pub async fn list_entities(
        &self,
        filter: &EntityFilter,
        limit: usize,
    ) -> Result<Vec<Entity>, GraphError> {
        let where_clause = entity_where(filter);
        let cypher = format!(
            "MATCH (n:Entity)
             {where_clause}
             RETURN n
             ORDER BY n.id
             LIMIT $limit"
        );

        let q = bind_entity_filter(query(&cypher), filter).param("limit", clamp_limit(limit));
        let rows = self.query_rows(q).await?;
        rows.iter().map(row_to_entity).collect()
    }

    /// One page of matching entities in `sort` order, plus the total match count.
    pub async fn list_entities_page(
        &self,
        filter: &EntityFilter,
        sort: EntitySort,
        offset: usize,
        limit: usize,
    ) -> Result<EntityPage, GraphError> {
        check_page_limit(limit)?;
        let where_clause = entity_where(filter);
        let property = sort.field.property();
        let direction = match sort.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };

        let cypher = format!(
            "MATCH (n:Entity)
             {where_clause}
             RETURN n
             ORDER BY n.{property} {direction}, n.id
             SKIP $offset
             LIMIT $limit"
        );
        let q = bind_entity_filter(query(&cypher), filter)
            .param("offset", clamp_limit(offset))
            .param("limit", clamp_limit(limit));
        let rows = self.query_rows(q).await?;
        let items = rows.iter().map(row_to_entity).collect::<Result<Vec<_>, _>>()?;

        let count_cypher = format!(
            "MATCH (n:Entity)
             {where_clause}
             RETURN count(n) AS total"
        );
        let total = match self
            .query_one(bind_entity_filter(query(&count_cypher), filter))
            .await?
        {
            Some(row) => row.get::<i64>("total").map_err(|e| {
                GraphError::Serialization(format!("Failed to get total: {e}"))
            })?,
            None => 0,
        };

        Ok(EntityPage {
            items,
            total: usize::try_from(total).unwrap_or(0),
            limit,
            offset,
        })
    }

    /// List relationships in id order.
    pub async fn list_relationships(
        &self,
        filter: &RelationshipFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Relationship>, GraphError> {
        let mut conditions = Vec::new();
        if filter.relationship_type.is_some() {
            conditions.push("r.type = $type");
        }
        if filter.source_in.is_some() {
            conditions.push("a.id IN $source_in");
        }
        if filter.target_in.is_some() {
            conditions.push("b.id IN $target_in");
        }
        if filter.source.is_some() {
            conditions.push("a.id = $source");
        }
        if filter.target.is_some() {
            conditions.push("b.id = $target");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let limit_clause = if limit.is_some() { "LIMIT $limit" } else { "" };

        let cypher = format!(
            "MATCH (a:Entity)-[r:RELATED_TO]->(b:Entity)
             {where_clause}
             RETURN r, a.id AS source_id, b.id AS target_id
             ORDER BY r.id
             {limit_clause}"
        );

        let mut q = query(&cypher);
        if let Some(t) = &filter.relationship_type {
            q = q.param("type", t.clone());
        }
        if let Some(ids) = &filter.source_in {
            q = q.param("source_in", id_strings(ids));
        }
        if let Some(ids) = &filter.target_in {
            q = q.param("target_in", id_strings(ids));
        }
        if let Some(id) = &filter.source {
            q = q.param("source", id.to_string());
        }
        if let Some(id) = &filter.target {
            q = q.param("target", id.to_string());
        }
        if let Some(limit) = limit {
            q = q.param("limit", clamp_limit(limit));
        }

        let rows = self.query_rows(q).await?;
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let rel: neo4rs::Relation = required(row.get("r"), "relation")?;
            let source_id: String = required(row.get("source_id"), "source_id")?;
            let target_id: String = required(row.get("target_id"), "target_id")?;
            results.push(relation_to_relationship(&rel, &source_id, &target_id)?);
        }
        Ok(results)
    }
}

impl StoreSession for Neo4jSession<'_> {
    async fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>, GraphError> {
        self.client.get_entity(id).await
    }

    async fn list_entities(
        &self,
        filter: &EntityFilter,
        limit: usize,
    ) -> Result<Vec<Entity>, GraphError> {
        self.client.list_entities(filter, limit).await
    }

    async fn list_relationships(
        &self,
        filter: &RelationshipFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Relationship>, GraphError> {
        self.client.list_relationships(filter, limit).await
    }
}

// ── Filters ──────────────────────────────────────────────────────

fn entity_where(filter: &EntityFilter) -> String {
    let mut conditions = Vec::new();
    if filter.entity_type.is_some() {
        conditions.push("n.type = $type");
    }
    if filter.name.is_some() {
        conditions.push("n.name = $name");
    }
    if filter.name_contains.is_some() {
        conditions.push("toLower(n.name) CONTAINS toLower($name_contains)");
    }
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

fn bind_entity_filter(mut q: Query, filter: &EntityFilter) -> Query {
    if let Some(t) = &filter.entity_type {
        q = q.param("type", t.clone());
    }
    if let Some(name) = &filter.name {
        q = q.param("name", name.clone());
    }
    if let Some(fragment) = &filter.name_contains {
        q = q.param("name_contains", fragment.clone());
    }
    q
}

// ── Row Conversion ───────────────────────────────────────────────

/// Read column `n` of a row as an [`Entity`].
fn row_to_entity(row: &neo4rs::Row) -> Result<Entity, GraphError> {
    let node: neo4rs::Node = row
        .get("n")
        .map_err(|e| GraphError::Serialization(format!("Failed to deserialize entity: {e}")))?;
    node_to_entity(&node)
}

/// Convert a neo4rs::Node labelled `Entity` into an [`Entity`].
fn node_to_entity(node: &neo4rs::Node) -> Result<Entity, GraphError> {
    let id: String = required(node.get("id"), "entity id")?;
    Ok(Entity {
        id: EntityId(parse_uuid(&id)?),
        entity_type: required(node.get("type"), "entity type")?,
        name: required(node.get("name"), "entity name")?,
        metadata: parse_metadata(node.get::<String>("metadata").ok())?,
        created_at: parse_timestamp(node.get::<String>("created_at").ok()),
        updated_at: parse_timestamp(node.get::<String>("updated_at").ok()),
    })
}

/// Convert a `RELATED_TO` relation plus its endpoint ids into a [`Relationship`].
pub(crate) fn relation_to_relationship(
    rel: &neo4rs::Relation,
    source_id: &str,
    target_id: &str,
) -> Result<Relationship, GraphError> {
    let id: String = required(rel.get("id"), "relationship id")?;
    Ok(Relationship {
        id: RelationshipId(parse_uuid(&id)?),
        source_entity_id: EntityId(parse_uuid(source_id)?),
        target_entity_id: EntityId(parse_uuid(target_id)?),
        relationship_type: required(rel.get("type"), "relationship type")?,
        metadata: parse_metadata(rel.get::<String>("metadata").ok())?,
        created_at: parse_timestamp(rel.get::<String>("created_at").ok()),
        updated_at: parse_timestamp(rel.get::<String>("updated_at").ok()),
    })
}

/// A column or property every stored record carries.
pub(crate) fn required<T, E: std::fmt::Display>(
    value: Result<T, E>,
    what: &str,
) -> Result<T, GraphError> {
    value.map_err(|e| GraphError::Serialization(format!("Failed to get {what}: {e}")))
}

fn parse_uuid(raw: &str) -> Result<Uuid, GraphError> {
    Uuid::parse_str(raw)
        .map_err(|e| GraphError::Serialization(format!("Invalid id {raw:?}: {e}")))
}

/// Metadata is persisted as a JSON object string; absent means empty.
fn parse_metadata(raw: Option<String>) -> Result<Metadata, GraphError> {
    match raw.as_deref() {
        None | Some("") => Ok(Metadata::new()),
        Some(json) => serde_json::from_str(json)
            .map_err(|e| GraphError::Serialization(format!("Invalid metadata: {e}"))),
    }
}

fn parse_timestamp(raw: Option<String>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn id_strings(ids: &std::collections::HashSet<EntityId>) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

fn clamp_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
