//! The read contract every graph store offers to the snapshot engine.
//!
//! A request acquires one [`StoreSession`] from a [`GraphStore`] and performs
//! all of its reads through it. The session is released when it is dropped,
//! which covers success, early error returns, and cancellation (dropping the
//! in-flight future) alike.
//!
//! Listing results come back in ascending id order so repeated requests
//! against an unchanged store see the same "first N" records.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tessera_core::{Entity, EntityId, Relationship};

use crate::error::GraphError;

/// A store that hands out request-scoped read sessions.
pub trait GraphStore: Send + Sync {
    type Session<'a>: StoreSession + 'a
    where
        Self: 'a;

    /// Acquire a session for one request.
    fn session(&self) -> impl Future<Output = Result<Self::Session<'_>, GraphError>> + Send;
}

/// Read operations available within a session.
pub trait StoreSession: Send + Sync {
    /// Point lookup by id.
    fn get_entity(
        &self,
        id: &EntityId,
    ) -> impl Future<Output = Result<Option<Entity>, GraphError>> + Send;

    /// Entities matching `filter`, at most `limit` of them.
    fn list_entities(
        &self,
        filter: &EntityFilter,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Entity>, GraphError>> + Send;

    /// Relationships matching `filter`, at most `limit` of them when set.
    fn list_relationships(
        &self,
        filter: &RelationshipFilter,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<Vec<Relationship>, GraphError>> + Send;
}

/// Filter for entity listings. All set conditions must hold.
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub entity_type: Option<String>,
    /// Exact name.
    pub name: Option<String>,
    /// Case-insensitive substring of the name.
    pub name_contains: Option<String>,
}

impl EntityFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of_type(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: Some(entity_type.into()),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name_containing(mut self, fragment: impl Into<String>) -> Self {
        self.name_contains = Some(fragment.into());
        self
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        if let Some(t) = &self.entity_type {
            if entity.entity_type != *t {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if entity.name != *name {
                return false;
            }
        }
        if let Some(fragment) = &self.name_contains {
            if !entity
                .name
                .to_lowercase()
                .contains(&fragment.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

// ── Paged Listing ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Name,
    Type,
}

impl SortField {
    /// Property name on the stored node.
    pub fn property(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Name => "name",
            Self::Type => "type",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Ordering for paged entity listings. Ties break on id, ascending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl EntitySort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Parse `field[:asc|desc]`, e.g. `name:asc`. The direction defaults to
    /// descending; anything unrecognised falls back to `created_at:desc`.
    pub fn parse(raw: &str) -> Self {
        let (field, direction) = raw.split_once(':').unwrap_or((raw, "desc"));
        let field = match field {
            "created_at" => SortField::CreatedAt,
            "updated_at" => SortField::UpdatedAt,
            "name" => SortField::Name,
            "type" => SortField::Type,
            _ => return Self::default(),
        };
        let direction = match direction {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            _ => return Self::default(),
        };
        Self { field, direction }
    }

    pub fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        let by_field = match self.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::Name => a.name.cmp(&b.name),
            SortField::Type => a.entity_type.cmp(&b.entity_type),
        };
        let by_field = match self.direction {
            SortDirection::Asc => by_field,
            SortDirection::Desc => by_field.reverse(),
        };
        by_field.then_with(|| a.id.cmp(&b.id))
    }
}

/// Largest page a listing may request.
pub const MAX_PAGE_LIMIT: usize = 1000;

pub(crate) fn check_page_limit(limit: usize) -> Result<(), GraphError> {
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(GraphError::Invalid(tessera_core::CoreError::Validation(format!(
            "page limit must be between 1 and {MAX_PAGE_LIMIT}, got {limit}"
        ))));
    }
    Ok(())
}

/// One page of a sorted entity listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityPage {
    pub items: Vec<Entity>,
    /// Matching entities across all pages.
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Filter for relationship listings. All set conditions must hold.
#[derive(Debug, Clone, Default)]
pub struct RelationshipFilter {
    pub relationship_type: Option<String>,
    pub source_in: Option<HashSet<EntityId>>,
    pub target_in: Option<HashSet<EntityId>>,
    pub source: Option<EntityId>,
    pub target: Option<EntityId>,
}

impl RelationshipFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one relationship type; `None` leaves the filter untouched.
    pub fn with_type(mut self, relationship_type: Option<&str>) -> Self {
        self.relationship_type = relationship_type.map(str::to_string);
        self
    }

    /// Both endpoints must lie in `ids`.
    pub fn within(mut self, ids: &HashSet<EntityId>) -> Self {
        self.source_in = Some(ids.clone());
        self.target_in = Some(ids.clone());
        self
    }

    /// Relationships whose source is `id`.
    pub fn outgoing_from(mut self, id: EntityId) -> Self {
        self.source = Some(id);
        self
    }

    /// Relationships whose target is `id`.
    pub fn incoming_to(mut self, id: EntityId) -> Self {
        self.target = Some(id);
        self
    }

    pub fn matches(&self, rel: &Relationship) -> bool {
        if let Some(t) = &self.relationship_type {
            if rel.relationship_type != *t {
                return false;
            }
        }
        if let Some(ids) = &self.source_in {
            if !ids.contains(&rel.source_entity_id) {
                return false;
            }
        }
        if let Some(ids) = &self.target_in {
            if !ids.contains(&rel.target_entity_id) {
                return false;
            }
        }
        if let Some(id) = &self.source {
            if rel.source_entity_id != *id {
                return false;
            }
        }
        if let Some(id) = &self.target {
            if rel.target_entity_id != *id {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_filter() {
        let person = Entity::new("person", "Alice");
        let org = Entity::new("organization", "TechCorp");

        assert!(EntityFilter::all().matches(&person));
        assert!(EntityFilter::of_type("person").matches(&person));
        assert!(!EntityFilter::of_type("person").matches(&org));
    }

    #[test]
    fn test_entity_filter_by_name() {
        let alice = Entity::new("person", "Alice Smith");
        assert!(EntityFilter::all().named("Alice Smith").matches(&alice));
        assert!(!EntityFilter::all().named("alice smith").matches(&alice));
        assert!(EntityFilter::all().name_containing("SMITH").matches(&alice));
        assert!(!EntityFilter::of_type("person")
            .name_containing("jones")
            .matches(&alice));
    }

    #[test]
    fn test_entity_sort_parse() {
        assert_eq!(
            EntitySort::parse("name:asc"),
            EntitySort::new(SortField::Name, SortDirection::Asc)
        );
        assert_eq!(
            EntitySort::parse("updated_at"),
            EntitySort::new(SortField::UpdatedAt, SortDirection::Desc)
        );
        assert_eq!(EntitySort::parse("colour:asc"), EntitySort::default());
        assert_eq!(EntitySort::parse("name:sideways"), EntitySort::default());
    }

    #[test]
    fn test_entity_sort_compare() {
        let a = Entity::new("person", "Alice");
        let b = Entity::new("person", "Bob");
        let asc = EntitySort::new(SortField::Name, SortDirection::Asc);
        let desc = EntitySort::new(SortField::Name, SortDirection::Desc);
        assert_eq!(asc.compare(&a, &b), Ordering::Less);
        assert_eq!(desc.compare(&a, &b), Ordering::Greater);

        // Equal keys fall back to id order.
        let by_type = EntitySort::new(SortField::Type, SortDirection::Desc);
        assert_eq!(by_type.compare(&a, &b), a.id.cmp(&b.id));
    }

    #[test]
    fn test_relationship_filter_conditions_combine() {
        let a = EntityId::new();
        let b = EntityId::new();
        let c = EntityId::new();
        let ab = Relationship::new(a, b, "knows");
        let bc = Relationship::new(b, c, "works_for");

        let ids: HashSet<EntityId> = [a, b].into_iter().collect();
        let within = RelationshipFilter::new().within(&ids);
        assert!(within.matches(&ab));
        assert!(!within.matches(&bc));

        let typed = RelationshipFilter::new().with_type(Some("works_for"));
        assert!(!typed.matches(&ab));
        assert!(typed.matches(&bc));

        assert!(RelationshipFilter::new().outgoing_from(b).matches(&bc));
        assert!(!RelationshipFilter::new().outgoing_from(b).matches(&ab));
        assert!(RelationshipFilter::new().incoming_to(b).matches(&ab));

        let untyped = RelationshipFilter::new().with_type(None);
        assert!(untyped.matches(&ab) && untyped.matches(&bc));
    }
}
