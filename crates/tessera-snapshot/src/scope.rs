//! Scope resolution: validate a request and pick the fetch strategy.
//!
//! Resolution is pure. A request that fails here never touches the store.

use tessera_core::{EntityId, GraphSettings};

use crate::budget::Budget;
use crate::error::{Result, SnapshotError};
use crate::types::{Scope, SnapshotRequest};

/// A validated scope with the parameters its fetcher needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedScope {
    All {
        relationship_type: Option<String>,
    },
    ByType {
        entity_type: String,
        relationship_type: Option<String>,
    },
    Neighborhood {
        root_id: EntityId,
        depth: u32,
        relationship_type: Option<String>,
    },
}

impl ResolvedScope {
    pub fn name(&self) -> &'static str {
        match self {
            Self::All { .. } => "all",
            Self::ByType { .. } => "by_type",
            Self::Neighborhood { .. } => "neighborhood",
        }
    }
}

/// Validates requests against the configured limits.
#[derive(Debug, Clone)]
pub struct ScopeResolver {
    settings: GraphSettings,
}

impl ScopeResolver {
    pub fn new(settings: GraphSettings) -> Self {
        Self { settings }
    }

    pub fn resolve(&self, request: &SnapshotRequest) -> Result<(ResolvedScope, Budget)> {
        let relationship_type = non_blank(request.relationship_type.as_deref());

        let scope = match request.scope {
            Scope::All => ResolvedScope::All { relationship_type },
            Scope::ByType => {
                let entity_type = non_blank(request.entity_type.as_deref()).ok_or_else(|| {
                    SnapshotError::invalid("entity_type is required for by_type scope")
                })?;
                ResolvedScope::ByType {
                    entity_type,
                    relationship_type,
                }
            }
            Scope::Neighborhood => {
                let root_id = request.root_id.ok_or_else(|| {
                    SnapshotError::invalid("root_id is required for neighborhood scope")
                })?;
                if request.depth < 1 || request.depth > self.settings.max_depth {
                    return Err(SnapshotError::invalid(format!(
                        "depth must be between 1 and {}, got {}",
                        self.settings.max_depth, request.depth
                    )));
                }
                ResolvedScope::Neighborhood {
                    root_id,
                    depth: request.depth,
                    relationship_type,
                }
            }
        };

        let budget = Budget::new(
            positive(
                "limit_nodes",
                request.limit_nodes,
                self.settings.default_limit_nodes,
            )?,
            positive(
                "limit_edges",
                request.limit_edges,
                self.settings.default_limit_edges,
            )?,
        );

        Ok((scope, budget))
    }
}

/// Trimmed value, or `None` when absent or blank.
fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn positive(field: &str, requested: Option<usize>, default: usize) -> Result<usize> {
    match requested.unwrap_or(default) {
        0 => Err(SnapshotError::invalid(format!("{field} must be positive"))),
        n => Ok(n),
    }
}
