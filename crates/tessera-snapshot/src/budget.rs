//! Node and edge budgets, and the truncation rules every scope shares.
//!
//! Listings ask the store for one record more than the budget allows. If
//! that extra record comes back, more data existed than fits and the result
//! is truncated; otherwise the capped listing is the complete eligible set.

/// Maximum number of nodes and edges a snapshot may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub limit_nodes: usize,
    pub limit_edges: usize,
}

impl Budget {
    pub fn new(limit_nodes: usize, limit_edges: usize) -> Self {
        Self {
            limit_nodes,
            limit_edges,
        }
    }

    /// Listing size that reveals whether entities exceed the node budget.
    pub fn node_fetch_limit(&self) -> usize {
        self.limit_nodes.saturating_add(1)
    }

    /// Listing size that reveals whether relationships exceed the edge budget.
    pub fn edge_fetch_limit(&self) -> usize {
        self.limit_edges.saturating_add(1)
    }

    pub fn node_room(&self, held: usize) -> bool {
        held < self.limit_nodes
    }

    pub fn edge_room(&self, held: usize) -> bool {
        held < self.limit_edges
    }

    /// Either budget is used up.
    pub fn saturated(&self, nodes: usize, edges: usize) -> bool {
        !self.node_room(nodes) || !self.edge_room(edges)
    }
}

/// Trim `items` to `limit`. Returns true if anything was cut.
pub fn cap<T>(items: &mut Vec<T>, limit: usize) -> bool {
    if items.len() > limit {
        items.truncate(limit);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap() {
        let mut items = vec![1, 2, 3];
        assert!(!cap(&mut items, 3));
        assert_eq!(items.len(), 3);

        assert!(cap(&mut items, 2));
        assert_eq!(items, vec![1, 2]);
    }

    #[test]
    fn test_fetch_limit_saturates() {
        let budget = Budget::new(usize::MAX, 4);
        assert_eq!(budget.node_fetch_limit(), usize::MAX);
        assert_eq!(budget.edge_fetch_limit(), 5);
    }

    #[test]
    fn test_room_and_saturation() {
        let budget = Budget::new(2, 3);
        assert!(budget.node_room(1));
        assert!(!budget.node_room(2));
        assert!(budget.edge_room(2));
        assert!(!budget.saturated(1, 2));
        assert!(budget.saturated(2, 0));
        assert!(budget.saturated(0, 3));
    }
}
