// In-memory adjacency view of the role inheritance edge set

use crate::db::schema::RoleInheritance;
use crate::errors::{AppError, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

/// Child -> direct parents. Edges point from a role to the roles it inherits from.
#[derive(Debug, Clone, Default)]
pub struct InheritanceGraph {
    parents: HashMap<Uuid, Vec<Uuid>>,
}

impl InheritanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a RoleInheritance>) -> Self {
        let mut graph = Self::new();
        for edge in edges {
            graph.add_edge(edge.child_role_id, edge.parent_role_id);
        }
        graph
    }

    pub fn add_edge(&mut self, child: Uuid, parent: Uuid) {
        let parents = self.parents.entry(child).or_default();
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }

    pub fn parents_of(&self, role_id: Uuid) -> &[Uuid] {
        self.parents.get(&role_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.parents.values().map(Vec::len).sum()
    }

    /// Every role reachable by following edges outward from `role_id`, excluding
    /// `role_id` itself unless it sits on a cycle.
    pub fn ancestors(&self, role_id: Uuid) -> HashSet<Uuid> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<Uuid> = self.parents_of(role_id).iter().copied().collect();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            queue.extend(
                self.parents_of(current)
                    .iter()
                    .filter(|parent| !visited.contains(parent)),
            );
        }

        visited
    }

    /// Reject an edge `child -> parent` that is a self-loop or would close a cycle
    pub fn check_new_edge(&self, child: Uuid, parent: Uuid) -> Result<()> {
        if child == parent {
            return Err(AppError::SelfInheritance);
        }
        if self.ancestors(parent).contains(&child) {
            return Err(AppError::CircularInheritance);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn edge(child: Uuid, parent: Uuid) -> RoleInheritance {
        RoleInheritance {
            child_role_id: child,
            parent_role_id: parent,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_ancestors_transitive() {
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let graph = InheritanceGraph::from_edges(&[edge(a, b), edge(b, c), edge(c, d)]);

        let ancestors = graph.ancestors(a);
        assert_eq!(ancestors, HashSet::from([b, c, d]));
        assert!(graph.ancestors(d).is_empty());
    }

    #[test]
    fn test_diamond_counts_shared_ancestor_once() {
        let (x, y, z, w) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let graph =
            InheritanceGraph::from_edges(&[edge(x, y), edge(x, z), edge(y, w), edge(z, w)]);

        let ancestors = graph.ancestors(x);
        assert_eq!(ancestors.len(), 3);
        assert!(ancestors.contains(&w));
    }

    #[test]
    fn test_traversal_terminates_on_corrupted_cycle() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut graph = InheritanceGraph::new();
        graph.add_edge(a, b);
        graph.add_edge(b, c);
        graph.add_edge(c, a);

        assert_eq!(graph.ancestors(a), HashSet::from([a, b, c]));
    }

    #[test]
    fn test_cycle_rejection() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut graph = InheritanceGraph::from_edges(&[edge(a, b)]);

        assert!(matches!(graph.check_new_edge(a, a), Err(AppError::SelfInheritance)));
        assert!(matches!(graph.check_new_edge(b, a), Err(AppError::CircularInheritance)));
        assert!(graph.check_new_edge(a, c).is_ok());

        // C -> A, then A -> C closes a loop
        assert!(graph.check_new_edge(c, a).is_ok());
        graph.add_edge(c, a);
        assert!(matches!(graph.check_new_edge(a, c), Err(AppError::CircularInheritance)));
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let graph = InheritanceGraph::from_edges(&[edge(a, b), edge(a, b)]);
        assert_eq!(graph.edge_count(), 1);
    }
}
