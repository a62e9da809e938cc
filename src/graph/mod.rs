pub mod cache;
pub mod inheritance;

pub use cache::AncestorCache;
pub use inheritance::InheritanceGraph;

use crate::db::schema::RoleInheritance;
use crate::db::PolicyStore;
use crate::errors::{AppError, EdgeKind, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Role inheritance operations over the policy store, with optional
/// memoization of ancestor closures.
pub struct RoleHierarchy {
    store: Arc<dyn PolicyStore>,
    cache: Option<AncestorCache>,
}

impl RoleHierarchy {
    pub fn new(store: Arc<dyn PolicyStore>, cache: Option<AncestorCache>) -> Self {
        Self { store, cache }
    }

    /// Transitive closure of parents of `role_id`, excluding `role_id` itself
    /// unless corrupted data puts it on a cycle. Terminates on any edge set.
    pub async fn get_ancestors(&self, role_id: Uuid) -> Result<Arc<HashSet<Uuid>>> {
        let generation = match &self.cache {
            Some(cache) => {
                if let Some(hit) = cache.get(role_id) {
                    return Ok(hit);
                }
                Some(cache.generation())
            }
            None => None,
        };

        let ancestors = Arc::new(self.walk_parents(role_id).await?);

        if let (Some(cache), Some(generation)) = (&self.cache, generation) {
            cache.insert(role_id, Arc::clone(&ancestors), generation);
        }

        Ok(ancestors)
    }

    /// Level-wise BFS over stored edges, one query per depth
    async fn walk_parents(&self, role_id: Uuid) -> Result<HashSet<Uuid>> {
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut frontier = vec![role_id];

        while !frontier.is_empty() {
            let edges = self.store.list_parent_edges(&frontier).await?;
            frontier = edges
                .into_iter()
                .map(|edge| edge.parent_role_id)
                .filter(|parent| visited.insert(*parent))
                .collect();
        }

        Ok(visited)
    }

    /// `role_ids` together with all of their ancestors
    pub async fn effective_role_set(&self, role_ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        let mut effective: HashSet<Uuid> = role_ids.iter().copied().collect();

        for role_id in role_ids {
            let ancestors = self.get_ancestors(*role_id).await?;
            effective.extend(ancestors.iter().copied());
        }

        Ok(effective)
    }

    /// Make `child` inherit from `parent`. Returns `false` when the edge
    /// already existed. The cycle check runs inside the store's write
    /// transaction so concurrent inserts cannot jointly close a loop.
    pub async fn add_inheritance(&self, child: Uuid, parent: Uuid) -> Result<bool> {
        if child == parent {
            return Err(AppError::SelfInheritance);
        }

        let edge = RoleInheritance {
            child_role_id: child,
            parent_role_id: parent,
            created_at: Utc::now(),
        };
        let guard = move |graph: &InheritanceGraph| graph.check_new_edge(child, parent);

        let inserted = self.store.insert_inheritance(&edge, &guard).await?;
        if inserted {
            self.invalidate();
        } else {
            debug!(child = %child, parent = %parent, "Role inheritance already present");
        }

        Ok(inserted)
    }

    pub async fn remove_inheritance(&self, child: Uuid, parent: Uuid) -> Result<()> {
        if !self.store.delete_inheritance(child, parent).await? {
            return Err(AppError::NotFound(EdgeKind::Inheritance));
        }

        self.invalidate();
        Ok(())
    }

    /// Drop every memoized closure
    pub fn invalidate(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryPolicyStore;
    use crate::domain::NewRole;
    use std::time::Duration;

    async fn roles(store: &InMemoryPolicyStore, names: &[&str]) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for name in names {
            let role = NewRole::new(*name).into_role().unwrap();
            store.insert_role(&role).await.unwrap();
            ids.push(role.id);
        }
        ids
    }

    fn hierarchy(store: &InMemoryPolicyStore, cached: bool) -> RoleHierarchy {
        let cache = cached.then(|| AncestorCache::new(Duration::from_secs(60)));
        RoleHierarchy::new(Arc::new(store.clone()), cache)
    }

    #[tokio::test]
    async fn test_transitive_ancestors() {
        let store = InMemoryPolicyStore::new();
        let ids = roles(&store, &["role_a", "role_b", "role_c", "role_d"]).await;
        let hierarchy = hierarchy(&store, false);

        hierarchy.add_inheritance(ids[0], ids[1]).await.unwrap();
        hierarchy.add_inheritance(ids[1], ids[2]).await.unwrap();
        hierarchy.add_inheritance(ids[2], ids[3]).await.unwrap();

        let ancestors = hierarchy.get_ancestors(ids[0]).await.unwrap();
        assert_eq!(*ancestors, HashSet::from([ids[1], ids[2], ids[3]]));
    }

    #[tokio::test]
    async fn test_cycle_rejected_and_graph_unchanged() {
        let store = InMemoryPolicyStore::new();
        let ids = roles(&store, &["role_a", "role_b", "role_c"]).await;
        let hierarchy = hierarchy(&store, true);

        hierarchy.add_inheritance(ids[0], ids[1]).await.unwrap();
        hierarchy.add_inheritance(ids[1], ids[2]).await.unwrap();

        let err = hierarchy.add_inheritance(ids[2], ids[0]).await.unwrap_err();
        assert!(matches!(err, AppError::CircularInheritance));
        assert!(hierarchy.get_ancestors(ids[2]).await.unwrap().is_empty());

        let err = hierarchy.add_inheritance(ids[0], ids[0]).await.unwrap_err();
        assert!(matches!(err, AppError::SelfInheritance));
    }

    #[tokio::test]
    async fn test_duplicate_edge_is_idempotent() {
        let store = InMemoryPolicyStore::new();
        let ids = roles(&store, &["role_a", "role_b"]).await;
        let hierarchy = hierarchy(&store, false);

        assert!(hierarchy.add_inheritance(ids[0], ids[1]).await.unwrap());
        assert!(!hierarchy.add_inheritance(ids[0], ids[1]).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupted_cycle_terminates() {
        let store = InMemoryPolicyStore::new();
        let ids = roles(&store, &["role_a", "role_b"]).await;
        store.force_inheritance(ids[0], ids[1]).await;
        store.force_inheritance(ids[1], ids[0]).await;
        let hierarchy = hierarchy(&store, false);

        let ancestors = hierarchy.get_ancestors(ids[0]).await.unwrap();
        assert_eq!(*ancestors, HashSet::from([ids[0], ids[1]]));
    }

    #[tokio::test]
    async fn test_mutation_invalidates_cache() {
        let store = InMemoryPolicyStore::new();
        let ids = roles(&store, &["role_a", "role_b", "role_c"]).await;
        let hierarchy = hierarchy(&store, true);

        hierarchy.add_inheritance(ids[0], ids[1]).await.unwrap();
        assert_eq!(hierarchy.get_ancestors(ids[0]).await.unwrap().len(), 1);

        hierarchy.add_inheritance(ids[1], ids[2]).await.unwrap();
        assert_eq!(hierarchy.get_ancestors(ids[0]).await.unwrap().len(), 2);

        hierarchy.remove_inheritance(ids[0], ids[1]).await.unwrap();
        assert!(hierarchy.get_ancestors(ids[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_edge() {
        let store = InMemoryPolicyStore::new();
        let ids = roles(&store, &["role_a", "role_b"]).await;
        let hierarchy = hierarchy(&store, false);

        let err = hierarchy.remove_inheritance(ids[0], ids[1]).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(EdgeKind::Inheritance)));
    }

    #[tokio::test]
    async fn test_effective_role_set_includes_direct_roles() {
        let store = InMemoryPolicyStore::new();
        let ids = roles(&store, &["role_x", "role_y", "role_z", "role_w"]).await;
        let hierarchy = hierarchy(&store, true);

        // Diamond: X -> Y, X -> Z, Y -> W, Z -> W
        hierarchy.add_inheritance(ids[0], ids[1]).await.unwrap();
        hierarchy.add_inheritance(ids[0], ids[2]).await.unwrap();
        hierarchy.add_inheritance(ids[1], ids[3]).await.unwrap();
        hierarchy.add_inheritance(ids[2], ids[3]).await.unwrap();

        let effective = hierarchy.effective_role_set(&[ids[0]]).await.unwrap();
        assert_eq!(effective.len(), 4);
    }
}
