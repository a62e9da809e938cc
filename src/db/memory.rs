// In-memory policy store for tests and embedded use

use crate::db::schema::{
    GrantedPermission, Page, PageRequest, Permission, PermissionCategory, Role, RoleInheritance,
    RolePermission, UserRole,
};
use crate::db::store::{InheritanceGuard, PolicyStore, UserDirectory};
use crate::domain::{PermissionListFilter, RoleListFilter};
use crate::errors::{AppError, Result};
use crate::graph::InheritanceGraph;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    roles: HashMap<Uuid, Role>,
    categories: HashMap<Uuid, PermissionCategory>,
    permissions: HashMap<Uuid, Permission>,
    grants: BTreeMap<(Uuid, Uuid), RolePermission>,
    assignments: BTreeMap<(Uuid, Uuid), UserRole>,
    inheritance: BTreeMap<(Uuid, Uuid), RoleInheritance>,
    #[cfg(test)]
    failing_grant_deletes: HashSet<Uuid>,
}

impl State {
    fn role_name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        self.roles
            .values()
            .any(|r| r.name == name && Some(r.id) != except)
    }
}

/// Single-lock store with the same semantics as the Postgres backend
#[derive(Clone, Default)]
pub struct InMemoryPolicyStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a role with whatever flags it carries, bypassing validation
    pub async fn seed_role(&self, role: Role) {
        self.state.write().await.roles.insert(role.id, role);
    }

    /// Write an inheritance edge without the cycle guard, as direct data manipulation would
    pub async fn force_inheritance(&self, child_role_id: Uuid, parent_role_id: Uuid) {
        self.state.write().await.inheritance.insert(
            (child_role_id, parent_role_id),
            RoleInheritance {
                child_role_id,
                parent_role_id,
                created_at: Utc::now(),
            },
        );
    }

    /// Make revoking `permission_id` from any role fail with a store error
    #[cfg(test)]
    pub(crate) async fn fail_grant_deletes_for(&self, permission_id: Uuid) {
        self.state
            .write()
            .await
            .failing_grant_deletes
            .insert(permission_id);
    }

    pub async fn grant_count(&self) -> usize {
        self.state.read().await.grants.len()
    }

    pub async fn assignment_count(&self) -> usize {
        self.state.read().await.assignments.len()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn insert_role(&self, role: &Role) -> Result<()> {
        let mut state = self.state.write().await;
        if state.role_name_taken(&role.name, None) {
            return Err(AppError::DuplicateName(role.name.clone()));
        }
        state.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn get_role(&self, id: Uuid) -> Result<Option<Role>> {
        Ok(self.state.read().await.roles.get(&id).cloned())
    }

    async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let state = self.state.read().await;
        Ok(state.roles.values().find(|r| r.name == name).cloned())
    }

    async fn get_roles(&self, ids: &[Uuid]) -> Result<Vec<Role>> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = ids
            .iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .filter_map(|id| state.roles.get(id).cloned())
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn update_role(&self, role: &Role) -> Result<()> {
        let mut state = self.state.write().await;
        if state.role_name_taken(&role.name, Some(role.id)) {
            return Err(AppError::DuplicateName(role.name.clone()));
        }
        match state.roles.get_mut(&role.id) {
            Some(existing) if !existing.is_system_role => {
                *existing = role.clone();
                Ok(())
            }
            Some(_) => Err(AppError::SystemRoleImmutable),
            None => Err(AppError::RoleNotFound(role.id)),
        }
    }

    async fn delete_role(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.roles.remove(&id).is_none() {
            return Ok(false);
        }
        state.grants.retain(|(role_id, _), _| *role_id != id);
        state.assignments.retain(|(_, role_id), _| *role_id != id);
        state
            .inheritance
            .retain(|(child, parent), _| *child != id && *parent != id);
        Ok(true)
    }

    async fn list_roles(&self, filter: RoleListFilter, page: PageRequest) -> Result<Page<Role>> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = state
            .roles
            .values()
            .filter(|r| filter.include_system || !r.is_system_role)
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(page.apply(&roles))
    }

    async fn insert_category(&self, category: &PermissionCategory) -> Result<()> {
        let mut state = self.state.write().await;
        if state.categories.values().any(|c| c.name == category.name) {
            return Err(AppError::DuplicateName(category.name.clone()));
        }
        state.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<PermissionCategory>> {
        Ok(self.state.read().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<PermissionCategory>> {
        let state = self.state.read().await;
        let mut categories: Vec<_> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| (a.sort_order, &a.name).cmp(&(b.sort_order, &b.name)));
        Ok(categories)
    }

    async fn insert_permission(&self, permission: &Permission) -> Result<()> {
        let mut state = self.state.write().await;
        if state.permissions.values().any(|p| p.name == permission.name) {
            return Err(AppError::DuplicateName(permission.name.clone()));
        }
        state.permissions.insert(permission.id, permission.clone());
        Ok(())
    }

    async fn get_permission(&self, id: Uuid) -> Result<Option<Permission>> {
        Ok(self.state.read().await.permissions.get(&id).cloned())
    }

    async fn get_permission_by_name(&self, name: &str) -> Result<Option<Permission>> {
        let state = self.state.read().await;
        Ok(state.permissions.values().find(|p| p.name == name).cloned())
    }

    async fn get_permissions(&self, ids: &[Uuid]) -> Result<Vec<Permission>> {
        let state = self.state.read().await;
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        let mut permissions: Vec<Permission> = wanted
            .into_iter()
            .filter_map(|id| state.permissions.get(id).cloned())
            .collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(permissions)
    }

    async fn list_permissions(
        &self,
        filter: PermissionListFilter,
        page: PageRequest,
    ) -> Result<Page<Permission>> {
        let state = self.state.read().await;
        let sort_order = |p: &Permission| {
            p.category_id
                .and_then(|id| state.categories.get(&id))
                .map(|c| c.sort_order)
                .unwrap_or(i32::MAX)
        };
        let mut permissions: Vec<Permission> = state
            .permissions
            .values()
            .filter(|p| filter.category_id.map_or(true, |id| p.category_id == Some(id)))
            .cloned()
            .collect();
        permissions.sort_by(|a, b| {
            (sort_order(a), &a.resource, &a.action).cmp(&(sort_order(b), &b.resource, &b.action))
        });
        Ok(page.apply(&permissions))
    }

    async fn upsert_grant(&self, grant: &RolePermission) -> Result<()> {
        self.upsert_grants(std::slice::from_ref(grant)).await
    }

    async fn upsert_grants(&self, grants: &[RolePermission]) -> Result<()> {
        let mut state = self.state.write().await;
        for grant in grants {
            if !state.roles.contains_key(&grant.role_id) {
                return Err(AppError::RoleNotFound(grant.role_id));
            }
            if !state.permissions.contains_key(&grant.permission_id) {
                return Err(AppError::PermissionNotFound(grant.permission_id.to_string()));
            }
        }
        for grant in grants {
            state
                .grants
                .insert((grant.role_id, grant.permission_id), grant.clone());
        }
        Ok(())
    }

    async fn delete_grant(&self, role_id: Uuid, permission_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        #[cfg(test)]
        if state.failing_grant_deletes.contains(&permission_id) {
            return Err(AppError::Internal("grant delete rejected".to_string()));
        }
        Ok(state.grants.remove(&(role_id, permission_id)).is_some())
    }

    async fn list_role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>> {
        let state = self.state.read().await;
        let mut permissions: Vec<Permission> = state
            .grants
            .keys()
            .filter(|(r, _)| *r == role_id)
            .filter_map(|(_, p)| state.permissions.get(p).cloned())
            .collect();
        permissions.sort_by(|a, b| (&a.resource, &a.action).cmp(&(&b.resource, &b.action)));
        Ok(permissions)
    }

    async fn list_granted_permissions(&self, role_ids: &[Uuid]) -> Result<Vec<GrantedPermission>> {
        let state = self.state.read().await;
        let wanted: HashSet<&Uuid> = role_ids.iter().collect();
        Ok(state
            .grants
            .keys()
            .filter(|(role_id, _)| wanted.contains(role_id))
            .filter_map(|(role_id, permission_id)| {
                state
                    .permissions
                    .get(permission_id)
                    .map(|permission| GrantedPermission {
                        role_id: *role_id,
                        permission: permission.clone(),
                    })
            })
            .collect())
    }

    async fn upsert_assignment(&self, assignment: &UserRole) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.roles.contains_key(&assignment.role_id) {
            return Err(AppError::RoleNotFound(assignment.role_id));
        }
        state.assignments.insert(
            (assignment.user_id, assignment.role_id),
            assignment.clone(),
        );
        Ok(())
    }

    async fn get_assignment(&self, user_id: Uuid, role_id: Uuid) -> Result<Option<UserRole>> {
        let state = self.state.read().await;
        Ok(state.assignments.get(&(user_id, role_id)).cloned())
    }

    async fn delete_assignment(&self, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state.assignments.remove(&(user_id, role_id)).is_some())
    }

    async fn list_active_roles(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Role>> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = state
            .assignments
            .values()
            .filter(|a| a.user_id == user_id && a.is_active(now))
            .filter_map(|a| state.roles.get(&a.role_id).cloned())
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn count_active_members(&self, role_id: Uuid, now: DateTime<Utc>) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state
            .assignments
            .values()
            .filter(|a| a.role_id == role_id && a.is_active(now))
            .count() as i64)
    }

    async fn list_active_members(
        &self,
        role_id: Uuid,
        now: DateTime<Utc>,
        page: PageRequest,
    ) -> Result<Page<Uuid>> {
        let state = self.state.read().await;
        let mut members: Vec<&UserRole> = state
            .assignments
            .values()
            .filter(|a| a.role_id == role_id && a.is_active(now))
            .collect();
        members.sort_by(|a, b| b.assigned_at.cmp(&a.assigned_at));
        let ids: Vec<Uuid> = members.into_iter().map(|a| a.user_id).collect();
        Ok(page.apply(&ids))
    }

    async fn list_parent_edges(&self, child_ids: &[Uuid]) -> Result<Vec<RoleInheritance>> {
        let state = self.state.read().await;
        let wanted: HashSet<&Uuid> = child_ids.iter().collect();
        Ok(state
            .inheritance
            .values()
            .filter(|e| wanted.contains(&e.child_role_id))
            .cloned()
            .collect())
    }

    async fn insert_inheritance(
        &self,
        edge: &RoleInheritance,
        guard: InheritanceGuard<'_>,
    ) -> Result<bool> {
        // The write lock is held across check and insert
        let mut state = self.state.write().await;
        let graph = InheritanceGraph::from_edges(state.inheritance.values());
        guard(&graph)?;

        let key = (edge.child_role_id, edge.parent_role_id);
        if state.inheritance.contains_key(&key) {
            return Ok(false);
        }
        state.inheritance.insert(key, edge.clone());
        Ok(true)
    }

    async fn delete_inheritance(&self, child_role_id: Uuid, parent_role_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state
            .inheritance
            .remove(&(child_role_id, parent_role_id))
            .is_some())
    }
}

/// Fixed set of known user ids
#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashSet<Uuid>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user_id: Uuid) {
        self.users.write().await.insert(user_id);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool> {
        Ok(self.users.read().await.contains(&user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewPermission, NewRole};
    use chrono::Duration;

    async fn role(store: &InMemoryPolicyStore, name: &str) -> Role {
        let role = NewRole::new(name).into_role().unwrap();
        store.insert_role(&role).await.unwrap();
        role
    }

    #[tokio::test]
    async fn test_duplicate_role_name() {
        let store = InMemoryPolicyStore::new();
        role(&store, "viewer").await;

        let duplicate = NewRole::new("viewer").into_role().unwrap();
        assert!(matches!(
            store.insert_role(&duplicate).await,
            Err(AppError::DuplicateName(_))
        ));
    }

    #[tokio::test]
    async fn test_grant_upsert_is_idempotent() {
        let store = InMemoryPolicyStore::new();
        let viewer = role(&store, "viewer").await;
        let permission = NewPermission::new("content", "read").into_permission().unwrap();
        store.insert_permission(&permission).await.unwrap();

        let first_granter = Uuid::new_v4();
        let second_granter = Uuid::new_v4();
        for granter in [first_granter, second_granter] {
            store
                .upsert_grant(&RolePermission {
                    role_id: viewer.id,
                    permission_id: permission.id,
                    granted_at: Utc::now(),
                    granted_by: Some(granter),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.grant_count().await, 1);
        let state = store.state.read().await;
        let grant = state.grants.get(&(viewer.id, permission.id)).unwrap();
        assert_eq!(grant.granted_by, Some(second_granter));
    }

    #[tokio::test]
    async fn test_assignment_upsert_keeps_latest_expiry() {
        let store = InMemoryPolicyStore::new();
        let viewer = role(&store, "viewer").await;
        let user = Uuid::new_v4();
        let later = Utc::now() + Duration::days(7);

        for expires_at in [None, Some(later)] {
            store
                .upsert_assignment(&UserRole {
                    user_id: user,
                    role_id: viewer.id,
                    assigned_at: Utc::now(),
                    assigned_by: None,
                    expires_at,
                })
                .await
                .unwrap();
        }

        assert_eq!(store.assignment_count().await, 1);
        let assignment = store.get_assignment(user, viewer.id).await.unwrap().unwrap();
        assert_eq!(assignment.expires_at, Some(later));
    }

    #[tokio::test]
    async fn test_expired_assignment_is_not_active() {
        let store = InMemoryPolicyStore::new();
        let viewer = role(&store, "viewer").await;
        let user = Uuid::new_v4();
        store
            .upsert_assignment(&UserRole {
                user_id: user,
                role_id: viewer.id,
                assigned_at: Utc::now() - Duration::days(2),
                assigned_by: None,
                expires_at: Some(Utc::now() - Duration::days(1)),
            })
            .await
            .unwrap();

        assert!(store.list_active_roles(user, Utc::now()).await.unwrap().is_empty());
        assert!(store.get_assignment(user, viewer.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_role_cascades_edges() {
        let store = InMemoryPolicyStore::new();
        let viewer = role(&store, "viewer").await;
        let editor = role(&store, "editor").await;
        let permission = NewPermission::new("content", "read").into_permission().unwrap();
        store.insert_permission(&permission).await.unwrap();
        store
            .upsert_grant(&RolePermission {
                role_id: viewer.id,
                permission_id: permission.id,
                granted_at: Utc::now(),
                granted_by: None,
            })
            .await
            .unwrap();
        store.force_inheritance(editor.id, viewer.id).await;

        assert!(store.delete_role(viewer.id).await.unwrap());
        assert_eq!(store.grant_count().await, 0);
        assert!(store.list_parent_edges(&[editor.id]).await.unwrap().is_empty());
        assert!(!store.delete_role(viewer.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_inheritance_runs_guard_and_dedups() {
        let store = InMemoryPolicyStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let edge = RoleInheritance {
            child_role_id: a,
            parent_role_id: b,
            created_at: Utc::now(),
        };
        let allow = |_: &InheritanceGraph| -> Result<()> { Ok(()) };

        assert!(store.insert_inheritance(&edge, &allow).await.unwrap());
        assert!(!store.insert_inheritance(&edge, &allow).await.unwrap());

        let reject = |_: &InheritanceGraph| -> Result<()> { Err(AppError::CircularInheritance) };
        let other = RoleInheritance {
            child_role_id: b,
            parent_role_id: a,
            created_at: Utc::now(),
        };
        assert!(store.insert_inheritance(&other, &reject).await.is_err());
        assert_eq!(store.list_parent_edges(&[b]).await.unwrap().len(), 0);
    }
}
