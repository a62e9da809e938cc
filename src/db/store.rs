// Storage port for the policy engine

use crate::db::schema::{
    GrantedPermission, Page, PageRequest, Permission, PermissionCategory, Role, RoleInheritance,
    RolePermission, UserRole,
};
use crate::domain::{PermissionListFilter, RoleListFilter};
use crate::errors::Result;
use crate::graph::InheritanceGraph;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Cycle check run by the store while it holds the inheritance edge set stable
pub type InheritanceGuard<'a> = &'a (dyn Fn(&InheritanceGraph) -> Result<()> + Send + Sync);

/// Durable roles, permissions and the three relationship edge sets.
///
/// Upserts must be idempotent under concurrent re-application. Deletes return
/// `false` when nothing matched instead of erroring, so services can pick the
/// right error kind.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    // Roles
    async fn insert_role(&self, role: &Role) -> Result<()>;
    async fn get_role(&self, id: Uuid) -> Result<Option<Role>>;
    async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>>;
    async fn get_roles(&self, ids: &[Uuid]) -> Result<Vec<Role>>;
    async fn update_role(&self, role: &Role) -> Result<()>;
    /// Delete a role and every edge touching it
    async fn delete_role(&self, id: Uuid) -> Result<bool>;
    async fn list_roles(&self, filter: RoleListFilter, page: PageRequest) -> Result<Page<Role>>;

    // Categories
    async fn insert_category(&self, category: &PermissionCategory) -> Result<()>;
    async fn get_category(&self, id: Uuid) -> Result<Option<PermissionCategory>>;
    async fn list_categories(&self) -> Result<Vec<PermissionCategory>>;

    // Permissions
    async fn insert_permission(&self, permission: &Permission) -> Result<()>;
    async fn get_permission(&self, id: Uuid) -> Result<Option<Permission>>;
    async fn get_permission_by_name(&self, name: &str) -> Result<Option<Permission>>;
    async fn get_permissions(&self, ids: &[Uuid]) -> Result<Vec<Permission>>;
    async fn list_permissions(
        &self,
        filter: PermissionListFilter,
        page: PageRequest,
    ) -> Result<Page<Permission>>;

    // Grant edges
    async fn upsert_grant(&self, grant: &RolePermission) -> Result<()>;
    /// Upsert several grants atomically
    async fn upsert_grants(&self, grants: &[RolePermission]) -> Result<()>;
    async fn delete_grant(&self, role_id: Uuid, permission_id: Uuid) -> Result<bool>;
    async fn list_role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>>;
    /// Direct grants of every role in `role_ids`, one row per (role, permission)
    async fn list_granted_permissions(&self, role_ids: &[Uuid]) -> Result<Vec<GrantedPermission>>;

    // Assignment edges
    async fn upsert_assignment(&self, assignment: &UserRole) -> Result<()>;
    async fn get_assignment(&self, user_id: Uuid, role_id: Uuid) -> Result<Option<UserRole>>;
    async fn delete_assignment(&self, user_id: Uuid, role_id: Uuid) -> Result<bool>;
    /// Roles held by `user_id` through assignments active at `now`, ordered by name
    async fn list_active_roles(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Role>>;
    async fn count_active_members(&self, role_id: Uuid, now: DateTime<Utc>) -> Result<i64>;
    async fn list_active_members(
        &self,
        role_id: Uuid,
        now: DateTime<Utc>,
        page: PageRequest,
    ) -> Result<Page<Uuid>>;

    // Inheritance edges
    /// Edges leaving any of `child_ids` (their direct parents)
    async fn list_parent_edges(&self, child_ids: &[Uuid]) -> Result<Vec<RoleInheritance>>;
    /// Run `guard` over the current edge set and insert `edge` in the same
    /// transaction. Returns `false` when the edge already existed.
    async fn insert_inheritance(
        &self,
        edge: &RoleInheritance,
        guard: InheritanceGuard<'_>,
    ) -> Result<bool>;
    async fn delete_inheritance(&self, child_role_id: Uuid, parent_role_id: Uuid) -> Result<bool>;
}

/// Host application's user registry; this engine never creates users
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool>;
}
