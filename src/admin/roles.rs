use super::{tracked, PolicyAdmin};
use crate::db::schema::{Page, PageRequest, Role};
use crate::domain::{NewRole, RoleListFilter, RoleUpdate, RoleWithPermissions};
use crate::errors::{AppError, Result};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

impl PolicyAdmin {
    /// Create a non-system role
    pub async fn create_role(&self, new_role: NewRole, created_by: Uuid) -> Result<Role> {
        tracked("create_role", self.create_role_inner(new_role, created_by).await)
    }

    async fn create_role_inner(&self, new_role: NewRole, created_by: Uuid) -> Result<Role> {
        let role = new_role.into_role()?;

        if self.store.get_role_by_name(&role.name).await?.is_some() {
            return Err(AppError::DuplicateName(role.name));
        }
        self.store.insert_role(&role).await?;

        info!(role_id = %role.id, name = %role.name, created_by = %created_by, "Role created");
        Ok(role)
    }

    /// Apply a partial update. Renames are checked against every other role.
    pub async fn update_role(
        &self,
        role_id: Uuid,
        update: RoleUpdate,
        updated_by: Uuid,
    ) -> Result<Role> {
        tracked(
            "update_role",
            self.update_role_inner(role_id, update, updated_by).await,
        )
    }

    async fn update_role_inner(
        &self,
        role_id: Uuid,
        update: RoleUpdate,
        updated_by: Uuid,
    ) -> Result<Role> {
        let mut role = self.require_role(role_id).await?;
        if role.is_system_role {
            return Err(AppError::SystemRoleImmutable);
        }
        if update.is_empty() {
            return Ok(role);
        }

        if let Some(name) = update.name.as_deref() {
            if let Some(existing) = self.store.get_role_by_name(name).await? {
                if existing.id != role_id {
                    return Err(AppError::DuplicateName(name.to_string()));
                }
            }
        }

        update.apply_to(&mut role)?;
        self.store.update_role(&role).await?;

        info!(role_id = %role.id, name = %role.name, updated_by = %updated_by, "Role updated");
        Ok(role)
    }

    /// Delete a role together with its grants, assignments and inheritance edges.
    /// System roles and the default role are refused.
    pub async fn delete_role(&self, role_id: Uuid, deleted_by: Uuid) -> Result<()> {
        tracked("delete_role", self.delete_role_inner(role_id, deleted_by).await)
    }

    async fn delete_role_inner(&self, role_id: Uuid, deleted_by: Uuid) -> Result<()> {
        let role = self.require_role(role_id).await?;
        if role.is_system_role {
            return Err(AppError::SystemRoleImmutable);
        }
        if role.is_default {
            return Err(AppError::DefaultRoleUndeletable);
        }

        if !self.store.delete_role(role_id).await? {
            return Err(AppError::RoleNotFound(role_id));
        }
        self.hierarchy.invalidate();

        info!(role_id = %role_id, name = %role.name, deleted_by = %deleted_by, "Role deleted");
        Ok(())
    }

    pub async fn get_role(&self, role_id: Uuid) -> Result<Role> {
        self.require_role(role_id).await
    }

    /// A role, its direct grants and how many users actively hold it
    pub async fn get_role_with_permissions(&self, role_id: Uuid) -> Result<RoleWithPermissions> {
        let role = self.require_role(role_id).await?;
        let permissions = self.store.list_role_permissions(role_id).await?;
        let user_count = self.store.count_active_members(role_id, Utc::now()).await?;

        Ok(RoleWithPermissions {
            role,
            permissions,
            user_count,
        })
    }

    pub async fn list_roles(&self, filter: RoleListFilter, page: PageRequest) -> Result<Page<Role>> {
        self.store.list_roles(filter, page).await
    }

    /// Users whose assignment of `role_id` is currently active
    pub async fn list_role_members(&self, role_id: Uuid, page: PageRequest) -> Result<Page<Uuid>> {
        self.require_role(role_id).await?;
        self.store
            .list_active_members(role_id, Utc::now(), page)
            .await
    }
}
