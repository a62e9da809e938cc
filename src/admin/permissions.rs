use super::{tracked, PolicyAdmin};
use crate::db::schema::{Page, PageRequest, Permission, PermissionCategory};
use crate::domain::{NewCategory, NewPermission, PermissionListFilter};
use crate::errors::{AppError, EdgeKind, Result};
use tracing::info;
use uuid::Uuid;

impl PolicyAdmin {
    pub async fn create_category(&self, new_category: NewCategory) -> Result<PermissionCategory> {
        tracked(
            "create_category",
            self.create_category_inner(new_category).await,
        )
    }

    async fn create_category_inner(&self, new_category: NewCategory) -> Result<PermissionCategory> {
        let category = new_category.into_category()?;
        self.store.insert_category(&category).await?;

        info!(category_id = %category.id, name = %category.name, "Permission category created");
        Ok(category)
    }

    /// Categories ordered by sort order, then name
    pub async fn list_categories(&self) -> Result<Vec<PermissionCategory>> {
        self.store.list_categories().await
    }

    /// Create a `resource:action` permission, optionally filed under a category
    pub async fn create_permission(
        &self,
        new_permission: NewPermission,
        created_by: Uuid,
    ) -> Result<Permission> {
        tracked(
            "create_permission",
            self.create_permission_inner(new_permission, created_by).await,
        )
    }

    async fn create_permission_inner(
        &self,
        new_permission: NewPermission,
        created_by: Uuid,
    ) -> Result<Permission> {
        let permission = new_permission.into_permission()?;

        if let Some(category_id) = permission.category_id {
            if self.store.get_category(category_id).await?.is_none() {
                return Err(AppError::NotFound(EdgeKind::Category));
            }
        }
        if self
            .store
            .get_permission_by_name(&permission.name)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateName(permission.name));
        }

        self.store.insert_permission(&permission).await?;

        info!(
            permission_id = %permission.id,
            name = %permission.name,
            dangerous = permission.is_dangerous,
            created_by = %created_by,
            "Permission created"
        );
        Ok(permission)
    }

    pub async fn get_permission(&self, permission_id: Uuid) -> Result<Permission> {
        self.require_permission(permission_id).await
    }

    pub async fn get_permission_by_name(&self, name: &str) -> Result<Permission> {
        self.store
            .get_permission_by_name(name)
            .await?
            .ok_or_else(|| AppError::PermissionNotFound(name.to_string()))
    }

    pub async fn list_permissions(
        &self,
        filter: PermissionListFilter,
        page: PageRequest,
    ) -> Result<Page<Permission>> {
        self.store.list_permissions(filter, page).await
    }
}
