use super::{tracked, PolicyAdmin};
use crate::db::schema::RolePermission;
use crate::domain::BulkUpdateSummary;
use crate::errors::{AppError, EdgeKind, Result};
use chrono::Utc;
use std::collections::BTreeSet;
use tracing::{info, warn};
use uuid::Uuid;

impl PolicyAdmin {
    /// Grant a permission to a role. Re-granting refreshes `granted_by`.
    pub async fn grant_permission_to_role(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        granted_by: Uuid,
    ) -> Result<()> {
        tracked(
            "grant_permission",
            self.grant_inner(role_id, permission_id, granted_by).await,
        )
    }

    async fn grant_inner(&self, role_id: Uuid, permission_id: Uuid, granted_by: Uuid) -> Result<()> {
        let role = self.require_role(role_id).await?;
        let permission = self.require_permission(permission_id).await?;

        self.store
            .upsert_grant(&RolePermission {
                role_id,
                permission_id,
                granted_at: Utc::now(),
                granted_by: Some(granted_by),
            })
            .await?;

        if permission.is_dangerous {
            warn!(
                role_id = %role_id,
                role = %role.name,
                permission = %permission.name,
                granted_by = %granted_by,
                "Dangerous permission granted"
            );
        } else {
            info!(
                role_id = %role_id,
                permission = %permission.name,
                granted_by = %granted_by,
                "Permission granted to role"
            );
        }
        Ok(())
    }

    pub async fn revoke_permission_from_role(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        revoked_by: Uuid,
    ) -> Result<()> {
        tracked(
            "revoke_permission",
            self.revoke_inner(role_id, permission_id, revoked_by).await,
        )
    }

    async fn revoke_inner(&self, role_id: Uuid, permission_id: Uuid, revoked_by: Uuid) -> Result<()> {
        self.require_role(role_id).await?;
        let permission = self.require_permission(permission_id).await?;

        if !self.store.delete_grant(role_id, permission_id).await? {
            return Err(AppError::NotFound(EdgeKind::Grant));
        }

        info!(
            role_id = %role_id,
            permission = %permission.name,
            revoked_by = %revoked_by,
            "Permission revoked from role"
        );
        Ok(())
    }

    /// Make the role's direct grants equal `desired`.
    ///
    /// Additions are validated up front. Each revocation is attempted on its
    /// own; failures are logged and reported in the summary without aborting
    /// the update. Additions are then granted in one store call.
    pub async fn bulk_update_role_permissions(
        &self,
        role_id: Uuid,
        desired: &[Uuid],
        updated_by: Uuid,
    ) -> Result<BulkUpdateSummary> {
        tracked(
            "bulk_update_permissions",
            self.bulk_update_inner(role_id, desired, updated_by).await,
        )
    }

    async fn bulk_update_inner(
        &self,
        role_id: Uuid,
        desired: &[Uuid],
        updated_by: Uuid,
    ) -> Result<BulkUpdateSummary> {
        self.require_role(role_id).await?;

        let current: BTreeSet<Uuid> = self
            .store
            .list_role_permissions(role_id)
            .await?
            .into_iter()
            .map(|permission| permission.id)
            .collect();
        let desired: BTreeSet<Uuid> = desired.iter().copied().collect();

        let to_add: Vec<Uuid> = desired.difference(&current).copied().collect();
        let to_remove: Vec<Uuid> = current.difference(&desired).copied().collect();

        let known: BTreeSet<Uuid> = self
            .store
            .get_permissions(&to_add)
            .await?
            .into_iter()
            .map(|permission| permission.id)
            .collect();
        if let Some(missing) = to_add.iter().find(|id| !known.contains(id)) {
            return Err(AppError::PermissionNotFound(missing.to_string()));
        }

        let mut summary = BulkUpdateSummary::default();

        for permission_id in to_remove {
            match self.store.delete_grant(role_id, permission_id).await {
                Ok(_) => summary.revoked.push(permission_id),
                Err(e) => {
                    warn!(
                        role_id = %role_id,
                        permission_id = %permission_id,
                        error = %e,
                        "Failed to revoke permission during bulk update; skipping"
                    );
                    summary.failed_revocations.push(permission_id);
                }
            }
        }

        let now = Utc::now();
        let grants: Vec<RolePermission> = to_add
            .iter()
            .map(|permission_id| RolePermission {
                role_id,
                permission_id: *permission_id,
                granted_at: now,
                granted_by: Some(updated_by),
            })
            .collect();
        self.store.upsert_grants(&grants).await?;
        summary.granted = to_add;

        info!(
            role_id = %role_id,
            added = summary.granted.len(),
            removed = summary.revoked.len(),
            failed = summary.failed_revocations.len(),
            updated_by = %updated_by,
            "Bulk updated role permissions"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use crate::admin::testing::harness;
    use crate::db::schema::Permission;
    use crate::db::PolicyStore;
    use crate::domain::{NewPermission, NewRole};
    use crate::errors::{AppError, EdgeKind};
    use uuid::Uuid;

    async fn permission(
        h: &crate::admin::testing::Harness,
        resource: &str,
        action: &str,
    ) -> Permission {
        h.admin
            .create_permission(NewPermission::new(resource, action), Uuid::new_v4())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_grant_is_idempotent_and_revoke_reports_missing_edge() {
        let h = harness();
        let actor = Uuid::new_v4();
        let role = h.admin.create_role(NewRole::new("editor"), actor).await.unwrap();
        let write = permission(&h, "content", "write").await;

        h.admin.grant_permission_to_role(role.id, write.id, actor).await.unwrap();
        h.admin.grant_permission_to_role(role.id, write.id, actor).await.unwrap();
        assert_eq!(h.store.grant_count().await, 1);

        h.admin.revoke_permission_from_role(role.id, write.id, actor).await.unwrap();
        let err = h
            .admin
            .revoke_permission_from_role(role.id, write.id, actor)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(EdgeKind::Grant)));
    }

    #[tokio::test]
    async fn test_grant_validates_both_ids() {
        let h = harness();
        let actor = Uuid::new_v4();
        let role = h.admin.create_role(NewRole::new("editor"), actor).await.unwrap();
        let write = permission(&h, "content", "write").await;

        let err = h
            .admin
            .grant_permission_to_role(Uuid::new_v4(), write.id, actor)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RoleNotFound(_)));

        let err = h
            .admin
            .grant_permission_to_role(role.id, Uuid::new_v4(), actor)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionNotFound(_)));
    }

    #[tokio::test]
    async fn test_dangerous_grant_proceeds() {
        let h = harness();
        let actor = Uuid::new_v4();
        let role = h.admin.create_role(NewRole::new("operator"), actor).await.unwrap();
        let purge = h
            .admin
            .create_permission(NewPermission::new("system", "purge").dangerous(true), actor)
            .await
            .unwrap();

        h.admin.grant_permission_to_role(role.id, purge.id, actor).await.unwrap();
        assert_eq!(h.store.list_role_permissions(role.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_update_diffs_current_grants() {
        let h = harness();
        let actor = Uuid::new_v4();
        let role = h.admin.create_role(NewRole::new("editor"), actor).await.unwrap();
        let read = permission(&h, "content", "read").await;
        let write = permission(&h, "content", "write").await;
        let delete = permission(&h, "content", "delete").await;

        h.admin.grant_permission_to_role(role.id, read.id, actor).await.unwrap();
        h.admin.grant_permission_to_role(role.id, write.id, actor).await.unwrap();

        let summary = h
            .admin
            .bulk_update_role_permissions(role.id, &[write.id, delete.id], actor)
            .await
            .unwrap();
        assert_eq!(summary.granted, vec![delete.id]);
        assert_eq!(summary.revoked, vec![read.id]);
        assert!(summary.failed_revocations.is_empty());

        let mut names: Vec<String> = h
            .store
            .list_role_permissions(role.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["content:delete".to_string(), "content:write".to_string()]);
    }

    #[tokio::test]
    async fn test_bulk_update_skips_failed_revocations() {
        let h = harness();
        let actor = Uuid::new_v4();
        let role = h.admin.create_role(NewRole::new("editor"), actor).await.unwrap();
        let stuck = permission(&h, "content", "read").await;
        let removable = permission(&h, "content", "write").await;
        let added = permission(&h, "content", "publish").await;

        h.admin.grant_permission_to_role(role.id, stuck.id, actor).await.unwrap();
        h.admin.grant_permission_to_role(role.id, removable.id, actor).await.unwrap();
        h.store.fail_grant_deletes_for(stuck.id).await;

        let summary = h
            .admin
            .bulk_update_role_permissions(role.id, &[added.id], actor)
            .await
            .unwrap();

        assert_eq!(summary.failed_revocations, vec![stuck.id]);
        assert_eq!(summary.revoked, vec![removable.id]);
        assert_eq!(summary.granted, vec![added.id]);

        let remaining: Vec<Uuid> = h
            .store
            .list_role_permissions(role.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.contains(&stuck.id));
        assert!(remaining.contains(&added.id));
    }

    #[tokio::test]
    async fn test_bulk_update_rejects_unknown_additions_before_revoking() {
        let h = harness();
        let actor = Uuid::new_v4();
        let role = h.admin.create_role(NewRole::new("editor"), actor).await.unwrap();
        let read = permission(&h, "content", "read").await;
        h.admin.grant_permission_to_role(role.id, read.id, actor).await.unwrap();

        let err = h
            .admin
            .bulk_update_role_permissions(role.id, &[Uuid::new_v4()], actor)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionNotFound(_)));
        assert_eq!(h.store.grant_count().await, 1);
    }
}
