use super::{tracked, PolicyAdmin};
use crate::db::schema::UserRole;
use crate::domain::{AssignRole, RoleAuditAction, RoleAuditLog};
use crate::errors::{AppError, EdgeKind, Result};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

impl PolicyAdmin {
    /// Assign a role to a user.
    ///
    /// Fails with `AlreadyAssigned` while the user holds an active assignment
    /// of the role; an expired assignment is replaced.
    pub async fn assign_role_to_user(
        &self,
        request: AssignRole,
        assigned_by: Uuid,
    ) -> Result<UserRole> {
        tracked("assign_role", self.assign_inner(request, assigned_by).await)
    }

    async fn assign_inner(&self, request: AssignRole, assigned_by: Uuid) -> Result<UserRole> {
        self.require_user(request.user_id).await?;
        let role = self.require_role(request.role_id).await?;

        let now = Utc::now();
        if let Some(existing) = self
            .store
            .get_assignment(request.user_id, request.role_id)
            .await?
        {
            if existing.is_active(now) {
                return Err(AppError::AlreadyAssigned);
            }
        }

        let assignment = UserRole {
            user_id: request.user_id,
            role_id: request.role_id,
            assigned_at: now,
            assigned_by: Some(assigned_by),
            expires_at: request.expires_at,
        };
        self.store.upsert_assignment(&assignment).await?;

        self.audit
            .record(
                RoleAuditLog::new(
                    request.user_id,
                    request.role_id,
                    RoleAuditAction::Assigned,
                    assigned_by,
                )
                .with_reason(request.reason),
            )
            .await;

        info!(
            user_id = %request.user_id,
            role = %role.name,
            assigned_by = %assigned_by,
            expires_at = ?request.expires_at,
            "Role assigned to user"
        );
        Ok(assignment)
    }

    /// Remove a role from a user. Nobody may remove a system role from themselves.
    pub async fn remove_role_from_user(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        removed_by: Uuid,
        reason: Option<String>,
    ) -> Result<()> {
        tracked(
            "remove_role",
            self.remove_inner(user_id, role_id, removed_by, reason).await,
        )
    }

    async fn remove_inner(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        removed_by: Uuid,
        reason: Option<String>,
    ) -> Result<()> {
        self.require_user(user_id).await?;
        let role = self.require_role(role_id).await?;

        if role.is_system_role && user_id == removed_by {
            return Err(AppError::SystemRoleSelfRemoval);
        }

        if !self.store.delete_assignment(user_id, role_id).await? {
            return Err(AppError::NotFound(EdgeKind::Assignment));
        }

        self.audit
            .record(
                RoleAuditLog::new(user_id, role_id, RoleAuditAction::Removed, removed_by)
                    .with_reason(reason),
            )
            .await;

        info!(
            user_id = %user_id,
            role = %role.name,
            removed_by = %removed_by,
            "Role removed from user"
        );
        Ok(())
    }

    /// Change or clear the expiry of an existing assignment
    pub async fn update_assignment_expiry(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
        updated_by: Uuid,
        reason: Option<String>,
    ) -> Result<UserRole> {
        tracked(
            "update_assignment",
            self.update_expiry_inner(user_id, role_id, expires_at, updated_by, reason)
                .await,
        )
    }

    async fn update_expiry_inner(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
        updated_by: Uuid,
        reason: Option<String>,
    ) -> Result<UserRole> {
        let mut assignment = self
            .store
            .get_assignment(user_id, role_id)
            .await?
            .ok_or(AppError::NotFound(EdgeKind::Assignment))?;

        assignment.expires_at = expires_at;
        self.store.upsert_assignment(&assignment).await?;

        self.audit
            .record(
                RoleAuditLog::new(user_id, role_id, RoleAuditAction::Updated, updated_by)
                    .with_reason(reason),
            )
            .await;

        info!(
            user_id = %user_id,
            role_id = %role_id,
            expires_at = ?expires_at,
            updated_by = %updated_by,
            "Role assignment expiry updated"
        );
        Ok(assignment)
    }
}
