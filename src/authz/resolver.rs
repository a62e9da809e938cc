// Permission resolution over assignments, inheritance and grants

use crate::audit::AuditLogger;
use crate::db::schema::{Permission, Role};
use crate::db::PolicyStore;
use crate::domain::{AuditStatus, PermissionAuditLog, RequestContext};
use crate::errors::{AppError, Result};
use crate::graph::RoleHierarchy;
use crate::observability::MetricsRecorder;
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};
use uuid::Uuid;

/// Outcome of a single permission check
#[derive(Debug, Clone, Serialize)]
pub struct PermissionCheckResult {
    pub granted: bool,
    pub permission: Permission,
    /// Names of the caller's active (directly assigned) roles
    pub roles: Vec<String>,
}

/// Outcome of checking several permissions that must all hold
#[derive(Debug, Clone, Serialize)]
pub struct MultiCheckResult {
    pub granted: bool,
    pub granted_permissions: Vec<String>,
    pub denied_permissions: Vec<String>,
}

/// A permission in a user's effective set and the roles granting it directly
#[derive(Debug, Clone, Serialize)]
pub struct EffectivePermission {
    #[serde(flatten)]
    pub permission: Permission,
    pub granted_via: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserPermissions {
    pub user_id: Uuid,
    pub roles: Vec<Role>,
    pub permissions: Vec<EffectivePermission>,
}

/// Answers "what may this user do" from current store contents. Holds no
/// per-user state; only ancestor closures are memoized (by the hierarchy).
pub struct PermissionResolver {
    store: Arc<dyn PolicyStore>,
    hierarchy: Arc<RoleHierarchy>,
    audit: Arc<AuditLogger>,
}

impl PermissionResolver {
    pub fn new(
        store: Arc<dyn PolicyStore>,
        hierarchy: Arc<RoleHierarchy>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            store,
            hierarchy,
            audit,
        }
    }

    /// Roles assigned to `user_id` whose assignment has not expired. Inherited
    /// roles are not included.
    pub async fn get_active_roles(&self, user_id: Uuid) -> Result<Vec<Role>> {
        self.store.list_active_roles(user_id, Utc::now()).await
    }

    /// Active roles plus every ancestor of each, deduplicated
    pub async fn get_effective_role_set(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let active = self.get_active_roles(user_id).await?;
        let ids: Vec<Uuid> = active.iter().map(|role| role.id).collect();

        let mut effective: Vec<Uuid> = self
            .hierarchy
            .effective_role_set(&ids)
            .await?
            .into_iter()
            .collect();
        effective.sort();
        Ok(effective)
    }

    /// Names of every permission granted to any role in the effective role set
    pub async fn get_effective_permissions(&self, user_id: Uuid) -> Result<BTreeSet<String>> {
        let effective = self.get_effective_role_set(user_id).await?;
        let granted = self.store.list_granted_permissions(&effective).await?;

        Ok(granted
            .into_iter()
            .map(|grant| grant.permission.name)
            .collect())
    }

    /// Active roles and effective permissions annotated with the granting roles
    pub async fn get_user_permissions(&self, user_id: Uuid) -> Result<UserPermissions> {
        let roles = self.get_active_roles(user_id).await?;
        let active_ids: Vec<Uuid> = roles.iter().map(|role| role.id).collect();
        let effective: Vec<Uuid> = self
            .hierarchy
            .effective_role_set(&active_ids)
            .await?
            .into_iter()
            .collect();

        let role_names: HashMap<Uuid, String> = self
            .store
            .get_roles(&effective)
            .await?
            .into_iter()
            .map(|role| (role.id, role.name))
            .collect();

        let mut by_name: BTreeMap<String, EffectivePermission> = BTreeMap::new();
        for grant in self.store.list_granted_permissions(&effective).await? {
            let via = role_names.get(&grant.role_id).cloned();
            let entry = by_name
                .entry(grant.permission.name.clone())
                .or_insert_with(|| EffectivePermission {
                    permission: grant.permission,
                    granted_via: Vec::new(),
                });
            if let Some(via) = via {
                entry.granted_via.push(via);
            }
        }

        let permissions = by_name
            .into_values()
            .map(|mut effective| {
                effective.granted_via.sort();
                effective.granted_via.dedup();
                effective
            })
            .collect();

        Ok(UserPermissions {
            user_id,
            roles,
            permissions,
        })
    }

    /// Decide whether `user_id` holds `permission_name`.
    ///
    /// Exactly one permission audit record is written per call: `granted` or
    /// `denied` for a decision, `error` when the lookup or resolution fails.
    /// Audit failures never change the returned decision.
    pub async fn check_permission(
        &self,
        user_id: Uuid,
        permission_name: &str,
        resource_id: Option<String>,
        context: &RequestContext,
    ) -> Result<PermissionCheckResult> {
        let start = Instant::now();
        let outcome = self.evaluate(user_id, permission_name).await;

        let entry = PermissionAuditLog::new(
            user_id,
            match &outcome {
                Ok(result) => AuditStatus::from_decision(result.granted),
                Err(_) => AuditStatus::Error,
            },
        )
        .with_resource_id(resource_id.clone())
        .with_context(context);

        let entry = match &outcome {
            Ok(result) => entry
                .with_permission(result.permission.id)
                .with_metadata(serde_json::json!({
                    "permission_name": permission_name,
                    "resource_id": resource_id,
                    "user_roles": result.roles,
                })),
            Err(e) => entry.with_metadata(serde_json::json!({
                "permission_name": permission_name,
                "resource_id": resource_id,
                "error": e.code(),
            })),
        };
        let decision = entry.status.as_str();

        self.audit.record(entry).await;
        MetricsRecorder::record_permission_check(decision, start.elapsed().as_secs_f64());

        match &outcome {
            Ok(result) => debug!(
                user_id = %user_id,
                permission = permission_name,
                granted = result.granted,
                "Permission check evaluated"
            ),
            Err(AppError::PermissionNotFound(_)) => debug!(
                user_id = %user_id,
                permission = permission_name,
                "Permission check for unknown permission"
            ),
            Err(e) => error!(
                user_id = %user_id,
                permission = permission_name,
                error = %e,
                "Permission check failed"
            ),
        }

        outcome
    }

    async fn evaluate(&self, user_id: Uuid, permission_name: &str) -> Result<PermissionCheckResult> {
        let permission = self
            .store
            .get_permission_by_name(permission_name)
            .await?
            .ok_or_else(|| AppError::PermissionNotFound(permission_name.to_string()))?;

        let active = self.get_active_roles(user_id).await?;
        let active_ids: Vec<Uuid> = active.iter().map(|role| role.id).collect();
        let effective: Vec<Uuid> = self
            .hierarchy
            .effective_role_set(&active_ids)
            .await?
            .into_iter()
            .collect();

        let granted = self
            .store
            .list_granted_permissions(&effective)
            .await?
            .iter()
            .any(|grant| grant.permission.id == permission.id);

        Ok(PermissionCheckResult {
            granted,
            permission,
            roles: active.into_iter().map(|role| role.name).collect(),
        })
    }

    /// True as soon as one of `permission_names` is granted. Each evaluated
    /// name is audited; names after the first grant are not evaluated. A name
    /// that fails to resolve is skipped, and the last such error is returned
    /// only when nothing was granted.
    pub async fn check_any_permission(
        &self,
        user_id: Uuid,
        permission_names: &[&str],
        resource_id: Option<String>,
        context: &RequestContext,
    ) -> Result<bool> {
        let mut last_error = None;

        for name in permission_names {
            match self
                .check_permission(user_id, name, resource_id.clone(), context)
                .await
            {
                Ok(result) if result.granted => return Ok(true),
                Ok(_) => {}
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(false),
        }
    }

    /// Evaluate every name and report which were granted and which denied
    pub async fn check_all_permissions(
        &self,
        user_id: Uuid,
        permission_names: &[&str],
        resource_id: Option<String>,
        context: &RequestContext,
    ) -> Result<MultiCheckResult> {
        let mut granted_permissions = Vec::new();
        let mut denied_permissions = Vec::new();

        for name in permission_names {
            let result = self
                .check_permission(user_id, name, resource_id.clone(), context)
                .await?;
            if result.granted {
                granted_permissions.push(name.to_string());
            } else {
                denied_permissions.push(name.to_string());
            }
        }

        Ok(MultiCheckResult {
            granted: denied_permissions.is_empty(),
            granted_permissions,
            denied_permissions,
        })
    }
}
