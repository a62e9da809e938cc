// Administrative policy mutations

mod assignments;
mod grants;
mod inheritance;
mod permissions;
mod roles;

use crate::audit::AuditLogger;
use crate::db::schema::{Permission, Role};
use crate::db::{PolicyStore, UserDirectory};
use crate::errors::{AppError, Result};
use crate::graph::RoleHierarchy;
use crate::observability::MetricsRecorder;
use std::sync::Arc;
use uuid::Uuid;

/// Role, permission, grant, assignment and inheritance management.
///
/// Every operation validates its inputs against the store and returns a
/// distinguishable error kind. Assignment changes write a role audit record;
/// definitions (roles, permissions, categories) are not audited.
pub struct PolicyAdmin {
    store: Arc<dyn PolicyStore>,
    users: Arc<dyn UserDirectory>,
    hierarchy: Arc<RoleHierarchy>,
    audit: Arc<AuditLogger>,
}

impl PolicyAdmin {
    pub fn new(
        store: Arc<dyn PolicyStore>,
        users: Arc<dyn UserDirectory>,
        hierarchy: Arc<RoleHierarchy>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            store,
            users,
            hierarchy,
            audit,
        }
    }

    async fn require_role(&self, role_id: Uuid) -> Result<Role> {
        self.store
            .get_role(role_id)
            .await?
            .ok_or(AppError::RoleNotFound(role_id))
    }

    async fn require_permission(&self, permission_id: Uuid) -> Result<Permission> {
        self.store
            .get_permission(permission_id)
            .await?
            .ok_or_else(|| AppError::PermissionNotFound(permission_id.to_string()))
    }

    async fn require_user(&self, user_id: Uuid) -> Result<()> {
        if self.users.user_exists(user_id).await? {
            Ok(())
        } else {
            Err(AppError::UserNotFound(user_id))
        }
    }
}

/// Count the outcome of an admin operation and pass the result through
fn tracked<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    MetricsRecorder::record_admin_operation(operation, result.is_ok());
    result
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::audit::storage::InMemoryAuditStorage;
    use crate::db::{InMemoryPolicyStore, InMemoryUserDirectory};

    pub struct Harness {
        pub store: InMemoryPolicyStore,
        pub users: InMemoryUserDirectory,
        pub audit: InMemoryAuditStorage,
        pub admin: PolicyAdmin,
    }

    pub fn harness() -> Harness {
        let store = InMemoryPolicyStore::new();
        let users = InMemoryUserDirectory::new();
        let audit = InMemoryAuditStorage::new();
        let hierarchy = Arc::new(RoleHierarchy::new(Arc::new(store.clone()), None));
        let admin = PolicyAdmin::new(
            Arc::new(store.clone()),
            Arc::new(users.clone()),
            hierarchy,
            Arc::new(AuditLogger::direct(Arc::new(audit.clone()))),
        );
        Harness {
            store,
            users,
            audit,
            admin,
        }
    }

    pub fn system_role(name: &str) -> Role {
        let now = chrono::Utc::now();
        Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            is_system_role: true,
            is_default: false,
            created_at: now,
            updated_at: now,
        }
    }
}
