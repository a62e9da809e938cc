// Default roles, categories and permissions

use crate::db::schema::{Permission, PermissionCategory, Role, RolePermission};
use crate::db::PolicyStore;
use crate::domain::{build_permission_name, NewCategory, NewPermission};
use crate::errors::Result;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

pub const ROLE_SUPER_ADMIN: &str = "super_admin";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";
pub const ROLE_CONTENT_CREATOR: &str = "content_creator";
pub const ROLE_MODERATOR: &str = "moderator";

struct CategorySeed {
    name: &'static str,
    description: &'static str,
    sort_order: i32,
}

const CATEGORIES: &[CategorySeed] = &[
    CategorySeed {
        name: "System Administration",
        description: "Platform configuration and access control",
        sort_order: 1,
    },
    CategorySeed {
        name: "User Management",
        description: "User accounts and profiles",
        sort_order: 2,
    },
    CategorySeed {
        name: "Content",
        description: "Pathways, modules and exercises",
        sort_order: 3,
    },
    CategorySeed {
        name: "Submissions",
        description: "Learner submissions and reviews",
        sort_order: 4,
    },
];

/// (resource, action, category, dangerous)
const PERMISSIONS: &[(&str, &str, &str, bool)] = &[
    ("system", "manage", "System Administration", true),
    ("role", "manage", "System Administration", true),
    ("permission", "manage", "System Administration", true),
    ("user", "manage", "User Management", true),
    ("user", "read", "User Management", false),
    ("user", "update", "User Management", false),
    ("pathway", "manage", "Content", false),
    ("pathway", "create", "Content", false),
    ("pathway", "read", "Content", false),
    ("pathway", "update", "Content", false),
    ("module", "manage", "Content", false),
    ("module", "create", "Content", false),
    ("module", "read", "Content", false),
    ("module", "update", "Content", false),
    ("exercise", "manage", "Content", false),
    ("exercise", "create", "Content", false),
    ("exercise", "read", "Content", false),
    ("exercise", "update", "Content", false),
    ("submission", "create", "Submissions", false),
    ("submission", "read", "Submissions", false),
    ("submission", "update", "Submissions", false),
];

struct RoleSeed {
    name: &'static str,
    description: &'static str,
    is_system_role: bool,
    is_default: bool,
    permissions: &'static [(&'static str, &'static str)],
}

const ROLES: &[RoleSeed] = &[
    RoleSeed {
        name: ROLE_SUPER_ADMIN,
        description: "Unrestricted platform access",
        is_system_role: true,
        is_default: false,
        permissions: &[
            ("system", "manage"),
            ("user", "manage"),
            ("role", "manage"),
            ("permission", "manage"),
        ],
    },
    RoleSeed {
        name: ROLE_ADMIN,
        description: "Manages users and content",
        is_system_role: true,
        is_default: false,
        permissions: &[
            ("user", "manage"),
            ("pathway", "manage"),
            ("module", "manage"),
            ("exercise", "manage"),
            ("submission", "read"),
        ],
    },
    RoleSeed {
        name: ROLE_USER,
        description: "Default role for every registered user",
        is_system_role: true,
        is_default: true,
        permissions: &[
            ("user", "read"),
            ("user", "update"),
            ("pathway", "read"),
            ("module", "read"),
            ("exercise", "read"),
            ("submission", "create"),
            ("submission", "read"),
        ],
    },
    RoleSeed {
        name: ROLE_CONTENT_CREATOR,
        description: "Authors learning content",
        is_system_role: false,
        is_default: false,
        permissions: &[
            ("pathway", "create"),
            ("pathway", "update"),
            ("module", "create"),
            ("module", "update"),
            ("exercise", "create"),
            ("exercise", "update"),
        ],
    },
    RoleSeed {
        name: ROLE_MODERATOR,
        description: "Reviews submissions and community content",
        is_system_role: false,
        is_default: false,
        permissions: &[
            ("user", "read"),
            ("submission", "read"),
            ("submission", "update"),
            ("pathway", "update"),
        ],
    },
];

/// What a provisioning run created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub categories_created: usize,
    pub permissions_created: usize,
    pub roles_created: usize,
    pub grants_created: usize,
}

/// Seed the default policy. Safe to run on every start: existing categories,
/// permissions and roles are left untouched, and default grants are only
/// applied to roles created by this run.
pub async fn provision_defaults(store: &dyn PolicyStore) -> Result<ProvisionReport> {
    let mut report = ProvisionReport::default();

    let mut categories: HashMap<String, Uuid> = store
        .list_categories()
        .await?
        .into_iter()
        .map(|category| (category.name, category.id))
        .collect();

    for seed in CATEGORIES {
        if categories.contains_key(seed.name) {
            continue;
        }
        let category: PermissionCategory = NewCategory {
            name: seed.name.to_string(),
            description: Some(seed.description.to_string()),
            sort_order: seed.sort_order,
        }
        .into_category()?;
        store.insert_category(&category).await?;
        categories.insert(category.name, category.id);
        report.categories_created += 1;
    }

    let mut permissions: HashMap<String, Uuid> = HashMap::new();
    for (resource, action, category, dangerous) in PERMISSIONS {
        let name = build_permission_name(resource, action);
        if let Some(existing) = store.get_permission_by_name(&name).await? {
            permissions.insert(name, existing.id);
            continue;
        }

        let mut new_permission = NewPermission::new(*resource, *action)
            .description(format!("{} {}", action, resource))
            .dangerous(*dangerous);
        if let Some(category_id) = categories.get(*category) {
            new_permission = new_permission.category(*category_id);
        }
        let permission: Permission = new_permission.into_permission()?;
        store.insert_permission(&permission).await?;
        permissions.insert(name, permission.id);
        report.permissions_created += 1;
    }

    for seed in ROLES {
        if store.get_role_by_name(seed.name).await?.is_some() {
            continue;
        }

        let now = Utc::now();
        let role = Role {
            id: Uuid::new_v4(),
            name: seed.name.to_string(),
            description: Some(seed.description.to_string()),
            is_system_role: seed.is_system_role,
            is_default: seed.is_default,
            created_at: now,
            updated_at: now,
        };
        store.insert_role(&role).await?;
        report.roles_created += 1;

        let grants: Vec<RolePermission> = seed
            .permissions
            .iter()
            .filter_map(|(resource, action)| {
                permissions.get(&build_permission_name(resource, action))
            })
            .map(|permission_id| RolePermission {
                role_id: role.id,
                permission_id: *permission_id,
                granted_at: now,
                granted_by: None,
            })
            .collect();
        store.upsert_grants(&grants).await?;
        report.grants_created += grants.len();
    }

    info!(
        categories = report.categories_created,
        permissions = report.permissions_created,
        roles = report.roles_created,
        grants = report.grants_created,
        "Default policy provisioned"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryPolicyStore;

    #[tokio::test]
    async fn test_provisioning_is_idempotent() {
        let store = InMemoryPolicyStore::new();

        let first = provision_defaults(&store).await.unwrap();
        assert_eq!(first.roles_created, 5);
        assert_eq!(first.categories_created, 4);
        assert_eq!(first.permissions_created, PERMISSIONS.len());

        let second = provision_defaults(&store).await.unwrap();
        assert_eq!(second, ProvisionReport::default());
        assert_eq!(store.grant_count().await, first.grants_created);
    }

    #[tokio::test]
    async fn test_system_and_default_flags() {
        let store = InMemoryPolicyStore::new();
        provision_defaults(&store).await.unwrap();

        let user = store.get_role_by_name(ROLE_USER).await.unwrap().unwrap();
        assert!(user.is_system_role);
        assert!(user.is_default);

        let moderator = store.get_role_by_name(ROLE_MODERATOR).await.unwrap().unwrap();
        assert!(!moderator.is_system_role);

        let super_admin = store.get_role_by_name(ROLE_SUPER_ADMIN).await.unwrap().unwrap();
        let names: Vec<String> = store
            .list_role_permissions(super_admin.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names.len(), 4);
        assert!(names.contains(&"system:manage".to_string()));

        let system_manage = store
            .get_permission_by_name("system:manage")
            .await
            .unwrap()
            .unwrap();
        assert!(system_manage.is_dangerous);
        assert!(system_manage.category_id.is_some());
    }
}
