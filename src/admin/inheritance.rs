use super::{tracked, PolicyAdmin};
use crate::db::schema::Role;
use crate::errors::Result;
use tracing::info;
use uuid::Uuid;

impl PolicyAdmin {
    /// Make `child_role_id` inherit every grant of `parent_role_id`.
    /// Adding an existing edge succeeds without change.
    pub async fn add_role_inheritance(
        &self,
        child_role_id: Uuid,
        parent_role_id: Uuid,
        added_by: Uuid,
    ) -> Result<()> {
        tracked(
            "add_inheritance",
            self.add_inheritance_inner(child_role_id, parent_role_id, added_by)
                .await,
        )
    }

    async fn add_inheritance_inner(
        &self,
        child_role_id: Uuid,
        parent_role_id: Uuid,
        added_by: Uuid,
    ) -> Result<()> {
        self.require_role(child_role_id).await?;
        self.require_role(parent_role_id).await?;

        if self
            .hierarchy
            .add_inheritance(child_role_id, parent_role_id)
            .await?
        {
            info!(
                child_role_id = %child_role_id,
                parent_role_id = %parent_role_id,
                added_by = %added_by,
                "Role inheritance added"
            );
        }
        Ok(())
    }

    pub async fn remove_role_inheritance(
        &self,
        child_role_id: Uuid,
        parent_role_id: Uuid,
        removed_by: Uuid,
    ) -> Result<()> {
        tracked(
            "remove_inheritance",
            self.hierarchy
                .remove_inheritance(child_role_id, parent_role_id)
                .await,
        )?;

        info!(
            child_role_id = %child_role_id,
            parent_role_id = %parent_role_id,
            removed_by = %removed_by,
            "Role inheritance removed"
        );
        Ok(())
    }

    /// Every role `role_id` inherits from, directly or transitively
    pub async fn get_role_ancestors(&self, role_id: Uuid) -> Result<Vec<Role>> {
        self.require_role(role_id).await?;
        let ancestors: Vec<Uuid> = self
            .hierarchy
            .get_ancestors(role_id)
            .await?
            .iter()
            .copied()
            .collect();
        self.store.get_roles(&ancestors).await
    }
}

#[cfg(test)]
mod tests {
    use crate::admin::testing::harness;
    use crate::domain::NewRole;
    use crate::errors::{AppError, EdgeKind};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_inheritance_requires_existing_roles() {
        let h = harness();
        let actor = Uuid::new_v4();
        let editor = h.admin.create_role(NewRole::new("editor"), actor).await.unwrap();

        let err = h
            .admin
            .add_role_inheritance(editor.id, Uuid::new_v4(), actor)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RoleNotFound(_)));
    }

    #[tokio::test]
    async fn test_cycle_scenarios() {
        let h = harness();
        let actor = Uuid::new_v4();
        let a = h.admin.create_role(NewRole::new("role_a"), actor).await.unwrap();
        let b = h.admin.create_role(NewRole::new("role_b"), actor).await.unwrap();
        let c = h.admin.create_role(NewRole::new("role_c"), actor).await.unwrap();

        h.admin.add_role_inheritance(a.id, b.id, actor).await.unwrap();
        let err = h.admin.add_role_inheritance(b.id, a.id, actor).await.unwrap_err();
        assert!(matches!(err, AppError::CircularInheritance));

        h.admin.add_role_inheritance(c.id, a.id, actor).await.unwrap();
        let err = h.admin.add_role_inheritance(a.id, c.id, actor).await.unwrap_err();
        assert!(matches!(err, AppError::CircularInheritance));

        // Duplicate edge is a no-op
        h.admin.add_role_inheritance(a.id, b.id, actor).await.unwrap();

        let names: Vec<String> = h
            .admin
            .get_role_ancestors(c.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["role_a".to_string(), "role_b".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_inheritance() {
        let h = harness();
        let actor = Uuid::new_v4();
        let a = h.admin.create_role(NewRole::new("role_a"), actor).await.unwrap();
        let b = h.admin.create_role(NewRole::new("role_b"), actor).await.unwrap();

        h.admin.add_role_inheritance(a.id, b.id, actor).await.unwrap();
        h.admin.remove_role_inheritance(a.id, b.id, actor).await.unwrap();

        let err = h
            .admin
            .remove_role_inheritance(a.id, b.id, actor)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(EdgeKind::Inheritance)));
    }
}
