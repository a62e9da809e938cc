// Permission domain model: `resource:action` names and categories

use crate::db::schema::{Permission, PermissionCategory};
use crate::domain::role::is_name_char;
use crate::errors::{AppError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const RESOURCE_LEN: (usize, usize) = (2, 100);
const ACTION_LEN: (usize, usize) = (2, 50);
const CATEGORY_NAME_LEN: (usize, usize) = (3, 100);

/// Build a standardized permission name
pub fn build_permission_name(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}

/// Split a permission name into `(resource, action)`. Exactly one colon is allowed.
pub fn parse_permission_name(name: &str) -> Option<(&str, &str)> {
    let mut parts = name.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(resource), Some(action), None) => Some((resource, action)),
        _ => None,
    }
}

fn validate_segment(name: &str, label: &str, value: &str, bounds: (usize, usize)) -> Result<()> {
    let len = value.chars().count();
    if len < bounds.0 || len > bounds.1 {
        return Err(AppError::invalid_name(
            name,
            format!("{} must be {}-{} characters", label, bounds.0, bounds.1),
        ));
    }
    if !value.chars().all(is_name_char) {
        return Err(AppError::invalid_name(
            name,
            format!("{} may only use lowercase letters, numbers, and underscores", label),
        ));
    }
    Ok(())
}

/// Validate that `name` is `resource:action` and matches the given halves
pub fn validate_permission_name(name: &str, resource: &str, action: &str) -> Result<()> {
    let (parsed_resource, parsed_action) = parse_permission_name(name).ok_or_else(|| {
        AppError::invalid_name(name, "use the format 'resource:action'")
    })?;

    validate_segment(name, "resource", parsed_resource, RESOURCE_LEN)?;
    validate_segment(name, "action", parsed_action, ACTION_LEN)?;

    if parsed_resource != resource || parsed_action != action {
        return Err(AppError::invalid_name(
            name,
            format!(
                "name must equal '{}'",
                build_permission_name(resource, action)
            ),
        ));
    }

    Ok(())
}

/// Input for creating a permission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPermission {
    pub name: String,
    pub resource: String,
    pub action: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub is_dangerous: bool,
}

impl NewPermission {
    /// Permission named after its resource and action
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        let resource = resource.into();
        let action = action.into();
        Self {
            name: build_permission_name(&resource, &action),
            resource,
            action,
            description: None,
            category_id: None,
            is_dangerous: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn dangerous(mut self, is_dangerous: bool) -> Self {
        self.is_dangerous = is_dangerous;
        self
    }

    pub fn into_permission(self) -> Result<Permission> {
        validate_permission_name(&self.name, &self.resource, &self.action)?;
        let now = Utc::now();
        Ok(Permission {
            id: Uuid::new_v4(),
            category_id: self.category_id,
            name: self.name,
            description: self.description,
            resource: self.resource,
            action: self.action,
            is_dangerous: self.is_dangerous,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Input for creating a permission category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

impl NewCategory {
    pub fn into_category(self) -> Result<PermissionCategory> {
        let len = self.name.trim().chars().count();
        if len < CATEGORY_NAME_LEN.0 || len > CATEGORY_NAME_LEN.1 {
            return Err(AppError::invalid_name(
                &self.name,
                format!(
                    "category names must be {}-{} characters",
                    CATEGORY_NAME_LEN.0, CATEGORY_NAME_LEN.1
                ),
            ));
        }

        Ok(PermissionCategory {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            description: self.description,
            sort_order: self.sort_order,
            created_at: Utc::now(),
        })
    }
}

/// Filters for listing permissions
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionListFilter {
    pub category_id: Option<Uuid>,
}
