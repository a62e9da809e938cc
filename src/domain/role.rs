// Role domain model and name validation

use crate::db::schema::Role;
use crate::errors::{AppError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ROLE_NAME_MIN_LEN: usize = 3;
pub const ROLE_NAME_MAX_LEN: usize = 100;

/// Lowercase ASCII letters, digits and underscore
pub(crate) fn is_name_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'
}

/// Validate a role name: 3-100 chars of `[a-z0-9_]`
pub fn validate_role_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if !(ROLE_NAME_MIN_LEN..=ROLE_NAME_MAX_LEN).contains(&len) {
        return Err(AppError::invalid_name(
            name,
            format!(
                "role names must be {}-{} characters",
                ROLE_NAME_MIN_LEN, ROLE_NAME_MAX_LEN
            ),
        ));
    }

    if !name.chars().all(is_name_char) {
        return Err(AppError::invalid_name(
            name,
            "use lowercase letters, numbers, and underscores only",
        ));
    }

    Ok(())
}

/// Input for creating a role through the administrative API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl NewRole {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            is_default: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn default_role(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    /// Validate and turn into a stored, non-system role
    pub fn into_role(self) -> Result<Role> {
        validate_role_name(&self.name)?;
        let now = Utc::now();
        Ok(Role {
            id: Uuid::new_v4(),
            name: self.name,
            description: self.description,
            is_system_role: false,
            is_default: self.is_default,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_default: Option<bool>,
}

impl RoleUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.is_default.is_none()
    }

    /// Apply onto an existing role. System roles are rejected outright.
    pub fn apply_to(&self, role: &mut Role) -> Result<()> {
        if role.is_system_role {
            return Err(AppError::SystemRoleImmutable);
        }

        if let Some(ref name) = self.name {
            validate_role_name(name)?;
            role.name = name.clone();
        }
        if let Some(ref description) = self.description {
            role.description = Some(description.clone());
        }
        if let Some(is_default) = self.is_default {
            role.is_default = is_default;
        }
        role.updated_at = Utc::now();

        Ok(())
    }
}

/// Filters for listing roles
#[derive(Debug, Clone, Copy)]
pub struct RoleListFilter {
    pub include_system: bool,
}

impl Default for RoleListFilter {
    fn default() -> Self {
        Self {
            include_system: true,
        }
    }
}

/// A role with its direct grants and number of active holders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<crate::db::schema::Permission>,
    pub user_count: i64,
}
