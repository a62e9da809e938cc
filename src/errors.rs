use thiserror::Error;
use uuid::Uuid;

/// Which relationship edge a `NotFound` refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Grant,
    Assignment,
    Inheritance,
    Category,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Grant => "grant",
            EdgeKind::Assignment => "assignment",
            EdgeKind::Inheritance => "inheritance",
            EdgeKind::Category => "category",
        }
    }
}

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    // Store errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    DatabaseMigration(#[from] sqlx::migrate::MigrateError),

    // Name validation
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
    #[error("Name '{0}' already exists")]
    DuplicateName(String),

    // Lookups
    #[error("Role {0} not found")]
    RoleNotFound(Uuid),
    #[error("Permission not found: {0}")]
    PermissionNotFound(String),
    #[error("User {0} not found")]
    UserNotFound(Uuid),
    #[error("{} not found", .0.as_str())]
    NotFound(EdgeKind),

    // Policy invariants
    #[error("System roles cannot be modified or deleted")]
    SystemRoleImmutable,
    #[error("A role cannot inherit from itself")]
    SelfInheritance,
    #[error("Inheritance would create a cycle")]
    CircularInheritance,
    #[error("User already has this role")]
    AlreadyAssigned,
    #[error("Cannot remove a system role from yourself")]
    SystemRoleSelfRemoval,
    #[error("The default role cannot be deleted")]
    DefaultRoleUndeletable,

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub(crate) fn invalid_name(name: &str, reason: impl Into<String>) -> Self {
        AppError::InvalidName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code for callers that need to tell kinds apart
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::DatabaseMigration(_) => "store_error",
            AppError::InvalidName { .. } => "invalid_name",
            AppError::DuplicateName(_) => "duplicate_name",
            AppError::RoleNotFound(_) => "role_not_found",
            AppError::PermissionNotFound(_) => "permission_not_found",
            AppError::UserNotFound(_) => "user_not_found",
            AppError::NotFound(_) => "not_found",
            AppError::SystemRoleImmutable => "system_role_immutable",
            AppError::SelfInheritance => "self_inheritance",
            AppError::CircularInheritance => "circular_inheritance",
            AppError::AlreadyAssigned => "already_assigned",
            AppError::SystemRoleSelfRemoval => "system_role_self_removal",
            AppError::DefaultRoleUndeletable => "default_role_undeletable",
            AppError::Validation(_) => "validation_error",
            AppError::Configuration(_) => "configuration_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// True when the caller can fix the request; false for store or internal failures
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            AppError::Database(_)
                | AppError::DatabaseMigration(_)
                | AppError::Configuration(_)
                | AppError::Internal(_)
        )
    }

    /// Map a unique-key violation from the store to `DuplicateName`
    pub(crate) fn from_unique_violation(err: sqlx::Error, name: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some("23505") {
                return AppError::DuplicateName(name.to_string());
            }
        }
        AppError::Database(err)
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;
