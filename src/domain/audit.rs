use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome recorded for a permission check
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Granted,
    Denied,
    Error,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Granted => "granted",
            AuditStatus::Denied => "denied",
            AuditStatus::Error => "error",
        }
    }

    pub fn from_decision(granted: bool) -> Self {
        if granted {
            AuditStatus::Granted
        } else {
            AuditStatus::Denied
        }
    }
}

/// Administrative change recorded for a role assignment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoleAuditAction {
    Assigned,
    Removed,
    Updated,
}

impl RoleAuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleAuditAction::Assigned => "assigned",
            RoleAuditAction::Removed => "removed",
            RoleAuditAction::Updated => "updated",
        }
    }
}

/// Request-shaped context used only to enrich audit entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address,
            user_agent,
        }
    }
}

/// One resolved permission check. `permission_id` is absent when the lookup itself failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionAuditLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub permission_id: Option<Uuid>,
    pub resource_id: Option<String>,
    pub action: String,
    pub status: AuditStatus,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl PermissionAuditLog {
    pub fn new(user_id: Uuid, status: AuditStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            permission_id: None,
            resource_id: None,
            action: "check".to_string(),
            status,
            ip_address: None,
            user_agent: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    pub fn with_permission(mut self, permission_id: Uuid) -> Self {
        self.permission_id = Some(permission_id);
        self
    }

    pub fn with_resource_id(mut self, resource_id: Option<String>) -> Self {
        self.resource_id = resource_id;
        self
    }

    pub fn with_context(mut self, context: &RequestContext) -> Self {
        self.ip_address = context.ip_address.clone();
        self.user_agent = context.user_agent.clone();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// One administrative role mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAuditLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target_user_id: Uuid,
    pub role_id: Uuid,
    pub action: RoleAuditAction,
    pub reason: Option<String>,
    pub performed_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl RoleAuditLog {
    pub fn new(target_user_id: Uuid, role_id: Uuid, action: RoleAuditAction, performed_by: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: target_user_id,
            target_user_id,
            role_id,
            action,
            reason: None,
            performed_by,
            created_at: Utc::now(),
        }
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }
}

/// Anything the audit pipeline persists
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    PermissionCheck(PermissionAuditLog),
    RoleChange(RoleAuditLog),
}

impl AuditRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            AuditRecord::PermissionCheck(_) => "permission_check",
            AuditRecord::RoleChange(_) => "role_change",
        }
    }
}

impl From<PermissionAuditLog> for AuditRecord {
    fn from(log: PermissionAuditLog) -> Self {
        AuditRecord::PermissionCheck(log)
    }
}

impl From<RoleAuditLog> for AuditRecord {
    fn from(log: RoleAuditLog) -> Self {
        AuditRecord::RoleChange(log)
    }
}
