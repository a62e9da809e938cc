// Role assignment requests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Assign `role_id` to `user_id`, optionally until `expires_at`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRole {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl AssignRole {
    pub fn new(user_id: Uuid, role_id: Uuid) -> Self {
        Self {
            user_id,
            role_id,
            expires_at: None,
            reason: None,
        }
    }

    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Outcome of a diff-and-apply update of a role's grants
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUpdateSummary {
    pub granted: Vec<Uuid>,
    pub revoked: Vec<Uuid>,
    /// Revocations that failed and were skipped
    pub failed_revocations: Vec<Uuid>,
}
