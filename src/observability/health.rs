use serde::{Deserialize, Serialize};
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthChecks {
    pub policy_store: ComponentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub status: String,
    pub message: Option<String>,
}

impl ComponentStatus {
    fn with_status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            message: None,
        }
    }
}

/// Probes the policy store. Without a pool the engine runs on the in-memory
/// store, which is always ready.
pub struct HealthChecker {
    db_pool: Option<PgPool>,
}

impl HealthChecker {
    pub fn new(db_pool: Option<PgPool>) -> Self {
        Self { db_pool }
    }

    /// Liveness check - is the process running?
    pub async fn liveness(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks: HealthChecks {
                policy_store: ComponentStatus::with_status("unknown"),
            },
        }
    }

    /// Readiness check - can the engine answer permission checks?
    pub async fn readiness(&self) -> HealthStatus {
        let store_status = self.check_policy_store().await;

        let overall_status = if store_status.status == "error" {
            "degraded"
        } else {
            "ok"
        };

        HealthStatus {
            status: overall_status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks: HealthChecks {
                policy_store: store_status,
            },
        }
    }

    async fn check_policy_store(&self) -> ComponentStatus {
        let Some(pool) = &self.db_pool else {
            return ComponentStatus::with_status("in_memory");
        };

        match crate::db::health_check(pool).await {
            Ok(_) => ComponentStatus::with_status("ok"),
            Err(e) => ComponentStatus {
                status: "error".to_string(),
                message: Some(format!("Policy store check failed: {}", e)),
            },
        }
    }
}
