use crate::domain::audit::{AuditRecord, PermissionAuditLog, RoleAuditLog};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::error;

/// Trait for audit record storage backends
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Write a batch of audit records to storage
    async fn write_batch(&self, records: &[AuditRecord]) -> Result<()>;
}

/// PostgreSQL storage backend writing `permission_audit_log` and `role_audit_log`
pub struct PostgresAuditStorage {
    pool: PgPool,
}

impl PostgresAuditStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_permission_check(
        tx: &mut Transaction<'_, Postgres>,
        log: &PermissionAuditLog,
    ) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO permission_audit_log (
                id, user_id, permission_id, resource_id, action, status,
                ip_address, user_agent, metadata, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(log.id)
        .bind(log.user_id)
        .bind(log.permission_id)
        .bind(&log.resource_id)
        .bind(&log.action)
        .bind(log.status.as_str())
        .bind(&log.ip_address)
        .bind(&log.user_agent)
        .bind(&log.metadata)
        .bind(log.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn insert_role_change(
        tx: &mut Transaction<'_, Postgres>,
        log: &RoleAuditLog,
    ) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO role_audit_log (
                id, user_id, target_user_id, role_id, action, reason, performed_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(log.id)
        .bind(log.user_id)
        .bind(log.target_user_id)
        .bind(log.role_id)
        .bind(log.action.as_str())
        .bind(&log.reason)
        .bind(log.performed_by)
        .bind(log.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl AuditStorage for PostgresAuditStorage {
    async fn write_batch(&self, records: &[AuditRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for record in records {
            let inserted = match record {
                AuditRecord::PermissionCheck(log) => {
                    Self::insert_permission_check(&mut tx, log).await
                }
                AuditRecord::RoleChange(log) => Self::insert_role_change(&mut tx, log).await,
            };

            inserted.map_err(|e| {
                error!(kind = record.kind(), error = ?e, "Failed to insert audit record");
                AppError::Database(e)
            })?;
        }

        tx.commit().await?;

        Ok(())
    }
}

/// Keeps records in process memory; backs the in-memory engine and tests
#[derive(Clone, Default)]
pub struct InMemoryAuditStorage {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl InMemoryAuditStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }

    pub async fn permission_checks(&self) -> Vec<PermissionAuditLog> {
        self.records
            .lock()
            .await
            .iter()
            .filter_map(|record| match record {
                AuditRecord::PermissionCheck(log) => Some(log.clone()),
                AuditRecord::RoleChange(_) => None,
            })
            .collect()
    }

    pub async fn role_changes(&self) -> Vec<RoleAuditLog> {
        self.records
            .lock()
            .await
            .iter()
            .filter_map(|record| match record {
                AuditRecord::RoleChange(log) => Some(log.clone()),
                AuditRecord::PermissionCheck(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl AuditStorage for InMemoryAuditStorage {
    async fn write_batch(&self, records: &[AuditRecord]) -> Result<()> {
        self.records.lock().await.extend_from_slice(records);
        Ok(())
    }
}

/// Backend that rejects every write
#[cfg(test)]
pub struct FailingAuditStorage;

#[cfg(test)]
#[async_trait]
impl AuditStorage for FailingAuditStorage {
    async fn write_batch(&self, _records: &[AuditRecord]) -> Result<()> {
        Err(AppError::Internal("audit sink unavailable".to_string()))
    }
}
