use crate::audit::storage::AuditStorage;
use crate::config::{AuditConfig, AuditMode};
use crate::domain::audit::AuditRecord;
use crate::observability::MetricsRecorder;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

/// Audit writer that never fails its caller.
///
/// Write failures are logged and counted in `rbac_audit_write_failures_total`,
/// then dropped. Batched mode queues records for a background task that
/// flushes on size or interval; `shutdown` drains whatever is still queued.
pub struct AuditLogger {
    sink: Sink,
}

enum Sink {
    Disabled,
    Direct(Arc<dyn AuditStorage>),
    Batched {
        sender: RwLock<Option<mpsc::Sender<AuditRecord>>>,
        worker: Mutex<Option<JoinHandle<()>>>,
    },
}

impl AuditLogger {
    /// Build a logger from configuration. Batched mode spawns its worker and
    /// must be called inside a tokio runtime.
    pub fn from_config(storage: Arc<dyn AuditStorage>, config: &AuditConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }

        match config.mode {
            AuditMode::Direct => Self::direct(storage),
            AuditMode::Batched => Self::batched(
                storage,
                config.batch_size,
                config.flush_interval_ms,
                config.channel_buffer_size,
            ),
        }
    }

    pub fn disabled() -> Self {
        Self {
            sink: Sink::Disabled,
        }
    }

    /// Write each record before `record` returns
    pub fn direct(storage: Arc<dyn AuditStorage>) -> Self {
        Self {
            sink: Sink::Direct(storage),
        }
    }

    pub fn batched(
        storage: Arc<dyn AuditStorage>,
        batch_size: usize,
        flush_interval_ms: u64,
        channel_buffer_size: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(channel_buffer_size.max(1));
        let worker = tokio::spawn(batch_processor(
            receiver,
            storage,
            batch_size.max(1),
            flush_interval_ms.max(1),
        ));

        Self {
            sink: Sink::Batched {
                sender: RwLock::new(Some(sender)),
                worker: Mutex::new(Some(worker)),
            },
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.sink, Sink::Disabled)
    }

    /// Persist (or queue) one record. Never returns an error.
    pub async fn record(&self, record: impl Into<AuditRecord>) {
        let record = record.into();

        match &self.sink {
            Sink::Disabled => {}
            Sink::Direct(storage) => {
                let kind = record.kind();
                match storage.write_batch(std::slice::from_ref(&record)).await {
                    Ok(()) => MetricsRecorder::record_audit_written(kind, 1),
                    Err(e) => {
                        error!(kind, error = %e, "Audit write failed; record dropped");
                        MetricsRecorder::record_audit_failure(kind, 1);
                    }
                }
            }
            Sink::Batched { sender, .. } => {
                let Some(sender) = sender.read().await.clone() else {
                    error!(kind = record.kind(), "Audit logger is shut down; record dropped");
                    MetricsRecorder::record_audit_failure(record.kind(), 1);
                    return;
                };

                // Never wait on a full queue: a stalled sink must not hold up the caller
                match sender.try_send(record) {
                    Ok(()) => {}
                    Err(TrySendError::Full(record)) => {
                        error!(kind = record.kind(), "Audit queue full; record dropped");
                        MetricsRecorder::record_audit_failure(record.kind(), 1);
                    }
                    Err(TrySendError::Closed(record)) => {
                        error!(kind = record.kind(), "Audit queue closed; record dropped");
                        MetricsRecorder::record_audit_failure(record.kind(), 1);
                    }
                }
            }
        }
    }

    /// Stop accepting records and wait for the queue to drain
    pub async fn shutdown(&self) {
        let Sink::Batched { sender, worker } = &self.sink else {
            return;
        };

        // Dropping the last sender closes the channel and lets the worker exit
        sender.write().await.take();

        if let Some(handle) = worker.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Audit batch processor terminated abnormally");
            }
        }
    }
}

/// Background task that accumulates records and writes them in batches
async fn batch_processor(
    mut receiver: mpsc::Receiver<AuditRecord>,
    storage: Arc<dyn AuditStorage>,
    batch_size: usize,
    flush_interval_ms: u64,
) {
    let mut batch: Vec<AuditRecord> = Vec::with_capacity(batch_size);
    let mut flush_interval = interval(Duration::from_millis(flush_interval_ms));

    info!(batch_size, flush_interval_ms, "Audit batch processor started");

    loop {
        tokio::select! {
            received = receiver.recv() => match received {
                Some(record) => {
                    batch.push(record);
                    if batch.len() >= batch_size {
                        flush_batch(&mut batch, storage.as_ref()).await;
                    }
                }
                None => {
                    flush_batch(&mut batch, storage.as_ref()).await;
                    break;
                }
            },

            _ = flush_interval.tick() => {
                flush_batch(&mut batch, storage.as_ref()).await;
            }
        }
    }

    info!("Audit batch processor stopped");
}

async fn flush_batch(batch: &mut Vec<AuditRecord>, storage: &dyn AuditStorage) {
    if batch.is_empty() {
        return;
    }

    let mut per_kind: HashMap<&'static str, u64> = HashMap::new();
    for record in batch.iter() {
        *per_kind.entry(record.kind()).or_default() += 1;
    }

    let start = std::time::Instant::now();
    let result = storage.write_batch(batch).await;

    match result {
        Ok(()) => {
            debug!(count = batch.len(), elapsed = ?start.elapsed(), "Flushed audit batch");
            for (kind, count) in per_kind {
                MetricsRecorder::record_audit_written(kind, count);
            }
        }
        Err(e) => {
            error!(count = batch.len(), error = %e, "Audit batch write failed; records dropped");
            for (kind, count) in per_kind {
                MetricsRecorder::record_audit_failure(kind, count);
            }
        }
    }

    batch.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::storage::{FailingAuditStorage, InMemoryAuditStorage};
    use crate::domain::audit::{AuditStatus, PermissionAuditLog, RoleAuditAction, RoleAuditLog};
    use crate::errors::Result;
    use async_trait::async_trait;
    use uuid::Uuid;

    /// Storage whose writes hang far longer than any test waits
    struct StalledAuditStorage;

    #[async_trait]
    impl AuditStorage for StalledAuditStorage {
        async fn write_batch(&self, _records: &[AuditRecord]) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    fn check_log() -> PermissionAuditLog {
        PermissionAuditLog::new(Uuid::new_v4(), AuditStatus::Granted)
    }

    #[tokio::test]
    async fn test_direct_mode_writes_immediately() {
        let storage = InMemoryAuditStorage::new();
        let logger = AuditLogger::direct(Arc::new(storage.clone()));

        logger.record(check_log()).await;
        logger
            .record(RoleAuditLog::new(
                Uuid::new_v4(),
                Uuid::new_v4(),
                RoleAuditAction::Removed,
                Uuid::new_v4(),
            ))
            .await;

        assert_eq!(storage.records().await.len(), 2);
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed_and_counted() {
        let logger = AuditLogger::direct(Arc::new(FailingAuditStorage));
        let before = MetricsRecorder::audit_failures("permission_check");

        logger.record(check_log()).await;

        assert!(MetricsRecorder::audit_failures("permission_check") > before);
    }

    #[tokio::test]
    async fn test_disabled_logger_writes_nothing() {
        let logger = AuditLogger::disabled();
        assert!(!logger.is_enabled());
        logger.record(check_log()).await;
        logger.shutdown().await;
    }

    #[tokio::test]
    async fn test_batched_flushes_at_batch_size() {
        let storage = InMemoryAuditStorage::new();
        let logger = AuditLogger::batched(Arc::new(storage.clone()), 3, 60_000, 100);

        for _ in 0..3 {
            logger.record(check_log()).await;
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(storage.records().await.len(), 3);
        logger.shutdown().await;
    }

    #[tokio::test]
    async fn test_batched_flushes_on_interval() {
        let storage = InMemoryAuditStorage::new();
        let logger = AuditLogger::batched(Arc::new(storage.clone()), 100, 50, 100);

        logger.record(check_log()).await;
        logger.record(check_log()).await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(storage.records().await.len(), 2);
        logger.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let storage = InMemoryAuditStorage::new();
        let logger = AuditLogger::batched(Arc::new(storage.clone()), 100, 60_000, 100);

        for _ in 0..5 {
            logger.record(check_log()).await;
        }
        logger.shutdown().await;

        assert_eq!(storage.records().await.len(), 5);

        // Records after shutdown are dropped, not queued
        logger.record(check_log()).await;
        assert_eq!(storage.records().await.len(), 5);
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let logger = AuditLogger::batched(Arc::new(StalledAuditStorage), 1, 60_000, 1);
        let before = MetricsRecorder::audit_failures("permission_check");

        let recorded = tokio::time::timeout(Duration::from_secs(1), async {
            for _ in 0..4 {
                logger.record(check_log()).await;
                tokio::task::yield_now().await;
            }
        })
        .await;

        assert!(recorded.is_ok(), "record() waited on a stalled audit sink");
        assert!(MetricsRecorder::audit_failures("permission_check") >= before + 2);
    }
}
