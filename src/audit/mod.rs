pub mod logger;
pub mod storage;

pub use logger::AuditLogger;
pub use storage::{AuditStorage, InMemoryAuditStorage, PostgresAuditStorage};
