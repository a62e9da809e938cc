// Wiring of store, hierarchy, resolver, admin service and audit pipeline

use crate::admin::PolicyAdmin;
use crate::audit::{AuditLogger, AuditStorage, PostgresAuditStorage};
use crate::authz::PermissionResolver;
use crate::config::{AuditConfig, CacheConfig, Config};
use crate::db::{
    create_pool, run_migrations, PolicyStore, PostgresPolicyStore, PostgresUserDirectory,
    UserDirectory,
};
use crate::errors::Result;
use crate::graph::{AncestorCache, RoleHierarchy};
use crate::provision::provision_defaults;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// The policy engine as one value: resolution for enforcement points and
/// administration for management endpoints, sharing one store and one
/// ancestor cache.
pub struct PolicyEngine {
    store: Arc<dyn PolicyStore>,
    resolver: PermissionResolver,
    admin: PolicyAdmin,
    audit: Arc<AuditLogger>,
    pool: Option<PgPool>,
}

impl PolicyEngine {
    /// Assemble an engine from explicit collaborators. Batched audit mode
    /// spawns a task, so this must run inside a tokio runtime.
    pub fn from_parts(
        store: Arc<dyn PolicyStore>,
        users: Arc<dyn UserDirectory>,
        audit_storage: Arc<dyn AuditStorage>,
        cache: &CacheConfig,
        audit: &AuditConfig,
    ) -> Self {
        let ancestor_cache = cache
            .enabled
            .then(|| AncestorCache::new(Duration::from_secs(cache.ttl_seconds)));
        let hierarchy = Arc::new(RoleHierarchy::new(store.clone(), ancestor_cache));
        let audit = Arc::new(AuditLogger::from_config(audit_storage, audit));

        Self {
            resolver: PermissionResolver::new(store.clone(), hierarchy.clone(), audit.clone()),
            admin: PolicyAdmin::new(store.clone(), users, hierarchy, audit.clone()),
            store,
            audit,
            pool: None,
        }
    }

    /// Connect to Postgres, migrate, optionally seed defaults and build the engine
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = create_pool(&config.database).await?;
        run_migrations(&pool).await?;

        let store: Arc<dyn PolicyStore> = Arc::new(PostgresPolicyStore::new(pool.clone()));
        if config.seed.provision_defaults {
            provision_defaults(store.as_ref()).await?;
        }

        let mut engine = Self::from_parts(
            store,
            Arc::new(PostgresUserDirectory::new(pool.clone())),
            Arc::new(PostgresAuditStorage::new(pool.clone())),
            &config.cache,
            &config.audit,
        );
        engine.pool = Some(pool);

        info!(
            cache_enabled = config.cache.enabled,
            audit_enabled = config.audit.enabled,
            "Policy engine ready"
        );
        Ok(engine)
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    pub fn admin(&self) -> &PolicyAdmin {
        &self.admin
    }

    pub fn store(&self) -> Arc<dyn PolicyStore> {
        self.store.clone()
    }

    /// Connection pool when backed by Postgres
    pub fn pool(&self) -> Option<PgPool> {
        self.pool.clone()
    }

    /// Drain queued audit records
    pub async fn shutdown(&self) {
        self.audit.shutdown().await;
        info!("Policy engine shut down");
    }
}
