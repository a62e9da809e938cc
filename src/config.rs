use crate::errors::{AppError, Result};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub audit: AuditConfig,
    pub observability: ObservabilityConfig,
    pub seed: SeedConfig,
}

/// Ops listener (health and metrics only)
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditMode {
    Direct,
    Batched,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    pub enabled: bool,
    pub mode: AuditMode,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub channel_buffer_size: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: AuditMode::Direct,
            batch_size: 100,
            flush_interval_ms: 1000,
            channel_buffer_size: 10000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    pub provision_defaults: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let environment =
            env::var("RBAC_ENGINE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(
                config::File::with_name(&format!("config/{}", environment)).required(false),
            )
            // e.g., RBAC_ENGINE__DATABASE__URL=postgres://...
            .add_source(
                config::Environment::with_prefix("RBAC_ENGINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Configuration(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Configuration("Invalid port number".to_string()));
        }

        if self.database.url.is_empty() {
            return Err(AppError::Configuration(
                "Database URL is required".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::Configuration(
                "database.min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.audit.mode == AuditMode::Batched {
            if self.audit.batch_size == 0 || self.audit.channel_buffer_size == 0 {
                return Err(AppError::Configuration(
                    "Batched audit mode needs a non-zero batch size and buffer".to_string(),
                ));
            }
            if self.audit.flush_interval_ms == 0 {
                return Err(AppError::Configuration(
                    "audit.flush_interval_ms must be positive".to_string(),
                ));
            }
        }

        if !["json", "pretty"].contains(&self.observability.log_format.as_str()) {
            return Err(AppError::Configuration(format!(
                "Unknown log format '{}'",
                self.observability.log_format
            )));
        }

        Ok(())
    }
}
