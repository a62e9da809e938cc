// RBAC policy engine library

pub mod admin;
pub mod api;
pub mod audit;
pub mod authz;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod observability;
pub mod provision;

pub use admin::PolicyAdmin;
pub use authz::PermissionResolver;
pub use config::Config;
pub use engine::PolicyEngine;
pub use errors::{AppError, Result};
