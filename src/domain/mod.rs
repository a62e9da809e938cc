pub mod assignment;
pub mod audit;
pub mod permission;
pub mod role;

pub use assignment::{AssignRole, BulkUpdateSummary};
pub use audit::{
    AuditRecord, AuditStatus, PermissionAuditLog, RequestContext, RoleAuditAction, RoleAuditLog,
};
pub use permission::{
    build_permission_name, parse_permission_name, validate_permission_name, NewCategory,
    NewPermission, PermissionListFilter,
};
pub use role::{validate_role_name, NewRole, RoleListFilter, RoleUpdate, RoleWithPermissions};
