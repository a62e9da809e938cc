pub mod resolver;

pub use resolver::{
    EffectivePermission, MultiCheckResult, PermissionCheckResult, PermissionResolver,
    UserPermissions,
};
