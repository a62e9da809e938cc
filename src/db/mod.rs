pub mod memory;
pub mod pool;
pub mod postgres;
pub mod schema;
pub mod store;
pub mod users;

pub use memory::{InMemoryPolicyStore, InMemoryUserDirectory};
pub use pool::{create_pool, health_check, run_migrations};
pub use postgres::PostgresPolicyStore;
pub use store::{InheritanceGuard, PolicyStore, UserDirectory};
pub use users::PostgresUserDirectory;
