pub mod pool;
pub mod repositories;

pub use pool::{create_pool, run_migrations, DbPool};
