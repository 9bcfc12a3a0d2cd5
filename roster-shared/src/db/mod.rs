/// Database layer for Roster
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with a `SELECT 1` health check
/// - `migrations`: embedded sqlx migrations and database bootstrap
/// - `store`: the `UserStore` trait and `StoreError`
/// - `postgres`: `UserStore` over PostgreSQL
/// - `memory`: `UserStore` held in process memory
/// - `client`: `DbClient`, the persistence client handlers talk to
///
/// # Example
///
/// ```
/// use roster_shared::db::client::DbClient;
/// use roster_shared::db::memory::MemoryUserStore;
/// use std::sync::Arc;
///
/// let client = DbClient::with_store(Arc::new(MemoryUserStore::new()));
/// assert!(client.is_connected());
/// ```

pub mod client;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod postgres;
pub mod store;
