/// PostgreSQL-backed [`UserStore`]
///
/// Ids come from `gen_random_uuid()`, timestamps from `NOW()`, and the
/// `users_email_key` unique index rejects duplicate addresses.
///
/// # Example
///
/// ```no_run
/// use roster_shared::db::pool::DatabaseConfig;
/// use roster_shared::db::postgres::PgUserStore;
/// use roster_shared::db::store::UserStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = PgUserStore::connect(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
///
/// let users = store.find_all().await?;
/// println!("{} users", users.len());
/// # Ok(())
/// # }
/// ```

use crate::db::{
    migrations::{ensure_database_exists, run_migrations},
    pool::{create_pool, health_check, DatabaseConfig},
    store::{StoreError, StoreResult, UserStore},
};
use crate::models::user::{User, UserPatch, ValidNewUser};
use async_trait::async_trait;
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, age, city, created_at, updated_at";

/// PostgreSQL user store
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Wraps an existing pool; the schema must already be migrated
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the database if needed, opens a pool and runs migrations
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the pool cannot be opened or a
    /// migration fails.
    pub async fn connect(config: DatabaseConfig) -> StoreResult<Self> {
        // Roles without CREATEDB can still use a database that exists
        let limit = Duration::from_secs(config.connect_timeout_seconds);
        if let Err(e) = within(limit, ensure_database_exists(&config.url)).await {
            warn!(error = %e, "Could not ensure database exists");
        }
        let pool = create_pool(config).await?;
        run_migrations(&pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Bounds `fut` by `limit`, reporting an overrun as [`sqlx::Error::PoolTimedOut`]
async fn within<T, F>(limit: Duration, fut: F) -> Result<T, sqlx::Error>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or(Err(sqlx::Error::PoolTimedOut))
}

#[async_trait]
impl UserStore for PgUserStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn find_all(&self) -> StoreResult<Vec<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id");
        let users = sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    async fn insert(&self, user: ValidNewUser) -> StoreResult<User> {
        let query = format!(
            "INSERT INTO users (name, email, age, city) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );

        let created = sqlx::query_as::<_, User>(&query)
            .bind(&user.name)
            .bind(&user.email)
            .bind(user.age)
            .bind(&user.city)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::from_write(e, Some(&user.email)))?;

        Ok(created)
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> StoreResult<Option<User>> {
        // Build the SET list from the fields present in the patch
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if patch.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${bind_count}"));
        }
        if patch.email.is_some() {
            bind_count += 1;
            query.push_str(&format!(", email = ${bind_count}"));
        }
        if patch.age.is_some() {
            bind_count += 1;
            query.push_str(&format!(", age = ${bind_count}"));
        }
        if patch.city.is_some() {
            bind_count += 1;
            query.push_str(&format!(", city = ${bind_count}"));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {USER_COLUMNS}"));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(name) = &patch.name {
            q = q.bind(name);
        }
        if let Some(email) = &patch.email {
            q = q.bind(email);
        }
        if let Some(age) = patch.age {
            q = q.bind(age);
        }
        if let Some(city) = &patch.city {
            q = q.bind(city);
        }

        let updated = q
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::from_write(e, patch.email.as_deref()))?;

        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<Option<Uuid>> {
        let deleted = sqlx::query_scalar::<_, Uuid>("DELETE FROM users WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(deleted)
    }

    async fn ping(&self) -> StoreResult<()> {
        health_check(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
        info!("Database connection pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_within_bounds_a_stalled_call() {
        let started = tokio::time::Instant::now();

        let result = within(
            Duration::from_secs(3),
            std::future::pending::<Result<(), sqlx::Error>>(),
        )
        .await;

        assert!(matches!(result, Err(sqlx::Error::PoolTimedOut)));
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_within_passes_through_results() {
        let ok = within(Duration::from_secs(3), async { Ok::<_, sqlx::Error>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = within(Duration::from_secs(3), async {
            Err::<(), _>(sqlx::Error::RowNotFound)
        })
        .await;
        assert!(matches!(err, Err(sqlx::Error::RowNotFound)));
    }
}
