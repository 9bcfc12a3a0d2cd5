/// Store contract for User records
///
/// A [`UserStore`] is the raw persistence layer: it receives payloads that
/// already passed validation and is responsible only for id generation,
/// timestamps and enforcing the unique email index. Validation, id parsing
/// and connection state live one level up in [`DbClient`](crate::db::client::DbClient).
///
/// # Implementations
///
/// - [`PgUserStore`](crate::db::postgres::PgUserStore): PostgreSQL via sqlx
/// - [`MemoryUserStore`](crate::db::memory::MemoryUserStore): in-process,
///   same uniqueness rules, used by tests

use crate::models::user::{FieldError, User, UserPatch, ValidNewUser, ValidationFailure};
use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// One or more fields violated the schema
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    /// The identifier is not well formed for this store
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// No record has the given identifier
    #[error("User not found")]
    NotFound,

    /// A unique index rejected the write
    #[error("Duplicate key: {key} = {value}")]
    Duplicate {
        /// Indexed field
        key: String,

        /// Value that already exists
        value: String,
    },

    /// The store is not connected
    #[error("Database unavailable")]
    Unavailable,

    /// Anything else the store reported
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Builds a duplicate-email error for `email`
    pub fn duplicate_email(email: impl Into<String>) -> Self {
        StoreError::Duplicate {
            key: "email".to_string(),
            value: email.into(),
        }
    }

    /// Maps a failed write, recognising unique and check violations
    ///
    /// `email` is the address the write attempted to store, reported back in
    /// the duplicate error.
    pub fn from_write(err: sqlx::Error, email: Option<&str>) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or_default();
            match db_err.code().as_deref() {
                // unique_violation
                Some("23505") if constraint.contains("email") => {
                    return StoreError::duplicate_email(email.unwrap_or_default());
                }
                // check_violation
                Some("23514") if constraint.contains("age") => {
                    return ValidationFailure(vec![FieldError::new("age", "Age must be >= 0")])
                        .into();
                }
                Some("23514") if constraint.contains("name") => {
                    return ValidationFailure(vec![FieldError::new(
                        "name",
                        "Name must be at least 2 characters",
                    )])
                    .into();
                }
                _ => {}
            }
        }
        StoreError::from(err)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            // The server or pool is unreachable, not the query at fault
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => {
                warn!(error = %err, "Database connection failure");
                StoreError::Unavailable
            }
            err => StoreError::Database(err.to_string()),
        }
    }
}

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Raw CRUD over User records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// All records in store order
    async fn find_all(&self) -> StoreResult<Vec<User>>;

    /// Inserts a record, assigning id and timestamps
    async fn insert(&self, user: ValidNewUser) -> StoreResult<User>;

    /// Applies `patch` and refreshes `updated_at`; `None` if `id` is absent
    async fn update(&self, id: Uuid, patch: UserPatch) -> StoreResult<Option<User>>;

    /// Removes the record; returns its id, or `None` if `id` is absent
    async fn delete(&self, id: Uuid) -> StoreResult<Option<Uuid>>;

    /// Round-trips to the backing store
    ///
    /// [`StoreError::Unavailable`] means the connection is down.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Releases connections held by the store
    async fn close(&self) {}
}
