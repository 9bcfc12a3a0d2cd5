//! # Roster Shared Library
//!
//! Types and persistence logic used by the Roster API server.
//!
//! ## Module Organization
//!
//! - `models`: the User entity and its validation rules
//! - `db`: connection pool, migrations, store implementations and the
//!   persistence client that owns the connection state

pub mod db;
pub mod models;

pub use db::client::{ConnectionState, DbClient, RetryPolicy};
pub use db::store::{StoreError, StoreResult, UserStore};
pub use models::user::{FieldError, User, ValidationFailure};
