/// API route handlers
///
/// - `health`: liveness and database state, outside the gated `/api` tree
/// - `users`: CRUD over `/api/users`

pub mod health;
pub mod users;
