/// Middleware modules for the API server
///
/// - `availability`: 503 gate in front of `/api` while the database is down

pub mod availability;
