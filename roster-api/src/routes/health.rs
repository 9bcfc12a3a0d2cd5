/// Health check endpoint
///
/// Reports that the process is up and whether the database is connected.
/// The database is pinged on every call, and the result also updates the
/// state the availability gate reads. It is mounted outside `/api`, so the
/// gate never blocks it.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "server": "ok",
///   "database": "connected"
/// }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use roster_shared::ConnectionState;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "ok" when the process answers
    pub server: String,

    /// "connected" or "disconnected"
    pub database: String,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let database = if state.db.check().await == ConnectionState::Connected {
        "connected"
    } else {
        "disconnected"
    };

    Ok(Json(HealthResponse {
        server: "ok".to_string(),
        database: database.to_string(),
    }))
}
