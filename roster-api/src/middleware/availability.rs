/// Availability gate
///
/// Rejects every request it wraps with `503 Service Unavailable` while the
/// persistence client is not connected, before any handler runs. It is
/// layered onto the `/api` router only; `/health` stays reachable.
///
/// # Example
///
/// ```
/// use axum::{middleware, routing::get, Router};
/// use roster_api::app::AppState;
/// use roster_api::middleware::availability::require_database;
/// use roster_shared::DbClient;
/// use std::sync::Arc;
///
/// let state = AppState::new(Arc::new(DbClient::new()));
/// let api: Router = Router::new()
///     .route("/users", get(|| async { "[]" }))
///     .layer(middleware::from_fn_with_state(state.clone(), require_database))
///     .with_state(state);
/// ```

use crate::{app::AppState, error::ApiError};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Short-circuits with 503 unless the store is connected
pub async fn require_database(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.db.is_connected() {
        tracing::debug!(
            path = %req.uri().path(),
            state = ?state.db.state(),
            "Rejecting request, database not connected"
        );
        return Err(ApiError::ServiceUnavailable);
    }

    Ok(next.run(req).await)
}
