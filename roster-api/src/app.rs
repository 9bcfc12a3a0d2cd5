/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```
/// use roster_api::app::{build_router, AppState};
/// use roster_shared::db::memory::MemoryUserStore;
/// use roster_shared::DbClient;
/// use std::sync::Arc;
///
/// let db = Arc::new(DbClient::with_store(Arc::new(MemoryUserStore::new())));
/// let app = build_router(AppState::new(db));
/// ```

use crate::{middleware::availability::require_database, routes};
use axum::{
    routing::{get, put},
    Router,
};
use roster_shared::DbClient;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Persistence client, also the source of the connection state
    pub db: Arc<DbClient>,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: Arc<DbClient>) -> Self {
        Self { db }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health               # Liveness + database state (never gated)
/// └── /api/                     # Availability gate: 503 while disconnected
///     └── /users
///         ├── GET    /          # List users
///         ├── POST   /          # Create user
///         ├── PUT    /:id       # Update user
///         └── DELETE /:id       # Delete user
/// ```
///
/// # Middleware Stack
///
/// 1. Logging (tower-http TraceLayer), all routes
/// 2. Availability gate, `/api` only, including its 404 fallback
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let api_routes = Router::new()
        .route(
            "/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/users/:id",
            put(routes::users::update_user).delete(routes::users::delete_user),
        )
        .fallback(routes::users::route_not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_database,
        ));

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
