/// User CRUD endpoints
///
/// Each route maps to exactly one [`DbClient`](roster_shared::DbClient)
/// operation. All failures, body rejections included, go through
/// [`ApiError`].
///
/// # Endpoints
///
/// - `GET /api/users` - List users
/// - `POST /api/users` - Create user
/// - `PUT /api/users/:id` - Update user
/// - `DELETE /api/users/:id` - Delete user

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use roster_shared::models::user::{NewUser, User, UserChanges};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delete user response
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteUserResponse {
    /// Confirmation message
    pub message: String,

    /// Id of the removed user
    pub id: Uuid,
}

/// List users
///
/// # Endpoint
///
/// ```text
/// GET /api/users
/// ```
///
/// # Response
///
/// `200 OK` with a JSON array of users in store order, possibly empty.
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    let users = state.db.find_all().await?;
    Ok(Json(users))
}

/// Create user
///
/// # Endpoint
///
/// ```text
/// POST /api/users
/// Content-Type: application/json
///
/// {
///   "name": "Ada Lovelace",
///   "email": "ada@example.com",
///   "age": 36,
///   "city": "London"
/// }
/// ```
///
/// # Response
///
/// `201 Created` with the stored user, including `id`, `createdAt` and
/// `updatedAt`.
///
/// # Errors
///
/// - `400 Bad Request`: validation failed or the body is not valid JSON
/// - `409 Conflict`: email already in use
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let Json(candidate) = payload?;

    let user = state.db.create(candidate).await?;
    tracing::info!(user_id = %user.id, "Created user");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Update user
///
/// Applies only the fields present in the body. `age: null` clears the age
/// and `city: null` restores the default city.
///
/// # Endpoint
///
/// ```text
/// PUT /api/users/:id
/// Content-Type: application/json
///
/// { "city": "Kingston" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: malformed id, invalid field, or invalid JSON
/// - `404 Not Found`: no user with this id
/// - `409 Conflict`: new email already in use
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UserChanges>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let Json(changes) = payload?;

    let user = state.db.update_by_id(&id, changes).await?;
    tracing::info!(user_id = %user.id, "Updated user");

    Ok(Json(user))
}

/// Delete user
///
/// # Endpoint
///
/// ```text
/// DELETE /api/users/:id
/// ```
///
/// # Response
///
/// ```json
/// { "message": "User deleted", "id": "uuid" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: malformed id
/// - `404 Not Found`: no user with this id
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteUserResponse>> {
    let id = state.db.delete_by_id(&id).await?;
    tracing::info!(user_id = %id, "Deleted user");

    Ok(Json(DeleteUserResponse {
        message: "User deleted".to_string(),
        id,
    }))
}

/// Fallback for unmatched paths under `/api`
pub async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}
