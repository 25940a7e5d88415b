//! User management endpoints (librarian)

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::user::{UpdateRole, User, UserQuery},
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

/// List users with filters and pagination
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    params(UserQuery),
    responses(
        (status = 200, description = "List of users", body = PaginatedResponse<User>),
        (status = 403, description = "Librarians only", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<PaginatedResponse<User>>> {
    user.require_librarian()?;

    let (users, total) = state.services.users.list_users(&query).await?;
    Ok(Json(PaginatedResponse::new(
        users,
        total,
        query.page,
        query.per_page,
    )))
}

/// Get user by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    user.require_librarian()?;

    let found = state.services.users.get_by_id(id).await?;
    Ok(Json(found))
}

/// Change a user's role
#[utoipa::path(
    patch,
    path = "/users/{id}/role",
    tag = "users",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateRole,
    responses(
        (status = 200, description = "Role updated", body = User),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_role(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRole>,
) -> AppResult<Json<User>> {
    user.require_librarian()?;

    let updated = state.services.users.update_role(id, request.role).await?;
    Ok(Json(updated))
}
