//! Genre endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::genre::{CreateGenre, Genre, GenreQuery, UpdateGenre},
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

#[utoipa::path(
    get,
    path = "/genres",
    tag = "genres",
    params(GenreQuery),
    responses((status = 200, description = "List of genres", body = PaginatedResponse<Genre>))
)]
pub async fn list_genres(
    State(state): State<AppState>,
    Query(query): Query<GenreQuery>,
) -> AppResult<Json<PaginatedResponse<Genre>>> {
    let (genres, total) = state.services.catalog.list_genres(&query).await?;
    Ok(Json(PaginatedResponse::new(
        genres,
        total,
        query.page,
        query.per_page,
    )))
}

#[utoipa::path(
    get,
    path = "/genres/{id}",
    tag = "genres",
    params(("id" = Uuid, Path, description = "Genre ID")),
    responses(
        (status = 200, description = "Genre", body = Genre),
        (status = 404, description = "Genre not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_genre(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Genre>> {
    Ok(Json(state.services.catalog.get_genre(id).await?))
}

#[utoipa::path(
    post,
    path = "/genres",
    tag = "genres",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    request_body = CreateGenre,
    responses(
        (status = 201, description = "Genre created", body = Genre),
        (status = 409, description = "Duplicate name or slug", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_genre(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(input): Json<CreateGenre>,
) -> AppResult<(StatusCode, Json<Genre>)> {
    user.require_librarian()?;

    let genre = state.services.catalog.add_genre(input).await?;
    Ok((StatusCode::CREATED, Json(genre)))
}

#[utoipa::path(
    patch,
    path = "/genres/{id}",
    tag = "genres",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Genre ID")),
    request_body = UpdateGenre,
    responses(
        (status = 200, description = "Genre updated", body = Genre),
        (status = 404, description = "Genre not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Duplicate name or slug", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_genre(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateGenre>,
) -> AppResult<Json<Genre>> {
    user.require_librarian()?;

    Ok(Json(state.services.catalog.update_genre(id, patch).await?))
}

#[utoipa::path(
    delete,
    path = "/genres/{id}",
    tag = "genres",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Genre ID")),
    responses(
        (status = 204, description = "Genre deleted"),
        (status = 404, description = "Genre not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Genre still used by books", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_genre(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_librarian()?;

    state.services.catalog.delete_genre(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
