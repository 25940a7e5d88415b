//! Review endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::review::{CreateReview, ReviewDetails, UpdateReview},
    AppState,
};

use super::AuthenticatedUser;

/// All reviews, newest first
#[utoipa::path(
    get,
    path = "/reviews",
    tag = "reviews",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    responses(
        (status = 200, description = "Reviews", body = Vec<ReviewDetails>),
        (status = 403, description = "Librarians only", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> AppResult<Json<Vec<ReviewDetails>>> {
    user.require_librarian()?;

    Ok(Json(state.services.reviews.list().await?))
}

/// Reviews written by the logged in member
#[utoipa::path(
    get,
    path = "/reviews/mine",
    tag = "reviews",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    responses((status = 200, description = "Own reviews", body = Vec<ReviewDetails>))
)]
pub async fn my_reviews(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> AppResult<Json<Vec<ReviewDetails>>> {
    user.require_member()?;

    Ok(Json(state.services.reviews.for_member(&user).await?))
}

/// Reviews of one book
#[utoipa::path(
    get,
    path = "/books/{id}/reviews",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Reviews of the book", body = Vec<ReviewDetails>),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn book_reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<ReviewDetails>>> {
    Ok(Json(state.services.reviews.for_book(id).await?))
}

#[utoipa::path(
    get,
    path = "/reviews/{id}",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Review", body = ReviewDetails),
        (status = 404, description = "Review not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ReviewDetails>> {
    Ok(Json(state.services.reviews.get(id).await?))
}

/// Review a book (once per member)
#[utoipa::path(
    post,
    path = "/reviews",
    tag = "reviews",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    request_body = CreateReview,
    responses(
        (status = 201, description = "Review added", body = ReviewDetails),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book already reviewed", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_review(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(input): Json<CreateReview>,
) -> AppResult<(StatusCode, Json<ReviewDetails>)> {
    user.require_member()?;

    let review = state.services.reviews.add(&user, input).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

#[utoipa::path(
    patch,
    path = "/reviews/{id}",
    tag = "reviews",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Review ID")),
    request_body = UpdateReview,
    responses(
        (status = 200, description = "Review updated", body = ReviewDetails),
        (status = 403, description = "Not the author", body = crate::error::ErrorResponse),
        (status = 404, description = "Review not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_review(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateReview>,
) -> AppResult<Json<ReviewDetails>> {
    Ok(Json(state.services.reviews.update(&user, id, patch).await?))
}

#[utoipa::path(
    delete,
    path = "/reviews/{id}",
    tag = "reviews",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 403, description = "Neither the author nor a librarian", body = crate::error::ErrorResponse),
        (status = 404, description = "Review not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_review(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.reviews.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
