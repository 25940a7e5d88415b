//! Book (catalog) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::book::{Book, BookDetails, BookQuery, BookWithGenres, CreateBook, UpdateBook},
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

/// List books with search, filters and pagination
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Matching books with their genres", body = PaginatedResponse<BookWithGenres>)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<PaginatedResponse<BookWithGenres>>> {
    let (books, total) = state.services.catalog.list_books(&query).await?;
    Ok(Json(PaginatedResponse::new(
        books,
        total,
        query.page,
        query.per_page,
    )))
}

/// Get a book with genres, reviews and waitlist
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = BookDetails),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookDetails>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Add a book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book added", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Librarians only", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(input): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    user.require_librarian()?;

    let book = state.services.catalog.add_book(input).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Add several books at once
#[utoipa::path(
    post,
    path = "/books/bulk",
    tag = "books",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    request_body = Vec<CreateBook>,
    responses(
        (status = 201, description = "Books added with consecutive numbers", body = Vec<Book>),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_books(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(inputs): Json<Vec<CreateBook>>,
) -> AppResult<(StatusCode, Json<Vec<Book>>)> {
    user.require_librarian()?;

    let books = state.services.catalog.add_books(inputs).await?;
    Ok((StatusCode::CREATED, Json(books)))
}

/// Update a book
#[utoipa::path(
    patch,
    path = "/books/{id}",
    tag = "books",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Book ID")),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Fewer copies than are issued", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    user.require_librarian()?;

    let book = state.services.catalog.update_book(id, patch).await?;
    Ok(Json(book))
}

/// Delete a book with its reviews, waitlist and issues
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_librarian()?;

    state.services.catalog.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
