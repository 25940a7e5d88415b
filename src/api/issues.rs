//! Circulation endpoints: issuing and returning books

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::issue::{IssueBookRequest, IssueDetails, IssueQuery, ReturnBookRequest},
    services::circulation::{IssueOutcome, ReturnOutcome},
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

/// List all issues
#[utoipa::path(
    get,
    path = "/issues",
    tag = "issues",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    params(IssueQuery),
    responses(
        (status = 200, description = "Issues with user and book", body = PaginatedResponse<IssueDetails>),
        (status = 403, description = "Librarians only", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_issues(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<IssueQuery>,
) -> AppResult<Json<PaginatedResponse<IssueDetails>>> {
    user.require_librarian()?;

    let (issues, total) = state.services.circulation.list_issues(&query).await?;
    Ok(Json(PaginatedResponse::new(
        issues,
        total,
        query.page,
        query.per_page,
    )))
}

/// Issues of the logged in member
#[utoipa::path(
    get,
    path = "/issues/mine",
    tag = "issues",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    params(IssueQuery),
    responses((status = 200, description = "Own issues", body = PaginatedResponse<IssueDetails>))
)]
pub async fn my_issues(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<IssueQuery>,
) -> AppResult<Json<PaginatedResponse<IssueDetails>>> {
    user.require_member()?;

    let (page, per_page) = (query.page, query.per_page);
    let (issues, total) = state.services.circulation.my_issues(&user, query).await?;
    Ok(Json(PaginatedResponse::new(issues, total, page, per_page)))
}

/// Open issue by book number and user number
#[utoipa::path(
    get,
    path = "/issues/open/{book_id}/{user_id}",
    tag = "issues",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    params(
        ("book_id" = i32, Path, description = "Book number"),
        ("user_id" = i32, Path, description = "User number")
    ),
    responses(
        (status = 200, description = "Open issue", body = IssueDetails),
        (status = 404, description = "No open issue", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_open_issue(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((book_id, user_id)): Path<(i32, i32)>,
) -> AppResult<Json<IssueDetails>> {
    user.require_librarian()?;

    let issue = state
        .services
        .circulation
        .get_open_issue(book_id, user_id)
        .await?;
    Ok(Json(issue))
}

#[utoipa::path(
    get,
    path = "/issues/{id}",
    tag = "issues",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Issue ID")),
    responses(
        (status = 200, description = "Issue", body = IssueDetails),
        (status = 404, description = "Issue not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_issue(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<IssueDetails>> {
    let issue = state.services.circulation.get_issue(id).await?;
    if issue.user.id != user.id {
        user.require_librarian()?;
    }
    Ok(Json(issue))
}

/// Issue a book to a user
#[utoipa::path(
    post,
    path = "/issues",
    tag = "issues",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    request_body = IssueBookRequest,
    responses(
        (status = 201, description = "Book issued", body = IssueOutcome),
        (status = 404, description = "User or book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already issued to this user", body = crate::error::ErrorResponse),
        (status = 422, description = "Not available or borrowing limit reached", body = crate::error::ErrorResponse)
    )
)]
pub async fn issue_book(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(request): Json<IssueBookRequest>,
) -> AppResult<(StatusCode, Json<IssueOutcome>)> {
    user.require_librarian()?;

    let outcome = state.services.circulation.issue_book(request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Take a book back
#[utoipa::path(
    patch,
    path = "/issues/return",
    tag = "issues",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    request_body = ReturnBookRequest,
    responses(
        (status = 200, description = "Book returned", body = ReturnOutcome),
        (status = 404, description = "Book not issued to this user", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(request): Json<ReturnBookRequest>,
) -> AppResult<Json<ReturnOutcome>> {
    user.require_librarian()?;

    let outcome = state.services.circulation.return_book(request).await?;
    Ok(Json(outcome))
}
