//! Waitlist endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::waitlist::{Waitlist, WaitlistDetails, WaitlistQuery, WaitlistRemoval, WaitlistRequest},
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct LeaveWaitlistQuery {
    /// User to remove (librarians only); defaults to the caller
    pub user: Option<Uuid>,
}

/// What a removal did; `no_waitlist` and `not_queued` are not errors
#[derive(Debug, Serialize, ToSchema)]
pub struct RemovalResponse {
    /// `removed`, `not_queued` or `no_waitlist`
    pub outcome: String,
    /// Users still waiting after a removal
    pub remaining: Option<usize>,
}

impl From<WaitlistRemoval> for RemovalResponse {
    fn from(removal: WaitlistRemoval) -> Self {
        let outcome = match removal {
            WaitlistRemoval::Removed { .. } => "removed",
            WaitlistRemoval::NotQueued => "not_queued",
            WaitlistRemoval::NoWaitlist => "no_waitlist",
        };
        Self {
            outcome: outcome.to_string(),
            remaining: removal.remaining(),
        }
    }
}

/// List all waitlists
#[utoipa::path(
    get,
    path = "/waitlist",
    tag = "waitlist",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    params(WaitlistQuery),
    responses(
        (status = 200, description = "Waitlists with their books", body = PaginatedResponse<WaitlistDetails>),
        (status = 403, description = "Librarians only", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_waitlists(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<WaitlistQuery>,
) -> AppResult<Json<PaginatedResponse<WaitlistDetails>>> {
    user.require_librarian()?;

    let (waitlists, total) = state.services.waitlist.list(&query).await?;
    Ok(Json(PaginatedResponse::new(
        waitlists,
        total,
        query.page,
        query.per_page,
    )))
}

/// Waitlists the logged in member is queued on
#[utoipa::path(
    get,
    path = "/waitlist/mine",
    tag = "waitlist",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    responses((status = 200, description = "Own waitlists", body = Vec<WaitlistDetails>))
)]
pub async fn my_waitlist(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> AppResult<Json<Vec<WaitlistDetails>>> {
    user.require_member()?;

    Ok(Json(state.services.waitlist.for_user(&user).await?))
}

/// Waitlist of one book
#[utoipa::path(
    get,
    path = "/waitlist/{book_id}",
    tag = "waitlist",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    params(("book_id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Waitlist", body = Waitlist),
        (status = 404, description = "Nobody is waiting for this book", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_waitlist(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(book_id): Path<Uuid>,
) -> AppResult<Json<Waitlist>> {
    user.require_librarian()?;

    state
        .services
        .waitlist
        .get(book_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Nobody is waiting for this book".to_string()))
}

/// Join the waitlist of an unavailable book
#[utoipa::path(
    post,
    path = "/waitlist",
    tag = "waitlist",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    request_body = WaitlistRequest,
    responses(
        (status = 201, description = "Queued", body = Waitlist),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already queued", body = crate::error::ErrorResponse),
        (status = 422, description = "Book is available", body = crate::error::ErrorResponse)
    )
)]
pub async fn join_waitlist(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(request): Json<WaitlistRequest>,
) -> AppResult<(StatusCode, Json<Waitlist>)> {
    user.require_member()?;

    let waitlist = state.services.waitlist.add(&user, request.book).await?;
    Ok((StatusCode::CREATED, Json(waitlist)))
}

/// Leave a waitlist
#[utoipa::path(
    delete,
    path = "/waitlist/{book_id}",
    tag = "waitlist",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    params(("book_id" = Uuid, Path, description = "Book ID"), LeaveWaitlistQuery),
    responses(
        (status = 200, description = "Removal outcome", body = RemovalResponse),
        (status = 403, description = "Only librarians remove other users", body = crate::error::ErrorResponse)
    )
)]
pub async fn leave_waitlist(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(book_id): Path<Uuid>,
    Query(query): Query<LeaveWaitlistQuery>,
) -> AppResult<Json<RemovalResponse>> {
    let removal = state
        .services
        .waitlist
        .remove_for(&user, book_id, query.user)
        .await?;
    Ok(Json(removal.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removal_response() {
        let response = RemovalResponse::from(WaitlistRemoval::Removed { remaining: 0 });
        assert_eq!(response.outcome, "removed");
        assert_eq!(response.remaining, Some(0));

        let response = RemovalResponse::from(WaitlistRemoval::NoWaitlist);
        assert_eq!(response.outcome, "no_waitlist");
        assert_eq!(response.remaining, None);
    }
}
