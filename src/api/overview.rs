//! Dashboard overview endpoints

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    services::overview::{LibraryOverview, MemberOverview},
    AppState,
};

use super::AuthenticatedUser;

#[utoipa::path(
    get,
    path = "/overview",
    tag = "overview",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    responses(
        (status = 200, description = "Library figures", body = LibraryOverview),
        (status = 403, description = "Librarians only", body = crate::error::ErrorResponse)
    )
)]
pub async fn library_overview(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> AppResult<Json<LibraryOverview>> {
    user.require_librarian()?;

    Ok(Json(state.services.overview.library().await?))
}

#[utoipa::path(
    get,
    path = "/overview/member",
    tag = "overview",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    responses((status = 200, description = "Own borrowing figures", body = MemberOverview))
)]
pub async fn member_overview(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> AppResult<Json<MemberOverview>> {
    user.require_member()?;

    Ok(Json(state.services.overview.member(&user).await?))
}
