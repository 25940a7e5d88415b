//! API handlers for Puthi Pallab REST endpoints

pub mod auth;
pub mod books;
pub mod contact;
pub mod genres;
pub mod health;
pub mod issues;
pub mod openapi;
pub mod overview;
pub mod reviews;
pub mod users;
pub mod waitlist;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        request::Parts,
        HeaderMap, HeaderValue, Method,
    },
    routing::{get, patch, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::User, AppState};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "jwt";

/// Extractor for the logged in user, from the session cookie or a Bearer token
pub struct AuthenticatedUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or_else(|| {
            AppError::Authentication(
                "You are not logged in! Please log in to get access.".to_string(),
            )
        })?;

        let user = state.services.users.authenticate_token(&token).await?;
        Ok(AuthenticatedUser(user))
    }
}

/// Session token carried by a request; the cookie wins over the header
pub(crate) fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Http-only cookie carrying a session token
pub(crate) fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(if secure { SameSite::None } else { SameSite::Lax })
        .build()
}

/// Paginated response wrapper
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PaginatedResponse<T>
where
    T: for<'a> utoipa::ToSchema<'a>,
{
    /// Items of the requested page
    pub items: Vec<T>,
    /// Total number of matching items
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Items per page
    pub per_page: i64,
}

impl<T> PaginatedResponse<T>
where
    T: for<'a> utoipa::ToSchema<'a>,
{
    pub fn new(items: Vec<T>, total: i64, page: Option<i64>, per_page: Option<i64>) -> Self {
        let window = crate::models::Page::new(page, per_page);
        Self {
            items,
            total,
            page: window.page,
            per_page: window.per_page,
        }
    }
}

/// Plain confirmation message
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.allowed_origins);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication and membership
        .route("/users/signup", post(auth::signup))
        .route("/users/resend-verification", post(auth::resend_verification))
        .route("/users/verify-email/:token", patch(auth::verify_email))
        .route("/users/login", post(auth::login))
        .route("/users/logout", get(auth::logout))
        .route("/users/forgot-password", post(auth::forgot_password))
        .route("/users/reset-password/:token", patch(auth::reset_password))
        .route("/users/update-password", patch(auth::update_password))
        .route("/users/me", get(auth::me))
        .route("/users/update-me", patch(auth::update_me))
        // Users
        .route("/users", get(users::list_users))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/role", patch(users::update_role))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/bulk", post(books::create_books))
        .route(
            "/books/:id",
            get(books::get_book)
                .patch(books::update_book)
                .delete(books::delete_book),
        )
        .route("/books/:id/reviews", get(reviews::book_reviews))
        // Genres
        .route("/genres", get(genres::list_genres).post(genres::create_genre))
        .route(
            "/genres/:id",
            get(genres::get_genre)
                .patch(genres::update_genre)
                .delete(genres::delete_genre),
        )
        // Issues
        .route("/issues", get(issues::list_issues).post(issues::issue_book))
        .route("/issues/mine", get(issues::my_issues))
        .route("/issues/return", patch(issues::return_book))
        .route("/issues/open/:book_id/:user_id", get(issues::get_open_issue))
        .route("/issues/:id", get(issues::get_issue))
        // Waitlist
        .route("/waitlist", get(waitlist::list_waitlists).post(waitlist::join_waitlist))
        .route("/waitlist/mine", get(waitlist::my_waitlist))
        .route("/waitlist/:book_id", get(waitlist::get_waitlist).delete(waitlist::leave_waitlist))
        // Reviews
        .route("/reviews", get(reviews::list_reviews).post(reviews::create_review))
        .route("/reviews/mine", get(reviews::my_reviews))
        .route(
            "/reviews/:id",
            get(reviews::get_review)
                .patch(reviews::update_review)
                .delete(reviews::delete_review),
        )
        // Overview
        .route("/overview", get(overview::library_overview))
        .route("/overview/member", get(overview::member_overview))
        // Contact
        .route("/contact", post(contact::send_message))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_token_prefers_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("theme=dark; jwt=from-cookie"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(session_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_session_token_from_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert!(session_token(&headers).is_none());
    }

    #[test]
    fn test_logged_out_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("jwt="));
        assert!(session_token(&headers).is_none());
    }

    #[test]
    fn test_session_cookie_flags() {
        let cookie = session_cookie("token".to_string(), true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
    }

    #[test]
    fn test_pagination_echoes_clamped_window() {
        let page = PaginatedResponse::new(
            vec![MessageResponse::new("a"), MessageResponse::new("b")],
            42,
            Some(0),
            Some(500),
        );
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 100);
        assert_eq!(page.total, 42);
    }
}
