//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{
    auth, books, contact, genres, health, issues, overview, reviews, users, waitlist,
    MessageResponse, SESSION_COOKIE,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "cookie_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE))),
            );
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Puthi Pallab API",
        version = "1.0.0",
        description = "Community library REST API: catalog, membership, circulation, waitlists and reviews"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::signup,
        auth::resend_verification,
        auth::verify_email,
        auth::login,
        auth::logout,
        auth::forgot_password,
        auth::reset_password,
        auth::update_password,
        auth::me,
        auth::update_me,
        // Users
        users::list_users,
        users::get_user,
        users::update_role,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::create_books,
        books::update_book,
        books::delete_book,
        // Genres
        genres::list_genres,
        genres::get_genre,
        genres::create_genre,
        genres::update_genre,
        genres::delete_genre,
        // Issues
        issues::list_issues,
        issues::my_issues,
        issues::get_open_issue,
        issues::get_issue,
        issues::issue_book,
        issues::return_book,
        // Waitlist
        waitlist::list_waitlists,
        waitlist::my_waitlist,
        waitlist::get_waitlist,
        waitlist::join_waitlist,
        waitlist::leave_waitlist,
        // Reviews
        reviews::list_reviews,
        reviews::my_reviews,
        reviews::book_reviews,
        reviews::get_review,
        reviews::create_review,
        reviews::update_review,
        reviews::delete_review,
        // Overview
        overview::library_overview,
        overview::member_overview,
        // Contact
        contact::send_message,
    ),
    components(
        schemas(
            // Auth
            auth::AuthResponse,
            auth::SignupResponse,
            crate::models::user::SignupRequest,
            crate::models::user::LoginRequest,
            crate::models::user::EmailRequest,
            crate::models::user::ResetPasswordRequest,
            crate::models::user::UpdatePasswordRequest,
            crate::models::user::UpdateProfile,
            // Users
            crate::models::user::User,
            crate::models::user::UserSummary,
            crate::models::user::UserQuery,
            crate::models::user::UpdateRole,
            crate::models::user::Role,
            crate::models::user::Gender,
            // Books
            crate::models::book::Book,
            crate::models::book::BookSummary,
            crate::models::book::BookWithGenres,
            crate::models::book::BookDetails,
            crate::models::book::BookQuery,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            // Genres
            crate::models::genre::Genre,
            crate::models::genre::GenreSummary,
            crate::models::genre::CreateGenre,
            crate::models::genre::UpdateGenre,
            // Issues
            crate::models::issue::Issue,
            crate::models::issue::IssueDetails,
            crate::models::issue::IssueStatus,
            crate::models::issue::IssueBookRequest,
            crate::models::issue::ReturnBookRequest,
            crate::services::circulation::IssueOutcome,
            crate::services::circulation::ReturnOutcome,
            // Waitlist
            crate::models::waitlist::Waitlist,
            crate::models::waitlist::WaitlistDetails,
            crate::models::waitlist::WaitlistRequest,
            waitlist::RemovalResponse,
            // Reviews
            crate::models::review::ReviewDetails,
            crate::models::review::ReviewBook,
            crate::models::review::ReviewMember,
            crate::models::review::CreateReview,
            crate::models::review::UpdateReview,
            // Overview
            crate::services::overview::LibraryOverview,
            crate::services::overview::MemberOverview,
            // Contact
            crate::services::email::ContactMessage,
            // Common
            MessageResponse,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Signup, login, verification and passwords"),
        (name = "users", description = "User management"),
        (name = "books", description = "Book catalog"),
        (name = "genres", description = "Genres"),
        (name = "issues", description = "Issuing and returning books"),
        (name = "waitlist", description = "Waitlists for unavailable books"),
        (name = "reviews", description = "Book reviews"),
        (name = "overview", description = "Dashboard figures"),
        (name = "contact", description = "Contact form")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
