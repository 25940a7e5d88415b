//! Authentication and membership endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::user::{
        EmailRequest, LoginRequest, ResetPasswordRequest, SignupRequest, UpdatePasswordRequest,
        UpdateProfile, User,
    },
    services::users::Session,
    AppState,
};

use super::{session_cookie, AuthenticatedUser, MessageResponse, SESSION_COOKIE};

/// Session response; the token is also set as the `jwt` cookie
#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Serialize, ToSchema)]
pub struct SignupResponse {
    pub message: String,
    pub user: User,
    /// False when the verification email could not be sent; the user may ask for a new one
    pub verification_email_sent: bool,
}

fn start_session(state: &AppState, jar: CookieJar, session: Session) -> (CookieJar, Json<AuthResponse>) {
    let jar = jar.add(session_cookie(
        session.token.clone(),
        state.config.auth.cookie_secure,
    ));
    (
        jar,
        Json(AuthResponse {
            token: session.token,
            user: session.user,
        }),
    )
}

/// Register a new member
#[utoipa::path(
    post,
    path = "/users/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = SignupResponse),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    let outcome = state.services.users.signup(request).await?;

    let message = if outcome.verification_email_sent {
        "Verification email sent to your email!"
    } else {
        "Account created, but the verification email could not be sent. Please request a new one."
    };

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: message.to_string(),
            user: outcome.user,
            verification_email_sent: outcome.verification_email_sent,
        }),
    ))
}

/// Send a new verification link
#[utoipa::path(
    post,
    path = "/users/resend-verification",
    tag = "auth",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Verification email sent", body = MessageResponse),
        (status = 404, description = "Unknown email", body = crate::error::ErrorResponse),
        (status = 409, description = "Already verified", body = crate::error::ErrorResponse)
    )
)]
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    request.validate()?;
    state
        .services
        .users
        .resend_verification(&request.email)
        .await?;
    Ok(Json(MessageResponse::new(
        "Verification email sent to your email!",
    )))
}

/// Confirm an email address with the emailed token
#[utoipa::path(
    patch,
    path = "/users/verify-email/{token}",
    tag = "auth",
    params(("token" = String, Path, description = "Verification token from the email")),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Token invalid or expired", body = crate::error::ErrorResponse)
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    state.services.users.verify_email(&token).await?;
    Ok(Json(MessageResponse::new(
        "Your email has been verified. You can log in now.",
    )))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/users/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Missing email or password", body = crate::error::ErrorResponse),
        (status = 401, description = "Incorrect email or password", body = crate::error::ErrorResponse),
        (status = 403, description = "Email not verified (is_verified = false)", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let session = state.services.users.login(request).await?;
    Ok(start_session(&state, jar, session))
}

/// Log out by clearing the session cookie
#[utoipa::path(
    get,
    path = "/users/logout",
    tag = "auth",
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Json(MessageResponse::new("Logged out")))
}

/// Email a password reset link
#[utoipa::path(
    post,
    path = "/users/forgot-password",
    tag = "auth",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Reset token sent", body = MessageResponse),
        (status = 404, description = "Unknown email", body = crate::error::ErrorResponse),
        (status = 500, description = "Email could not be sent", body = crate::error::ErrorResponse)
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    request.validate()?;
    state.services.users.forgot_password(&request.email).await?;
    Ok(Json(MessageResponse::new("Token sent to email!")))
}

/// Set a new password with a reset token
#[utoipa::path(
    patch,
    path = "/users/reset-password/{token}",
    tag = "auth",
    params(("token" = String, Path, description = "Reset token from the email")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset, logged in", body = AuthResponse),
        (status = 400, description = "Token invalid or expired", body = crate::error::ErrorResponse)
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(token): Path<String>,
    Json(request): Json<ResetPasswordRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let session = state.services.users.reset_password(&token, request).await?;
    Ok(start_session(&state, jar, session))
}

/// Change own password
#[utoipa::path(
    patch,
    path = "/users/update-password",
    tag = "auth",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password changed, new session", body = AuthResponse),
        (status = 401, description = "Current password is wrong", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_password(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    jar: CookieJar,
    Json(request): Json<UpdatePasswordRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let session = state.services.users.update_password(&user, request).await?;
    Ok(start_session(&state, jar, session))
}

/// Get current user profile
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "auth",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not logged in", body = crate::error::ErrorResponse)
    )
)]
pub async fn me(AuthenticatedUser(user): AuthenticatedUser) -> Json<User> {
    Json(user)
}

/// Update own profile
#[utoipa::path(
    patch,
    path = "/users/update-me",
    tag = "auth",
    security(("cookie_auth" = []), ("bearer_auth" = [])),
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Invalid input or password fields present", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_me(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(profile): Json<UpdateProfile>,
) -> AppResult<Json<User>> {
    let user = state.services.users.update_me(&user, profile).await?;
    Ok(Json(user))
}
