//! Public contact form

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::{error::AppResult, services::email::ContactMessage, AppState};

use super::MessageResponse;

#[utoipa::path(
    post,
    path = "/contact",
    tag = "contact",
    request_body = ContactMessage,
    responses(
        (status = 201, description = "Message relayed to the library", body = MessageResponse),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 500, description = "Message could not be sent", body = crate::error::ErrorResponse)
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    Json(message): Json<ContactMessage>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    message.validate()?;
    state.services.email.send_contact_message(&message).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Message sent successfully")),
    ))
}
