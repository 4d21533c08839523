// Public contact form

use crate::api::extract::Json;
use crate::api::routes::AppState;
use crate::api::users::MessageResponse;
use crate::errors::Result;
use crate::services::ContactMessage;
use axum::extract::State;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ContactRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 255))]
    pub subject: String,
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
}

/// POST /contact/send-email
#[tracing::instrument(skip(state, req))]
pub async fn send_email(
    State(state): State<AppState>,
    Json(req): Json<ContactRequest>,
) -> Result<Json<MessageResponse>> {
    req.validate()?;

    state
        .services
        .contact
        .send(ContactMessage {
            name: req.name,
            email: req.email,
            subject: req.subject,
            message: req.message,
        })
        .await?;

    Ok(MessageResponse::new("Message sent successfully"))
}
