// User account and password-recovery endpoints

use crate::api::extract::{Json, Path, Query};
use crate::api::routes::AppState;
use crate::domain::user::User;
use crate::errors::Result;
use crate::services::{AccountUpdate, ProfileUpdate, Registration};
use axum::{extract::State, http::StatusCode, Extension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub password: String,
    pub company: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct OtpRequestQuery {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    #[serde(alias = "otp")]
    pub otp_code: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /users/create-user
#[tracing::instrument(skip(state, req))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    req.validate()?;

    let user = state
        .services
        .credentials
        .register(Registration {
            email: req.email,
            name: req.name,
            password: req.password,
            company: req.company,
            phone: req.phone,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users/me
pub async fn me(State(state): State<AppState>, Extension(caller): Extension<User>) -> Result<Json<User>> {
    Ok(Json(state.services.credentials.me(&caller).await?))
}

/// PUT /users/:id
#[tracing::instrument(skip(state, caller, req), fields(caller_id = %caller.id))]
pub async fn update_account(
    State(state): State<AppState>,
    Extension(caller): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateAccountRequest>,
) -> Result<Json<User>> {
    req.validate()?;

    let user = state
        .services
        .credentials
        .update_account(
            &caller,
            user_id,
            AccountUpdate {
                name: req.name,
                company: req.company,
                phone: req.phone,
                password: req.password,
            },
        )
        .await?;

    Ok(Json(user))
}

/// PATCH /users/:id/profile
#[tracing::instrument(skip(state, caller, req), fields(caller_id = %caller.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    req.validate()?;

    let user = state
        .services
        .credentials
        .update_profile(
            &caller,
            user_id,
            ProfileUpdate {
                name: req.name,
                email: req.email,
                company: req.company,
                phone: req.phone,
            },
        )
        .await?;

    Ok(Json(user))
}

/// DELETE /users/:id
#[tracing::instrument(skip(state, caller), fields(caller_id = %caller.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(caller): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<MessageResponse>> {
    state.services.credentials.delete_user(&caller, user_id).await?;
    Ok(MessageResponse::new("User deleted successfully"))
}

/// GET /users/all
pub async fn list_users(
    State(state): State<AppState>,
    Extension(caller): Extension<User>,
) -> Result<Json<Vec<User>>> {
    Ok(Json(state.services.credentials.list_users(&caller).await?))
}

/// POST /users/forgot-password/request-otp?email=
#[tracing::instrument(skip(state, query))]
pub async fn request_otp(
    State(state): State<AppState>,
    Query(query): Query<OtpRequestQuery>,
) -> Result<Json<MessageResponse>> {
    query.validate()?;
    state.services.otp.issue(&query.email).await?;
    Ok(MessageResponse::new("A reset code has been sent to your email"))
}

/// POST /users/forgot-password/reset
#[tracing::instrument(skip(state, req))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    state
        .services
        .otp
        .redeem(
            &req.email,
            &req.otp_code,
            &req.new_password,
            &req.confirm_password,
        )
        .await?;

    Ok(MessageResponse::new("Password reset successfully"))
}
