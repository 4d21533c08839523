// Authentication endpoints

use crate::api::extract::{Form, Json};
use crate::api::routes::AppState;
use crate::errors::Result;
use axum::extract::State;
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// OAuth2 password-grant style form; `username` carries the email
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub user_name: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
#[tracing::instrument(skip(state, form), fields(username = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<LoginResponse>> {
    let (token, user) = state
        .services
        .credentials
        .authenticate(&form.username, &form.password)
        .await?;

    Ok(Json(LoginResponse {
        access_token: token.access_token,
        token_type: token.token_type,
        user_name: user.name,
    }))
}
