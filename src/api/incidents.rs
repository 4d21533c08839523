// Incident endpoints

use crate::api::extract::{Json, Path};
use crate::api::routes::AppState;
use crate::api::users::MessageResponse;
use crate::domain::incident::{
    Category, DateRange, Incident, IncidentChanges, IncidentStatus, Priority,
};
use crate::domain::user::User;
use crate::errors::{AppError, Result};
use crate::services::IncidentDraft;
use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Extension,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateIncidentRequest {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category: Category,
}

/// Owner edit. A `status` key in the body is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateIncidentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: IncidentStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /incidents/create-incident
#[tracing::instrument(skip(state, owner, req), fields(owner_id = %owner.id))]
pub async fn create_incident(
    State(state): State<AppState>,
    Extension(owner): Extension<User>,
    Json(req): Json<CreateIncidentRequest>,
) -> Result<Json<Incident>> {
    let incident = state
        .services
        .incidents
        .create(
            &owner,
            IncidentDraft {
                title: req.title,
                description: req.description,
                priority: req.priority,
                category: req.category,
            },
        )
        .await?;

    Ok(Json(incident))
}

/// GET /incidents/list-incidents
pub async fn list_incidents(
    State(state): State<AppState>,
    Extension(owner): Extension<User>,
) -> Result<Json<Vec<Incident>>> {
    Ok(Json(state.services.incidents.list(&owner).await?))
}

/// GET /incidents/get-incident/:id
pub async fn get_incident(
    State(state): State<AppState>,
    Extension(owner): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Incident>> {
    Ok(Json(state.services.incidents.get(&owner, id).await?))
}

/// PUT /incidents/update-incident/:id
#[tracing::instrument(skip(state, owner, req), fields(owner_id = %owner.id))]
pub async fn update_incident(
    State(state): State<AppState>,
    Extension(owner): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateIncidentRequest>,
) -> Result<Json<Incident>> {
    let changes = IncidentChanges {
        title: req.title,
        description: req.description,
        priority: req.priority,
        category: req.category,
    };

    Ok(Json(state.services.incidents.update(&owner, id, changes).await?))
}

/// DELETE /incidents/delete-incident/:id
#[tracing::instrument(skip(state, owner), fields(owner_id = %owner.id))]
pub async fn delete_incident(
    State(state): State<AppState>,
    Extension(owner): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>> {
    state.services.incidents.delete(&owner, id).await?;
    Ok(MessageResponse::new("Incident deleted successfully"))
}

/// PATCH /incidents/update-status/:id
#[tracing::instrument(skip(state, admin, req), fields(admin_id = %admin.id))]
pub async fn update_status(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Incident>> {
    Ok(Json(
        state
            .services
            .incidents
            .set_status(&admin, id, req.status)
            .await?,
    ))
}

/// GET /incidents/all
pub async fn list_all(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
) -> Result<Json<Vec<Incident>>> {
    Ok(Json(state.services.incidents.list_all(&admin).await?))
}

/// POST /incidents/report
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn report(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Json(req): Json<ReportRequest>,
) -> Result<Response> {
    let range = DateRange::new(req.start_date, req.end_date)?;
    let document = state.services.incidents.render_report(&admin, range).await?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        document.filename
    ))
    .map_err(|e| AppError::Internal(format!("Invalid report filename: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(document.content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    )
        .into_response())
}
