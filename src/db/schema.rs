// Row types as stored in Postgres and their conversion into domain types

use crate::domain::incident::{Incident, IncidentReportRow};
use crate::domain::user::User;
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

pub(crate) const USER_COLUMNS: &str = "id, email, name, password_hash, company, phone, role, \
     otp_code, otp_expires_at, created_at, updated_at";

pub(crate) const INCIDENT_COLUMNS: &str =
    "id, title, description, priority, category, status, created_at, updated_at, user_id";

fn parse_column<T: FromStr<Err = String>>(column: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|e| AppError::Internal(format!("Corrupt {} column: {}", column, e)))
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            role: parse_column("role", &row.role)?,
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            company: row.company,
            phone: row.phone,
            otp_code: row.otp_code,
            otp_expires_at: row.otp_expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============================================================================
// Incidents
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct IncidentRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub category: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
}

impl TryFrom<IncidentRow> for Incident {
    type Error = AppError;

    fn try_from(row: IncidentRow) -> Result<Self> {
        Ok(Incident {
            priority: parse_column("priority", &row.priority)?,
            category: parse_column("category", &row.category)?,
            status: parse_column("status", &row.status)?,
            id: row.id,
            title: row.title,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
            user_id: row.user_id,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ReportRow {
    pub title: String,
    pub priority: String,
    pub status: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub owner_name: String,
    pub owner_email: String,
}

impl TryFrom<ReportRow> for IncidentReportRow {
    type Error = AppError;

    fn try_from(row: ReportRow) -> Result<Self> {
        Ok(IncidentReportRow {
            priority: parse_column("priority", &row.priority)?,
            status: parse_column("status", &row.status)?,
            category: parse_column("category", &row.category)?,
            title: row.title,
            created_at: row.created_at,
            owner_name: row.owner_name,
            owner_email: row.owner_email,
        })
    }
}
