// Postgres-backed stores

use crate::db::schema::{
    IncidentRow, ReportRow, UserRow, INCIDENT_COLUMNS, USER_COLUMNS,
};
use crate::db::store::{IncidentStore, StatusChange, UserStore};
use crate::domain::incident::{
    Incident, IncidentChanges, IncidentReportRow, IncidentStatus, NewIncident,
};
use crate::domain::user::{NewUser, User, UserChanges};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Map a unique-key violation to `Conflict`, pass everything else through
fn conflict_on_duplicate(err: sqlx::Error, email: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(format!("A user with email ({}) already exists", email))
        }
        _ => AppError::Database(err),
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (
                id, email, name, password_hash, company, phone, role, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.company)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, &user.email))?;

        tracing::debug!(user_id = %row.id, "Inserted user");

        row.try_into()
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
    }

    async fn update_user(
        &self,
        id: Uuid,
        changes: UserChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let email = changes.email.clone().unwrap_or_default();

        sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                company = COALESCE($4, company),
                phone = COALESCE($5, phone),
                password_hash = COALESCE($6, password_hash),
                updated_at = $7
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.company)
        .bind(changes.phone)
        .bind(changes.password_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, &email))?
        .map(User::try_from)
        .transpose()
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn store_otp(
        &self,
        id: Uuid,
        code: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET otp_code = $2, otp_expires_at = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn redeem_otp(
        &self,
        id: Uuid,
        code: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $3, otp_code = NULL, otp_expires_at = NULL, updated_at = $4
            WHERE id = $1 AND otp_code = $2 AND otp_expires_at > $4
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(new_password_hash)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for PgStore {
    async fn insert_incident(&self, incident: NewIncident, now: DateTime<Utc>) -> Result<Incident> {
        sqlx::query_as::<_, IncidentRow>(&format!(
            r#"
            INSERT INTO incidents (
                id, title, description, priority, category, status, created_at, updated_at, user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8)
            RETURNING {INCIDENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(incident.priority.as_str())
        .bind(incident.category.as_str())
        .bind(IncidentStatus::Pending.as_str())
        .bind(now)
        .bind(incident.owner_id)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn list_incidents_for_owner(&self, owner_id: Uuid) -> Result<Vec<Incident>> {
        sqlx::query_as::<_, IncidentRow>(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE user_id = $1 ORDER BY created_at ASC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Incident::try_from)
        .collect()
    }

    async fn find_incident_for_owner(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Incident>> {
        sqlx::query_as::<_, IncidentRow>(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Incident::try_from)
        .transpose()
    }

    async fn update_incident_for_owner(
        &self,
        owner_id: Uuid,
        id: Uuid,
        changes: IncidentChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Incident>> {
        sqlx::query_as::<_, IncidentRow>(&format!(
            r#"
            UPDATE incidents
            SET title = COALESCE($3, title),
                description = COALESCE($4, description),
                priority = COALESCE($5, priority),
                category = COALESCE($6, category),
                updated_at = $7
            WHERE id = $1 AND user_id = $2
            RETURNING {INCIDENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner_id)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.priority.map(|p| p.as_str()))
        .bind(changes.category.map(|c| c.as_str()))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .map(Incident::try_from)
        .transpose()
    }

    async fn delete_incident_for_owner(&self, owner_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM incidents WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn change_incident_status(
        &self,
        id: Uuid,
        status: IncidentStatus,
        strict: bool,
        now: DateTime<Utc>,
    ) -> Result<StatusChange> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM incidents WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(current) = current else {
            return Ok(StatusChange::Missing);
        };
        let previous: IncidentStatus = current
            .parse()
            .map_err(|e| AppError::Internal(format!("Corrupt status column: {}", e)))?;

        if !previous.can_transition_to(status, strict) {
            return Ok(StatusChange::Refused { current: previous });
        }

        let incident: Incident = sqlx::query_as::<_, IncidentRow>(&format!(
            r#"
            UPDATE incidents
            SET status = $2, updated_at = $3
            WHERE id = $1
            RETURNING {INCIDENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?
        .try_into()?;

        tx.commit().await?;

        Ok(StatusChange::Applied { previous, incident })
    }

    async fn list_all_incidents(&self) -> Result<Vec<Incident>> {
        sqlx::query_as::<_, IncidentRow>(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Incident::try_from)
        .collect()
    }

    async fn report_rows(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<IncidentReportRow>> {
        sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT i.title, i.priority, i.status, i.category, i.created_at,
                   u.name AS owner_name, u.email AS owner_email
            FROM incidents i
            INNER JOIN users u ON u.id = i.user_id
            WHERE i.created_at >= $1 AND i.created_at < $2
            ORDER BY i.created_at ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(IncidentReportRow::try_from)
        .collect()
    }
}
