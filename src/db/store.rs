// Storage ports implemented by the Postgres and in-memory backends

use crate::domain::incident::{
    Incident, IncidentChanges, IncidentReportRow, IncidentStatus, NewIncident,
};
use crate::domain::user::{NewUser, User, UserChanges};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Persistence for user accounts and their reset codes
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user; a taken email yields `AppError::Conflict`
    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// All users, oldest first
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Apply a partial update; `None` when the user does not exist
    async fn update_user(
        &self,
        id: Uuid,
        changes: UserChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<User>>;

    /// Delete the user and, by cascade, their incidents
    async fn delete_user(&self, id: Uuid) -> Result<bool>;

    /// Store a reset code, replacing any previous one
    async fn store_otp(
        &self,
        id: Uuid,
        code: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Atomically swap the password and clear the code, provided the code
    /// still matches and has not expired at `now`. Returns whether it applied.
    async fn redeem_otp(
        &self,
        id: Uuid,
        code: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Cheap connectivity check used by readiness probes
    async fn ping(&self) -> Result<()>;
}

/// Outcome of a guarded status update
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    Applied {
        previous: IncidentStatus,
        incident: Incident,
    },
    Refused {
        current: IncidentStatus,
    },
    Missing,
}

/// Persistence for incidents
#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn insert_incident(&self, incident: NewIncident, now: DateTime<Utc>) -> Result<Incident>;

    /// Incidents owned by `owner_id`, in creation order
    async fn list_incidents_for_owner(&self, owner_id: Uuid) -> Result<Vec<Incident>>;

    async fn find_incident_for_owner(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Incident>>;

    async fn update_incident_for_owner(
        &self,
        owner_id: Uuid,
        id: Uuid,
        changes: IncidentChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Incident>>;

    async fn delete_incident_for_owner(&self, owner_id: Uuid, id: Uuid) -> Result<bool>;

    /// Set the status of any incident. With `strict`, only forward moves
    /// are applied (see `IncidentStatus::can_transition_to`).
    async fn change_incident_status(
        &self,
        id: Uuid,
        status: IncidentStatus,
        strict: bool,
        now: DateTime<Utc>,
    ) -> Result<StatusChange>;

    /// Every incident, in creation order
    async fn list_all_incidents(&self) -> Result<Vec<Incident>>;

    /// Incidents created in `[start, end)` joined with their owner
    async fn report_rows(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<IncidentReportRow>>;
}
