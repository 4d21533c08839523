// In-process store for tests and local runs without Postgres

use crate::db::store::{IncidentStore, StatusChange, UserStore};
use crate::domain::incident::{
    Incident, IncidentChanges, IncidentReportRow, IncidentStatus, NewIncident,
};
use crate::domain::user::{NewUser, User, UserChanges};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    incidents: Vec<Incident>,
}

impl Tables {
    fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

/// Both tables behind one lock, so every operation is atomic
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&user.email, None) {
            return Err(AppError::Conflict(format!(
                "A user with email ({}) already exists",
                user.email
            )));
        }

        let record = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            company: user.company,
            phone: user.phone,
            role: user.role,
            otp_code: None,
            otp_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(record.clone());
        Ok(record)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.tables.read().await.users.clone())
    }

    async fn update_user(
        &self,
        id: Uuid,
        changes: UserChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let mut tables = self.tables.write().await;
        if let Some(email) = &changes.email {
            if tables.email_taken(email, Some(id)) {
                return Err(AppError::Conflict(format!(
                    "A user with email ({}) already exists",
                    email
                )));
            }
        }

        Ok(tables.user_mut(id).map(|user| {
            changes.apply(user);
            user.updated_at = now;
            user.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        if tables.users.len() == before {
            return Ok(false);
        }
        tables.incidents.retain(|i| i.user_id != id);
        Ok(true)
    }

    async fn store_otp(
        &self,
        id: Uuid,
        code: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(match tables.user_mut(id) {
            Some(user) => {
                user.otp_code = Some(code.to_string());
                user.otp_expires_at = Some(expires_at);
                user.updated_at = now;
                true
            }
            None => false,
        })
    }

    async fn redeem_otp(
        &self,
        id: Uuid,
        code: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.user_mut(id) else {
            return Ok(false);
        };

        let redeemable = matches!(
            user.pending_otp(),
            Some(otp) if otp.code == code && otp.expires_at > now
        );
        if !redeemable {
            return Ok(false);
        }

        user.password_hash = new_password_hash.to_string();
        user.otp_code = None;
        user.otp_expires_at = None;
        user.updated_at = now;
        Ok(true)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for MemoryStore {
    async fn insert_incident(&self, incident: NewIncident, now: DateTime<Utc>) -> Result<Incident> {
        let mut tables = self.tables.write().await;
        if !tables.users.iter().any(|u| u.id == incident.owner_id) {
            return Err(AppError::NotFound("User"));
        }

        let record = Incident {
            id: Uuid::new_v4(),
            title: incident.title,
            description: incident.description,
            priority: incident.priority,
            category: incident.category,
            status: IncidentStatus::Pending,
            created_at: now,
            updated_at: now,
            user_id: incident.owner_id,
        };
        tables.incidents.push(record.clone());
        Ok(record)
    }

    async fn list_incidents_for_owner(&self, owner_id: Uuid) -> Result<Vec<Incident>> {
        let tables = self.tables.read().await;
        Ok(tables
            .incidents
            .iter()
            .filter(|i| i.user_id == owner_id)
            .cloned()
            .collect())
    }

    async fn find_incident_for_owner(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Incident>> {
        let tables = self.tables.read().await;
        Ok(tables
            .incidents
            .iter()
            .find(|i| i.id == id && i.user_id == owner_id)
            .cloned())
    }

    async fn update_incident_for_owner(
        &self,
        owner_id: Uuid,
        id: Uuid,
        changes: IncidentChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Incident>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .incidents
            .iter_mut()
            .find(|i| i.id == id && i.user_id == owner_id)
            .map(|incident| {
                changes.apply(incident);
                incident.updated_at = now;
                incident.clone()
            }))
    }

    async fn delete_incident_for_owner(&self, owner_id: Uuid, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.incidents.len();
        tables
            .incidents
            .retain(|i| !(i.id == id && i.user_id == owner_id));
        Ok(tables.incidents.len() < before)
    }

    async fn change_incident_status(
        &self,
        id: Uuid,
        status: IncidentStatus,
        strict: bool,
        now: DateTime<Utc>,
    ) -> Result<StatusChange> {
        let mut tables = self.tables.write().await;
        let Some(incident) = tables.incidents.iter_mut().find(|i| i.id == id) else {
            return Ok(StatusChange::Missing);
        };

        let previous = incident.status;
        if !previous.can_transition_to(status, strict) {
            return Ok(StatusChange::Refused { current: previous });
        }

        incident.status = status;
        incident.updated_at = now;
        Ok(StatusChange::Applied {
            previous,
            incident: incident.clone(),
        })
    }

    async fn list_all_incidents(&self) -> Result<Vec<Incident>> {
        Ok(self.tables.read().await.incidents.clone())
    }

    async fn report_rows(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<IncidentReportRow>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<IncidentReportRow> = tables
            .incidents
            .iter()
            .filter(|i| i.created_at >= start && i.created_at < end)
            .filter_map(|i| {
                let owner = tables.users.iter().find(|u| u.id == i.user_id)?;
                Some(IncidentReportRow {
                    title: i.title.clone(),
                    priority: i.priority,
                    status: i.status,
                    category: i.category,
                    created_at: i.created_at,
                    owner_name: owner.name.clone(),
                    owner_email: owner.email.clone(),
                })
            })
            .collect();
        rows.sort_by_key(|r| r.created_at);
        Ok(rows)
    }
}
