use crate::clock::Clock;
use crate::config::Config;
use crate::db::{IncidentStore, StatusChange, UserStore};
use crate::domain::incident::{
    Category, DateRange, Incident, IncidentChanges, IncidentReportRow, IncidentStatus, NewIncident,
    Priority,
};
use crate::domain::user::User;
use crate::errors::{AppError, Result};
use crate::notify::{templates, NotificationDispatcher};
use crate::observability::MetricsRecorder;
use crate::report::{ReportDocument, ReportRenderer};
use std::sync::Arc;
use uuid::Uuid;

/// Fields supplied when filing an incident
#[derive(Debug, Clone)]
pub struct IncidentDraft {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category: Category,
}

/// Incident lifecycle: owner-scoped CRUD plus admin-only status and reporting
pub struct IncidentService {
    incidents: Arc<dyn IncidentStore>,
    users: Arc<dyn UserStore>,
    dispatcher: NotificationDispatcher,
    renderer: Arc<dyn ReportRenderer>,
    clock: Arc<dyn Clock>,
    alert_recipients: Vec<String>,
    enforce_forward_transitions: bool,
}

impl IncidentService {
    pub fn new(
        config: &Config,
        incidents: Arc<dyn IncidentStore>,
        users: Arc<dyn UserStore>,
        dispatcher: NotificationDispatcher,
        renderer: Arc<dyn ReportRenderer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            incidents,
            users,
            dispatcher,
            renderer,
            clock,
            alert_recipients: config.notifications.alert_recipients.clone(),
            enforce_forward_transitions: config.incidents.enforce_forward_transitions,
        }
    }

    /// File an incident as PENDING and queue an alert for the operations mailbox
    pub async fn create(&self, owner: &User, draft: IncidentDraft) -> Result<Incident> {
        let new_incident = NewIncident {
            owner_id: owner.id,
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            priority: draft.priority,
            category: draft.category,
        };
        new_incident.validate()?;

        let incident = self
            .incidents
            .insert_incident(new_incident, self.clock.now())
            .await?;

        MetricsRecorder::record_incident_created(incident.priority.as_str());
        tracing::info!(
            incident_id = %incident.id,
            owner_id = %owner.id,
            priority = %incident.priority,
            category = %incident.category,
            "Incident created"
        );

        if self.alert_recipients.is_empty() {
            tracing::warn!("No alert recipients configured; skipping new-incident alert");
        } else {
            self.dispatcher.enqueue(templates::incident_alert(
                &self.alert_recipients,
                &incident,
                owner,
            ));
        }

        Ok(incident)
    }

    pub async fn list(&self, owner: &User) -> Result<Vec<Incident>> {
        self.incidents.list_incidents_for_owner(owner.id).await
    }

    pub async fn get(&self, owner: &User, id: Uuid) -> Result<Incident> {
        self.incidents
            .find_incident_for_owner(owner.id, id)
            .await?
            .ok_or(AppError::NotFound("Incident"))
    }

    /// Owner edit of the descriptive fields; status is never touched here
    pub async fn update(&self, owner: &User, id: Uuid, changes: IncidentChanges) -> Result<Incident> {
        let changes = IncidentChanges {
            title: changes.title.map(|t| t.trim().to_string()),
            description: changes.description.map(|d| d.trim().to_string()),
            ..changes
        };
        changes.validate()?;

        let incident = self
            .incidents
            .update_incident_for_owner(owner.id, id, changes, self.clock.now())
            .await?
            .ok_or(AppError::NotFound("Incident"))?;

        tracing::info!(incident_id = %incident.id, owner_id = %owner.id, "Incident updated");
        Ok(incident)
    }

    pub async fn delete(&self, owner: &User, id: Uuid) -> Result<()> {
        if !self.incidents.delete_incident_for_owner(owner.id, id).await? {
            return Err(AppError::NotFound("Incident"));
        }
        tracing::info!(incident_id = %id, owner_id = %owner.id, "Incident deleted");
        Ok(())
    }

    /// Admin status change on any incident.
    ///
    /// Every RESOLVED update queues one notification for the owner, including
    /// a repeat on an incident that is already resolved.
    pub async fn set_status(
        &self,
        admin: &User,
        id: Uuid,
        status: IncidentStatus,
    ) -> Result<Incident> {
        ensure_admin(admin)?;

        let change = self
            .incidents
            .change_incident_status(id, status, self.enforce_forward_transitions, self.clock.now())
            .await?;

        let (previous, incident) = match change {
            StatusChange::Applied { previous, incident } => (previous, incident),
            StatusChange::Refused { current } => {
                return Err(AppError::InvalidTransition {
                    from: current.to_string(),
                    to: status.to_string(),
                })
            }
            StatusChange::Missing => return Err(AppError::NotFound("Incident")),
        };

        MetricsRecorder::record_status_change(status.as_str());
        tracing::info!(
            incident_id = %incident.id,
            admin_id = %admin.id,
            from = %previous,
            to = %status,
            "Incident status changed"
        );

        if status == IncidentStatus::Resolved {
            self.notify_resolved(&incident).await;
        }

        Ok(incident)
    }

    pub async fn list_all(&self, admin: &User) -> Result<Vec<Incident>> {
        ensure_admin(admin)?;
        self.incidents.list_all_incidents().await
    }

    /// Incidents created within the range, with owner details. No match is `NotFound`.
    pub async fn report_by_date_range(
        &self,
        admin: &User,
        range: DateRange,
    ) -> Result<Vec<IncidentReportRow>> {
        ensure_admin(admin)?;

        let (start, end) = range.bounds()?;
        let rows = self.incidents.report_rows(start, end).await?;
        if rows.is_empty() {
            return Err(AppError::NotFound("Incidents for the requested period"));
        }
        Ok(rows)
    }

    pub async fn render_report(&self, admin: &User, range: DateRange) -> Result<ReportDocument> {
        let rows = self.report_by_date_range(admin, range).await?;
        let document = self.renderer.render(&range, &rows)?;

        tracing::info!(
            admin_id = %admin.id,
            start = %range.start_date,
            end = %range.end_date,
            incidents = rows.len(),
            "Incident report generated"
        );
        Ok(document)
    }

    async fn notify_resolved(&self, incident: &Incident) {
        match self.users.find_user(incident.user_id).await {
            Ok(Some(owner)) => {
                self.dispatcher.enqueue(templates::incident_resolved(
                    &owner.email,
                    &owner.name,
                    &incident.title,
                ));
            }
            Ok(None) => {
                tracing::warn!(incident_id = %incident.id, "Owner vanished; no resolution email");
            }
            Err(e) => {
                tracing::error!(incident_id = %incident.id, "Failed to load incident owner: {}", e);
            }
        }
    }
}

fn ensure_admin(user: &User) -> Result<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{
        harness, harness_with, registration, test_config, Harness, RecordingMailer, ADMIN_EMAIL,
    };
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn draft(title: &str) -> IncidentDraft {
        IncidentDraft {
            title: title.to_string(),
            description: "Badge readers reject every card".to_string(),
            priority: Priority::Critical,
            category: Category::Security,
        }
    }

    async fn users(h: &Harness) -> (User, User, User) {
        let credentials = &h.services.credentials;
        let admin = credentials.register(registration(ADMIN_EMAIL)).await.unwrap();
        let ada = credentials.register(registration("ada@example.com")).await.unwrap();
        let bob = credentials.register(registration("bob@example.com")).await.unwrap();
        (admin, ada, bob)
    }

    #[tokio::test]
    async fn test_create_starts_pending_and_alerts_once() {
        let h = harness();
        let (_, ada, _) = users(&h).await;

        let incident = h.services.incidents.create(&ada, draft("Door locks")).await.unwrap();
        assert_eq!(incident.status, IncidentStatus::Pending);
        assert_eq!(incident.user_id, ada.id);
        assert_eq!(incident.priority, Priority::Critical);
        assert_eq!(incident.category, Category::Security);
        assert_eq!(incident.created_at, incident.updated_at);

        h.mailer.wait_for_attempts(1).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to[0].email, "ops@example.com");
        assert!(sent[0].subject.contains("Door locks"));
    }

    #[tokio::test]
    async fn test_create_succeeds_when_alert_fails() {
        let h = harness_with(test_config(), RecordingMailer::failing());
        let (_, ada, _) = users(&h).await;

        let incident = h.services.incidents.create(&ada, draft("Door locks")).await.unwrap();
        h.mailer.wait_for_attempts(1).await;
        assert!(h.services.incidents.get(&ada, incident.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_blank_title_rejected() {
        let h = harness();
        let (_, ada, _) = users(&h).await;
        assert!(matches!(
            h.services.incidents.create(&ada, draft("   ")).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_ownership_isolation() {
        let h = harness();
        let (_, ada, bob) = users(&h).await;
        let service = &h.services.incidents;
        let incident = service.create(&ada, draft("Laptop stolen")).await.unwrap();

        assert!(matches!(service.get(&bob, incident.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            service
                .update(
                    &bob,
                    incident.id,
                    IncidentChanges {
                        title: Some("Mine now".to_string()),
                        ..IncidentChanges::default()
                    }
                )
                .await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(service.delete(&bob, incident.id).await, Err(AppError::NotFound(_))));

        assert!(service.list(&bob).await.unwrap().is_empty());
        assert_eq!(service.get(&ada, incident.id).await.unwrap().title, "Laptop stolen");
    }

    #[tokio::test]
    async fn test_owner_update_and_delete() {
        let h = harness();
        let (_, ada, _) = users(&h).await;
        let service = &h.services.incidents;
        let incident = service.create(&ada, draft("Printer jam")).await.unwrap();

        h.clock.advance(Duration::minutes(3));
        let updated = service
            .update(
                &ada,
                incident.id,
                IncidentChanges {
                    priority: Some(Priority::Low),
                    ..IncidentChanges::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.priority, Priority::Low);
        assert_eq!(updated.title, "Printer jam");
        assert_eq!(updated.status, IncidentStatus::Pending);
        assert!(updated.updated_at > incident.updated_at);

        service.delete(&ada, incident.id).await.unwrap();
        assert!(matches!(service.get(&ada, incident.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_trims_text_fields() {
        let h = harness();
        let (_, ada, _) = users(&h).await;
        let service = &h.services.incidents;
        let incident = service.create(&ada, draft("Printer jam")).await.unwrap();

        let updated = service
            .update(
                &ada,
                incident.id,
                IncidentChanges {
                    title: Some("  Printer on fire \n".to_string()),
                    description: Some("\tsmoke in room 4  ".to_string()),
                    ..IncidentChanges::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Printer on fire");
        assert_eq!(updated.description, "smoke in room 4");

        let blank = service
            .update(
                &ada,
                incident.id,
                IncidentChanges {
                    title: Some("   ".to_string()),
                    ..IncidentChanges::default()
                },
            )
            .await;
        assert!(matches!(blank, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_in_creation_order() {
        let h = harness();
        let (_, ada, _) = users(&h).await;
        let service = &h.services.incidents;

        for title in ["first", "second", "third"] {
            service.create(&ada, draft(title)).await.unwrap();
            h.clock.advance(Duration::seconds(1));
        }

        let titles: Vec<String> = service
            .list(&ada)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_members_cannot_use_admin_operations() {
        let h = harness();
        let (_, ada, _) = users(&h).await;
        let service = &h.services.incidents;
        let incident = service.create(&ada, draft("VPN down")).await.unwrap();

        assert!(matches!(
            service.set_status(&ada, incident.id, IncidentStatus::Resolved).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(service.list_all(&ada).await, Err(AppError::Forbidden)));
        assert_eq!(
            service.get(&ada, incident.id).await.unwrap().status,
            IncidentStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_resolve_notifies_owner_once() {
        let h = harness();
        let (admin, ada, _) = users(&h).await;
        let service = &h.services.incidents;
        let incident = service.create(&ada, draft("VPN down")).await.unwrap();
        h.mailer.wait_for_attempts(1).await;

        let resolved = service
            .set_status(&admin, incident.id, IncidentStatus::Resolved)
            .await
            .unwrap();
        assert_eq!(resolved.status, IncidentStatus::Resolved);

        h.mailer.wait_for_attempts(2).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].to[0].email, "ada@example.com");
        assert!(sent[1].html_body.contains("VPN down"));
    }

    #[tokio::test]
    async fn test_repeated_resolve_notifies_each_time() {
        let h = harness();
        let (admin, ada, _) = users(&h).await;
        let service = &h.services.incidents;
        let incident = service.create(&ada, draft("Badge reader")).await.unwrap();

        for _ in 0..2 {
            service
                .set_status(&admin, incident.id, IncidentStatus::Resolved)
                .await
                .unwrap();
        }

        h.mailer.wait_for_attempts(3).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent[1..].iter().all(|m| m.to[0].email == "ada@example.com"));
    }

    #[tokio::test]
    async fn test_resolve_survives_failed_notification() {
        let h = harness_with(test_config(), RecordingMailer::failing());
        let (admin, ada, _) = users(&h).await;
        let service = &h.services.incidents;
        let incident = service.create(&ada, draft("VPN down")).await.unwrap();

        service
            .set_status(&admin, incident.id, IncidentStatus::Resolved)
            .await
            .unwrap();
        h.mailer.wait_for_attempts(2).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(h.mailer.attempts(), 2);
        assert_eq!(
            service.get(&ada, incident.id).await.unwrap().status,
            IncidentStatus::Resolved
        );
    }

    #[tokio::test]
    async fn test_set_status_missing_incident() {
        let h = harness();
        let (admin, _, _) = users(&h).await;
        assert!(matches!(
            h.services
                .incidents
                .set_status(&admin, Uuid::new_v4(), IncidentStatus::InProgress)
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_permissive_transitions_allow_backward_moves() {
        let h = harness();
        let (admin, ada, _) = users(&h).await;
        let service = &h.services.incidents;
        let incident = service.create(&ada, draft("Wi-Fi")).await.unwrap();

        service.set_status(&admin, incident.id, IncidentStatus::Resolved).await.unwrap();
        let reopened = service
            .set_status(&admin, incident.id, IncidentStatus::Pending)
            .await
            .unwrap();
        assert_eq!(reopened.status, IncidentStatus::Pending);
    }

    #[tokio::test]
    async fn test_strict_transitions_refuse_backward_moves() {
        let mut config = test_config();
        config.incidents.enforce_forward_transitions = true;
        let h = harness_with(config, RecordingMailer::default());
        let (admin, ada, _) = users(&h).await;
        let service = &h.services.incidents;
        let incident = service.create(&ada, draft("Wi-Fi")).await.unwrap();

        service.set_status(&admin, incident.id, IncidentStatus::InProgress).await.unwrap();
        let err = service
            .set_status(&admin, incident.id, IncidentStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        // Same state again and skipping ahead are both fine
        service.set_status(&admin, incident.id, IncidentStatus::InProgress).await.unwrap();
        service.set_status(&admin, incident.id, IncidentStatus::Resolved).await.unwrap();
    }

    #[tokio::test]
    async fn test_admin_lists_everything() {
        let h = harness();
        let (admin, ada, bob) = users(&h).await;
        let service = &h.services.incidents;
        service.create(&ada, draft("one")).await.unwrap();
        service.create(&bob, draft("two")).await.unwrap();

        assert_eq!(service.list_all(&admin).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_report_covers_whole_days() {
        let h = harness();
        let (admin, ada, _) = users(&h).await;
        let service = &h.services.incidents;

        h.clock.set(Utc.with_ymd_and_hms(2025, 3, 31, 23, 59, 59).unwrap());
        service.create(&ada, draft("late March")).await.unwrap();
        h.clock.set(Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap());
        service.create(&ada, draft("April fools")).await.unwrap();

        let march = DateRange::new(
            NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        )
        .unwrap();
        let rows = service.report_by_date_range(&admin, march).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "late March");
        assert_eq!(rows[0].owner_email, "ada@example.com");

        let doc = service.render_report(&admin, march).await.unwrap();
        assert!(std::str::from_utf8(&doc.bytes).unwrap().contains("late March"));
    }

    #[tokio::test]
    async fn test_empty_report_is_not_found() {
        let h = harness();
        let (admin, ada, _) = users(&h).await;
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2001, 1, 31).unwrap(),
        )
        .unwrap();

        assert!(matches!(
            h.services.incidents.report_by_date_range(&admin, range).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            h.services.incidents.report_by_date_range(&ada, range).await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_deleting_user_cascades_incidents() {
        let h = harness();
        let (admin, ada, _) = users(&h).await;
        h.services.incidents.create(&ada, draft("gone soon")).await.unwrap();

        h.services.credentials.delete_user(&admin, ada.id).await.unwrap();
        assert!(h.services.incidents.list_all(&admin).await.unwrap().is_empty());
    }
}
