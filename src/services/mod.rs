pub mod contact;
pub mod credentials;
pub mod incidents;
pub mod otp;

pub use contact::{ContactMessage, ContactService};
pub use credentials::{AccountUpdate, CredentialService, ProfileUpdate, Registration};
pub use incidents::{IncidentDraft, IncidentService};
pub use otp::OtpService;

use crate::clock::Clock;
use crate::config::Config;
use crate::db::{IncidentStore, UserStore};
use crate::errors::{AppError, Result};
use crate::notify::{Mailer, NotificationDispatcher};
use crate::report::TextReportRenderer;
use std::sync::Arc;
use validator::ValidateEmail;

/// Every service the HTTP layer talks to
#[derive(Clone)]
pub struct Services {
    pub credentials: Arc<CredentialService>,
    pub otp: Arc<OtpService>,
    pub incidents: Arc<IncidentService>,
    pub contact: Arc<ContactService>,
}

impl Services {
    pub fn new(
        config: &Config,
        users: Arc<dyn UserStore>,
        incidents: Arc<dyn IncidentStore>,
        mailer: Arc<dyn Mailer>,
        dispatcher: NotificationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self {
            credentials: Arc::new(CredentialService::new(
                &config.auth,
                users.clone(),
                clock.clone(),
            )?),
            otp: Arc::new(OtpService::new(
                &config.auth,
                users.clone(),
                mailer.clone(),
                clock.clone(),
            )),
            incidents: Arc::new(IncidentService::new(
                config,
                incidents,
                users,
                dispatcher,
                Arc::new(TextReportRenderer),
                clock,
            )),
            contact: Arc::new(ContactService::new(&config.notifications, mailer)),
        })
    }
}

/// Emails are compared case-insensitively, so they are stored lowercase
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn validate_email(email: &str) -> Result<()> {
    if email.validate_email() {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Invalid email address: {}", email)))
    }
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}
