use crate::config::NotificationConfig;
use crate::errors::{AppError, Result};
use crate::notify::{templates, Mailer};
use crate::services::{require_non_empty, validate_email};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// Forwards contact-form messages to the support mailbox
pub struct ContactService {
    mailer: Arc<dyn Mailer>,
    recipient: String,
}

impl ContactService {
    pub fn new(config: &NotificationConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            mailer,
            recipient: config.contact_recipient.clone(),
        }
    }

    /// Send synchronously; the caller learns whether it went out
    pub async fn send(&self, contact: ContactMessage) -> Result<()> {
        require_non_empty("Name", &contact.name)?;
        validate_email(contact.email.trim())?;
        require_non_empty("Subject", &contact.subject)?;
        require_non_empty("Message", &contact.message)?;

        let message = templates::contact_message(
            &self.recipient,
            contact.name.trim(),
            contact.email.trim(),
            contact.subject.trim(),
            &contact.message,
        );

        self.mailer.send(&message).await.map_err(|e| match e {
            AppError::DeliveryFailed(_) => e,
            other => AppError::DeliveryFailed(other.to_string()),
        })?;

        tracing::info!(subject = %contact.subject, "Contact message forwarded");
        Ok(())
    }
}
