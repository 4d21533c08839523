// Outbound email transports

use crate::config::NotificationConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// A named address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mailbox {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Mailbox {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    pub fn named(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: Some(name.into()),
        }
    }
}

/// A rendered email ready for a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: Vec<Mailbox>,
    pub reply_to: Option<Mailbox>,
    pub subject: String,
    pub html_body: String,
}

/// Port for delivering email
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

// ============================================================================
// Transactional email HTTP API
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailRequest<'a> {
    sender: &'a Mailbox,
    to: &'a [Mailbox],
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a Mailbox>,
    subject: &'a str,
    html_content: &'a str,
}

/// Delivers through a Brevo-compatible `POST /v3/smtp/email` endpoint
pub struct BrevoMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    sender: Mailbox,
}

impl BrevoMailer {
    pub fn new(config: &NotificationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            sender: Mailbox::named(&config.sender_email, &config.sender_name),
        })
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let payload = SendEmailRequest {
            sender: &self.sender,
            to: &message.to,
            reply_to: message.reply_to.as_ref(),
            subject: &message.subject,
            html_content: &message.html_body,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::DeliveryFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::DeliveryFailed(format!(
                "mail API answered {}: {}",
                status, body
            )));
        }

        tracing::debug!(subject = %message.subject, recipients = message.to.len(), "Email accepted by mail API");
        Ok(())
    }
}

// ============================================================================
// Logging transport
// ============================================================================

/// Writes messages to the log instead of sending them
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let recipients: Vec<&str> = message.to.iter().map(|m| m.email.as_str()).collect();
        tracing::info!(
            to = ?recipients,
            subject = %message.subject,
            "Email not sent (no mail API key configured)"
        );
        Ok(())
    }
}

/// Pick a transport from configuration
pub fn from_config(config: &NotificationConfig) -> Result<std::sync::Arc<dyn Mailer>> {
    if config.api_key.is_empty() {
        tracing::warn!("notifications.api_key is empty; emails will only be logged");
        Ok(std::sync::Arc::new(LogMailer))
    } else {
        Ok(std::sync::Arc::new(BrevoMailer::new(config)?))
    }
}
