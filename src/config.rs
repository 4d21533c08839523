use crate::errors::{AppError, Result};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub incidents: IncidentConfig,
    pub notifications: NotificationConfig,
    pub observability: ObservabilityConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres URL, or `memory://` for the in-process store
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_expire_minutes: i64,
    pub otp_ttl_minutes: i64,
    pub password_min_length: usize,
    /// Accounts registered with one of these emails get the admin role
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

// Keeps the signing secret out of startup logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_token_expire_minutes", &self.access_token_expire_minutes)
            .field("otp_ttl_minutes", &self.otp_ttl_minutes)
            .field("password_min_length", &self.password_min_length)
            .field("admin_emails", &self.admin_emails)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct IncidentConfig {
    /// Reject backward or skipped-over status changes
    #[serde(default)]
    pub enforce_forward_transitions: bool,
}

#[derive(Clone, Deserialize)]
pub struct NotificationConfig {
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    pub sender_name: String,
    pub sender_email: String,
    /// Operations mailbox receiving new-incident alerts
    pub alert_recipients: Vec<String>,
    /// Mailbox receiving contact-form messages
    pub contact_recipient: String,
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub request_timeout_seconds: u64,
}

impl std::fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("sender_email", &self.sender_email)
            .field("alert_recipients", &self.alert_recipients)
            .field("queue_capacity", &self.queue_capacity)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "memory://".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 5,
            idle_timeout_seconds: 600,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_token_expire_minutes: 1440,
            otp_ttl_minutes: 5,
            password_min_length: 8,
            admin_emails: Vec::new(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.brevo.com/v3/smtp/email".to_string(),
            api_key: String::new(),
            sender_name: "Incident Desk".to_string(),
            sender_email: "no-reply@incident-desk.local".to_string(),
            alert_recipients: Vec::new(),
            contact_recipient: "support@incident-desk.local".to_string(),
            queue_capacity: 1024,
            max_attempts: 3,
            retry_backoff_ms: 500,
            request_timeout_seconds: 10,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let environment =
            env::var("INCIDENT_DESK_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(
                config::File::with_name(&format!("config/{}", environment)).required(false),
            )
            // e.g., INCIDENT_DESK__AUTH__JWT_SECRET=...
            .add_source(
                config::Environment::with_prefix("INCIDENT_DESK")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("auth.admin_emails")
                    .with_list_parse_key("notifications.alert_recipients")
                    .with_list_parse_key("security.cors_allowed_origins")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Configuration(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Configuration("Invalid port number".to_string()));
        }

        if self.database.url.is_empty() {
            return Err(AppError::Configuration(
                "Database URL is required".to_string(),
            ));
        }

        if self.auth.jwt_secret.len() < 32 {
            return Err(AppError::Configuration(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        if self.auth.access_token_expire_minutes <= 0 {
            return Err(AppError::Configuration(
                "Access token lifetime must be positive".to_string(),
            ));
        }

        if self.auth.otp_ttl_minutes <= 0 {
            return Err(AppError::Configuration(
                "OTP lifetime must be positive".to_string(),
            ));
        }

        if self.notifications.max_attempts == 0 {
            return Err(AppError::Configuration(
                "Notification max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether the in-process store was requested instead of Postgres
    pub fn uses_memory_store(&self) -> bool {
        self.database.url.starts_with("memory://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.auth.jwt_secret = "a-test-secret-that-is-long-enough-for-hs256".to_string();
        config
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid_config();
        assert!(config.validate().is_ok());

        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = valid_config();
        config.auth.jwt_secret = "short".to_string();
        assert!(matches!(config.validate(), Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = valid_config();
        config.notifications.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = valid_config();
        config.notifications.api_key = "xkeysib-123".to_string();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("a-test-secret"));
        assert!(!rendered.contains("xkeysib-123"));
    }

    #[test]
    fn test_memory_store_selection() {
        let mut config = valid_config();
        assert!(config.uses_memory_store());
        config.database.url = "postgres://localhost/incidents".to_string();
        assert!(!config.uses_memory_store());
    }
}
