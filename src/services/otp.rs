use crate::auth::otp;
use crate::auth::password::{hash_password_blocking, validate_password};
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::db::UserStore;
use crate::errors::{AppError, Result};
use crate::notify::{templates, Mailer};
use crate::observability::MetricsRecorder;
use crate::services::normalize_email;
use chrono::Duration;
use std::sync::Arc;

/// Password reset through an emailed one-time code
pub struct OtpService {
    users: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    password_min_length: usize,
}

impl OtpService {
    pub fn new(
        config: &AuthConfig,
        users: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            mailer,
            clock,
            ttl: Duration::minutes(config.otp_ttl_minutes),
            password_min_length: config.password_min_length,
        }
    }

    /// Store a fresh code and email it.
    ///
    /// The stored code stays valid when delivery fails.
    pub async fn issue(&self, email: &str) -> Result<()> {
        let email = normalize_email(email);
        let user = self
            .users
            .find_user_by_email(&email)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        let code = otp::generate_code();
        let now = self.clock.now();
        if !self
            .users
            .store_otp(user.id, &code, now + self.ttl, now)
            .await?
        {
            return Err(AppError::NotFound("User"));
        }
        MetricsRecorder::record_otp("issued");
        tracing::info!(user_id = %user.id, "Password reset code issued");

        let message = templates::otp_code(&user.email, &code, self.ttl.num_minutes());
        self.mailer.send(&message).await.map_err(|e| {
            tracing::error!(user_id = %user.id, "Failed to deliver reset code: {}", e);
            match e {
                AppError::DeliveryFailed(_) => e,
                other => AppError::DeliveryFailed(other.to_string()),
            }
        })
    }

    /// Replace the password if `code` is the current, unexpired code.
    /// A code is accepted at most once.
    pub async fn redeem(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<()> {
        if new_password != confirm_password {
            return Err(AppError::PasswordMismatch);
        }

        let email = normalize_email(email);
        let user = self
            .users
            .find_user_by_email(&email)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        let now = self.clock.now();
        let expires_at = match user.pending_otp() {
            Some(pending) if otp::is_well_formed(code) && pending.code == code => {
                pending.expires_at
            }
            _ => return Err(AppError::InvalidCode),
        };
        if expires_at <= now {
            return Err(AppError::CodeExpired);
        }

        validate_password(new_password, self.password_min_length)?;
        let password_hash = hash_password_blocking(new_password.to_string()).await?;

        // Loses to a concurrent redemption of the same code
        if !self
            .users
            .redeem_otp(user.id, code, &password_hash, now)
            .await?
        {
            return Err(AppError::InvalidCode);
        }

        MetricsRecorder::record_otp("redeemed");
        tracing::info!(user_id = %user.id, "Password reset with one-time code");
        Ok(())
    }
}
