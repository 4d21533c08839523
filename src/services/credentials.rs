use crate::auth::password::{hash_password_blocking, validate_password, verify_password_blocking};
use crate::auth::{SessionToken, TokenManager, TokenSubject};
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::db::UserStore;
use crate::domain::user::{NewUser, Role, User, UserChanges};
use crate::errors::{AppError, Result};
use crate::observability::MetricsRecorder;
use crate::services::{normalize_email, require_non_empty, validate_email};
use std::sync::Arc;
use uuid::Uuid;

/// Input for creating an account
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub name: String,
    pub password: String,
    pub company: Option<String>,
    pub phone: Option<String>,
}

/// Account settings change; a new password is rehashed
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

/// Contact details change
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
}

/// Registration, login, bearer tokens and account management
pub struct CredentialService {
    users: Arc<dyn UserStore>,
    tokens: TokenManager,
    clock: Arc<dyn Clock>,
    password_min_length: usize,
    admin_emails: Vec<String>,
}

impl CredentialService {
    pub fn new(config: &AuthConfig, users: Arc<dyn UserStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            users,
            tokens: TokenManager::new(config, clock.clone())?,
            clock,
            password_min_length: config.password_min_length,
            admin_emails: config.admin_emails.iter().map(|e| normalize_email(e)).collect(),
        })
    }

    pub async fn register(&self, registration: Registration) -> Result<User> {
        let email = normalize_email(&registration.email);
        validate_email(&email)?;
        require_non_empty("Name", &registration.name)?;
        validate_password(&registration.password, self.password_min_length)?;

        let role = if self.admin_emails.contains(&email) {
            Role::Admin
        } else {
            Role::Member
        };

        let password_hash = hash_password_blocking(registration.password).await?;
        let user = self
            .users
            .insert_user(
                NewUser {
                    email,
                    name: registration.name.trim().to_string(),
                    password_hash,
                    company: registration.company,
                    phone: registration.phone,
                    role,
                },
                self.clock.now(),
            )
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Check a password and issue a session token.
    ///
    /// An unknown email and a wrong password give the same error.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<(SessionToken, User)> {
        let email = normalize_email(email);

        let user = match self.users.find_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                MetricsRecorder::record_login("failure");
                return Err(AppError::InvalidCredentials);
            }
        };

        if !verify_password_blocking(password.to_string(), user.password_hash.clone()).await? {
            MetricsRecorder::record_login("failure");
            tracing::info!(user_id = %user.id, "Login rejected");
            return Err(AppError::InvalidCredentials);
        }

        let token = self.tokens.issue(user.id, &user.name)?;
        MetricsRecorder::record_login("success");
        tracing::info!(user_id = %user.id, "User logged in");
        Ok((token, user))
    }

    pub fn validate_token(&self, token: &str) -> Result<TokenSubject> {
        self.tokens.validate(token)
    }

    /// Validate a token and load its user; a deleted user is `Unauthorized`
    pub async fn resolve_user(&self, token: &str) -> Result<User> {
        let subject = self.validate_token(token)?;
        self.users
            .find_user(subject.user_id)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    pub fn authorize_admin<'a>(&self, user: &'a User) -> Result<&'a User> {
        if user.is_admin() {
            Ok(user)
        } else {
            tracing::debug!(user_id = %user.id, "Admin action refused");
            Err(AppError::Forbidden)
        }
    }

    /// Fresh copy of the caller's record
    pub async fn me(&self, caller: &User) -> Result<User> {
        self.users
            .find_user(caller.id)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    pub async fn update_account(
        &self,
        caller: &User,
        user_id: Uuid,
        update: AccountUpdate,
    ) -> Result<User> {
        ensure_self_or_admin(caller, user_id)?;

        if let Some(name) = &update.name {
            require_non_empty("Name", name)?;
        }
        let password_hash = match update.password {
            Some(password) => {
                validate_password(&password, self.password_min_length)?;
                Some(hash_password_blocking(password).await?)
            }
            None => None,
        };

        let changes = UserChanges {
            name: update.name,
            email: None,
            company: update.company,
            phone: update.phone,
            password_hash,
        };
        self.apply_changes(user_id, changes).await
    }

    pub async fn update_profile(
        &self,
        caller: &User,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<User> {
        ensure_self_or_admin(caller, user_id)?;

        if let Some(name) = &update.name {
            require_non_empty("Name", name)?;
        }
        let email = match update.email {
            Some(email) => {
                let email = normalize_email(&email);
                validate_email(&email)?;
                Some(email)
            }
            None => None,
        };

        let changes = UserChanges {
            name: update.name,
            email,
            company: update.company,
            phone: update.phone,
            password_hash: None,
        };
        self.apply_changes(user_id, changes).await
    }

    pub async fn list_users(&self, caller: &User) -> Result<Vec<User>> {
        self.authorize_admin(caller)?;
        self.users.list_users().await
    }

    pub async fn delete_user(&self, caller: &User, user_id: Uuid) -> Result<()> {
        ensure_self_or_admin(caller, user_id)?;

        if !self.users.delete_user(user_id).await? {
            return Err(AppError::NotFound("User"));
        }

        tracing::info!(user_id = %user_id, deleted_by = %caller.id, "User deleted");
        Ok(())
    }

    async fn apply_changes(&self, user_id: Uuid, changes: UserChanges) -> Result<User> {
        let updated = if changes.is_empty() {
            self.users.find_user(user_id).await?
        } else {
            self.users
                .update_user(user_id, changes, self.clock.now())
                .await?
        };

        let user = updated.ok_or(AppError::NotFound("User"))?;
        tracing::info!(user_id = %user.id, "User updated");
        Ok(user)
    }
}

fn ensure_self_or_admin(caller: &User, target: Uuid) -> Result<()> {
    if caller.id == target || caller.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{harness, registration, ADMIN_EMAIL};
    use chrono::Duration;

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let h = harness();
        let credentials = &h.services.credentials;

        let user = credentials.register(registration("Ada@Example.com")).await.unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.role, Role::Member);
        assert_ne!(user.password_hash, "correct horse battery");

        let (token, logged_in) = credentials
            .authenticate("ada@example.com", "correct horse battery")
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);
        assert_eq!(token.token_type, "bearer");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let h = harness();
        let credentials = &h.services.credentials;

        credentials.register(registration("ada@example.com")).await.unwrap();
        let err = credentials
            .register(registration("ADA@example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(h.store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let h = harness();
        let credentials = &h.services.credentials;
        credentials.register(registration("ada@example.com")).await.unwrap();

        let unknown = credentials
            .authenticate("nobody@example.com", "correct horse battery")
            .await
            .unwrap_err();
        let wrong = credentials
            .authenticate("ada@example.com", "wrong password")
            .await
            .unwrap_err();

        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_token_expires_with_clock() {
        let h = harness();
        let credentials = &h.services.credentials;
        let user = credentials.register(registration("ada@example.com")).await.unwrap();
        let (token, _) = credentials
            .authenticate("ada@example.com", "correct horse battery")
            .await
            .unwrap();

        let subject = credentials.validate_token(&token.access_token).unwrap();
        assert_eq!(subject.user_id, user.id);

        h.clock.advance(Duration::minutes(1441));
        assert!(matches!(
            credentials.validate_token(&token.access_token),
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_deleted_user_token_is_unauthorized() {
        let h = harness();
        let credentials = &h.services.credentials;
        let user = credentials.register(registration("ada@example.com")).await.unwrap();
        let (token, _) = credentials
            .authenticate("ada@example.com", "correct horse battery")
            .await
            .unwrap();

        credentials.delete_user(&user, user.id).await.unwrap();
        assert!(matches!(
            credentials.resolve_user(&token.access_token).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_admin_gate_uses_role() {
        let h = harness();
        let credentials = &h.services.credentials;
        let admin = credentials.register(registration(ADMIN_EMAIL)).await.unwrap();
        let member = credentials.register(registration("bob@example.com")).await.unwrap();

        assert_eq!(admin.role, Role::Admin);
        assert!(credentials.authorize_admin(&admin).is_ok());
        assert!(matches!(credentials.authorize_admin(&member), Err(AppError::Forbidden)));
        assert!(matches!(credentials.list_users(&member).await, Err(AppError::Forbidden)));
        assert_eq!(credentials.list_users(&admin).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_account_changes_limited_to_owner_or_admin() {
        let h = harness();
        let credentials = &h.services.credentials;
        let admin = credentials.register(registration(ADMIN_EMAIL)).await.unwrap();
        let ada = credentials.register(registration("ada@example.com")).await.unwrap();
        let bob = credentials.register(registration("bob@example.com")).await.unwrap();

        let rename = AccountUpdate {
            name: Some("Mallory".to_string()),
            ..AccountUpdate::default()
        };
        assert!(matches!(
            credentials.update_account(&bob, ada.id, rename.clone()).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            credentials.delete_user(&bob, ada.id).await,
            Err(AppError::Forbidden)
        ));

        let updated = credentials.update_account(&admin, ada.id, rename).await.unwrap();
        assert_eq!(updated.name, "Mallory");
    }

    #[tokio::test]
    async fn test_password_change_takes_effect() {
        let h = harness();
        let credentials = &h.services.credentials;
        let ada = credentials.register(registration("ada@example.com")).await.unwrap();

        credentials
            .update_account(
                &ada,
                ada.id,
                AccountUpdate {
                    password: Some("a brand new secret".to_string()),
                    ..AccountUpdate::default()
                },
            )
            .await
            .unwrap();

        assert!(credentials
            .authenticate("ada@example.com", "correct horse battery")
            .await
            .is_err());
        assert!(credentials
            .authenticate("ada@example.com", "a brand new secret")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_profile_email_collision_is_conflict() {
        let h = harness();
        let credentials = &h.services.credentials;
        let ada = credentials.register(registration("ada@example.com")).await.unwrap();
        credentials.register(registration("bob@example.com")).await.unwrap();

        let err = credentials
            .update_profile(
                &ada,
                ada.id,
                ProfileUpdate {
                    email: Some("Bob@example.com".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_admin_deleting_missing_user_is_not_found() {
        let h = harness();
        let credentials = &h.services.credentials;
        let admin = credentials.register(registration(ADMIN_EMAIL)).await.unwrap();

        assert!(matches!(
            credentials.delete_user(&admin, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let h = harness();
        let credentials = &h.services.credentials;

        let mut bad_email = registration("ada@example.com");
        bad_email.email = "not-an-email".to_string();
        assert!(matches!(
            credentials.register(bad_email).await,
            Err(AppError::Validation(_))
        ));

        let mut short = registration("ada@example.com");
        short.password = "short".to_string();
        assert!(matches!(
            credentials.register(short).await,
            Err(AppError::Validation(_))
        ));
    }
}
