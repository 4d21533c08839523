// Session token generation and validation

use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::errors::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Claims
// ============================================================================

/// Claims carried by a bearer session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Display name of the subject
    pub name: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(user_id: Uuid, user_name: &str, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            sub: user_id.to_string(),
            name: user_name.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + lifetime).timestamp(),
        }
    }

    /// Expired at or after `exp`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }

    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Unauthorized)
    }
}

/// Identity proven by a valid token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub user_name: String,
}

/// An issued token together with its lifetime
#[derive(Debug, Clone, Serialize)]
pub struct SessionToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Token Manager
// ============================================================================

/// Signs and validates HS256 session tokens
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenManager {
    pub fn new(config: &AuthConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        if config.jwt_secret.len() < 32 {
            return Err(AppError::Configuration(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            lifetime: Duration::minutes(config.access_token_expire_minutes),
            clock,
        })
    }

    /// Issue a token for the given user
    pub fn issue(&self, user_id: Uuid, user_name: &str) -> Result<SessionToken> {
        let claims = SessionClaims::new(user_id, user_name, self.clock.now(), self.lifetime);
        let expires_at = DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to encode JWT: {}", e)))?;

        Ok(SessionToken {
            access_token,
            token_type: "bearer".to_string(),
            expires_at,
        })
    }

    /// Validate signature, required claims and expiry
    pub fn validate(&self, token: &str) -> Result<TokenSubject> {
        // Expiry is checked against the injected clock below
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!("Rejected session token: {}", e);
                AppError::Unauthorized
            })?
            .claims;

        if claims.is_expired_at(self.clock.now()) {
            tracing::debug!(sub = %claims.sub, "Rejected expired session token");
            return Err(AppError::Unauthorized);
        }

        Ok(TokenSubject {
            user_id: claims.user_id()?,
            user_name: claims.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-key-for-jwt-signing-minimum-length-requirement".to_string(),
            access_token_expire_minutes: 30,
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let claims = SessionClaims::new(user_id, "Alice", now, Duration::minutes(30));

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.name, "Alice");
        assert_eq!(claims.exp - claims.iat, 30 * 60);
        assert!(!claims.is_expired_at(now));
        assert!(claims.is_expired_at(now + Duration::minutes(30)));
    }

    #[test]
    fn test_issue_and_validate() {
        let clock = ManualClock::default();
        let manager = TokenManager::new(&test_config(), Arc::new(clock)).unwrap();
        let user_id = Uuid::new_v4();

        let token = manager.issue(user_id, "Alice").unwrap();
        assert_eq!(token.token_type, "bearer");

        let subject = manager.validate(&token.access_token).unwrap();
        assert_eq!(subject.user_id, user_id);
        assert_eq!(subject.user_name, "Alice");
    }

    #[test]
    fn test_expired_token_rejected() {
        let clock = ManualClock::default();
        let manager = TokenManager::new(&test_config(), Arc::new(clock.clone())).unwrap();
        let token = manager.issue(Uuid::new_v4(), "Alice").unwrap();

        clock.advance(Duration::minutes(31));
        assert!(matches!(
            manager.validate(&token.access_token),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let manager = TokenManager::new(&test_config(), clock.clone()).unwrap();

        let mut other_config = test_config();
        other_config.jwt_secret = "another-secret-key-that-is-also-long-enough".to_string();
        let other = TokenManager::new(&other_config, clock).unwrap();

        let token = other.issue(Uuid::new_v4(), "Mallory").unwrap();
        assert!(manager.validate(&token.access_token).is_err());
        assert!(manager.validate("not.a.token").is_err());
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let clock = ManualClock::default();
        let config = test_config();
        let manager = TokenManager::new(&config, Arc::new(clock.clone())).unwrap();

        let claims = SessionClaims {
            sub: "42".to_string(),
            name: "Bob".to_string(),
            iat: clock.now().timestamp(),
            exp: (clock.now() + Duration::minutes(5)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(manager.validate(&token), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = test_config();
        config.jwt_secret = "short".to_string();
        assert!(TokenManager::new(&config, Arc::new(ManualClock::default())).is_err());
    }
}
