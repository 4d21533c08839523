// User domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Role
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// User
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    #[serde(skip_serializing)]
    pub otp_code: Option<String>,
    #[serde(skip_serializing)]
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pending reset code attached to a user
#[derive(Debug, Clone, Copy)]
pub struct PendingOtp<'a> {
    pub code: &'a str,
    pub expires_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The stored reset code, only when both code and expiry are present
    pub fn pending_otp(&self) -> Option<PendingOtp<'_>> {
        match (self.otp_code.as_deref(), self.otp_expires_at) {
            (Some(code), Some(expires_at)) => Some(PendingOtp { code, expires_at }),
            _ => None,
        }
    }
}

/// Fields required to insert a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
}

/// Partial update of a user record; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.company.is_none()
            && self.phone.is_none()
            && self.password_hash.is_none()
    }

    pub(crate) fn apply(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(company) = self.company {
            user.company = Some(company);
        }
        if let Some(phone) = self.phone {
            user.phone = Some(phone);
        }
        if let Some(hash) = self.password_hash {
            user.password_hash = hash;
        }
    }
}
