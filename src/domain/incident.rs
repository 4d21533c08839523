// Incident domain model and status state machine

use crate::errors::{AppError, Result};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Generates `as_str`, `FromStr`, `Display` and `ALL` for a string-backed enum
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(concat!("unknown ", stringify!($name), " '{}'"), other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

text_enum!(Priority {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
    Critical => "CRITICAL",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Network,
    Security,
    Software,
    Hardware,
    Access,
    Surveillance,
    Other,
}

text_enum!(Category {
    Network => "NETWORK",
    Security => "SECURITY",
    Software => "SOFTWARE",
    Hardware => "HARDWARE",
    Access => "ACCESS",
    Surveillance => "SURVEILLANCE",
    Other => "OTHER",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    Pending,
    InProgress,
    Resolved,
}

text_enum!(IncidentStatus {
    Pending => "PENDING",
    InProgress => "IN_PROGRESS",
    Resolved => "RESOLVED",
});

impl Default for IncidentStatus {
    fn default() -> Self {
        IncidentStatus::Pending
    }
}

impl IncidentStatus {
    fn rank(&self) -> u8 {
        match self {
            IncidentStatus::Pending => 0,
            IncidentStatus::InProgress => 1,
            IncidentStatus::Resolved => 2,
        }
    }

    /// Whether `next` may follow `self`.
    ///
    /// Permissive mode accepts any of the three states. Strict mode only
    /// moves forward (PENDING -> IN_PROGRESS -> RESOLVED, skipping allowed);
    /// re-applying the current state is always accepted.
    pub fn can_transition_to(&self, next: IncidentStatus, strict: bool) -> bool {
        !strict || next.rank() >= self.rank()
    }
}

// ============================================================================
// Incident
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Incident {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category: Category,
    pub status: IncidentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
}

/// Fields required to file an incident
#[derive(Debug, Clone)]
pub struct NewIncident {
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category: Category,
}

impl NewIncident {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("Incident title cannot be empty".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(AppError::Validation(
                "Incident description cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Owner-editable fields. Status is intentionally absent.
#[derive(Debug, Clone, Default)]
pub struct IncidentChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
}

impl IncidentChanges {
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.title, Some(t) if t.trim().is_empty()) {
            return Err(AppError::Validation("Incident title cannot be empty".to_string()));
        }
        if matches!(&self.description, Some(d) if d.trim().is_empty()) {
            return Err(AppError::Validation(
                "Incident description cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn apply(self, incident: &mut Incident) {
        if let Some(title) = self.title {
            incident.title = title;
        }
        if let Some(description) = self.description {
            incident.description = description;
        }
        if let Some(priority) = self.priority {
            incident.priority = priority;
        }
        if let Some(category) = self.category {
            incident.category = category;
        }
    }
}

// ============================================================================
// Reporting
// ============================================================================

/// Incident joined with its owner, as handed to the report renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentReportRow {
    pub title: String,
    pub priority: Priority,
    pub status: IncidentStatus,
    pub category: Category,
    pub created_at: DateTime<Utc>,
    pub owner_name: String,
    pub owner_email: String,
}

/// Inclusive range of calendar days (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self> {
        let range = Self {
            start_date,
            end_date,
        };
        range.bounds()?;
        Ok(range)
    }

    /// Half-open instant bounds `[start 00:00, day after end 00:00)`
    pub fn bounds(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        if self.start_date > self.end_date {
            return Err(AppError::Validation(
                "start_date must not be after end_date".to_string(),
            ));
        }

        let start = self.start_date.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = self
            .end_date
            .checked_add_days(Days::new(1))
            .ok_or_else(|| AppError::Validation("end_date is out of range".to_string()))?
            .and_time(chrono::NaiveTime::MIN)
            .and_utc();

        Ok((start, end))
    }
}
