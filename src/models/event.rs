use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ensure, not_blank};

/// Row of the `events` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    pub capacity: i32,
    /// Attendees must sign the liability agreement before registering
    #[serde(default)]
    pub requires_agreement: bool,
    #[serde(default)]
    pub agreement_text: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Insert payload for a new event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEvent {
    pub organizer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
    pub capacity: i32,
    pub requires_agreement: bool,
    pub agreement_text: Option<String>,
}

impl NewEvent {
    pub fn validate(&self) -> Result<()> {
        ensure(not_blank(&self.title), "Title is required")?;
        ensure(self.end_time > self.start_time, "End time must be after start time")?;
        ensure(self.capacity >= 1, "Capacity must be at least 1")?;
        if self.requires_agreement {
            ensure(
                self.agreement_text.as_deref().map_or(false, not_blank),
                "Agreement text is required when an agreement must be signed",
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

/// Row of the `event_registrations` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub status: RegistrationStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRegistration {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub status: RegistrationStatus,
}

/// Row of the `agreements` table: a signed liability waiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub signature: String,
    pub accepted: bool,
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAgreement {
    pub event_id: Uuid,
    pub user_id: Uuid,
    /// Typed full name
    pub signature: String,
    pub accepted: bool,
}

impl NewAgreement {
    pub fn validate(&self) -> Result<()> {
        ensure(not_blank(&self.signature), "Please type your full name to sign")?;
        ensure(self.accepted, "The agreement must be accepted")
    }
}
