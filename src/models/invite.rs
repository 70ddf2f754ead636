use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::invite::display_invite_code;

/// Row of the `invite_codes` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteCode {
    pub id: Uuid,
    /// Stored in normalized (uppercase) form
    pub code: String,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub used_by: Option<Uuid>,
    #[serde(default)]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl InviteCode {
    pub fn is_used(&self) -> bool {
        self.used_by.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expires| expires <= now)
    }

    /// The code as shown to people
    pub fn display_code(&self) -> String {
        display_invite_code(&self.code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewInviteCode {
    pub code: String,
    pub created_by: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}
