use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ensure, not_blank};

/// Row of the `ratings` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: Uuid,
    pub space_id: Uuid,
    pub user_id: Uuid,
    pub score: i16,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRating {
    pub space_id: Uuid,
    pub user_id: Uuid,
    pub score: i16,
    pub comment: Option<String>,
}

impl NewRating {
    pub fn validate(&self) -> Result<()> {
        ensure((1..=5).contains(&self.score), "Rating must be between 1 and 5")
    }
}

/// Mean score, `None` without ratings
pub fn average_score(ratings: &[Rating]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let total: i64 = ratings.iter().map(|r| r.score as i64).sum();
    Some(total as f64 / ratings.len() as f64)
}

/// Row of the `referrals` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Referral {
    pub id: Uuid,
    pub referrer_id: Uuid,
    pub referred_id: Uuid,
    #[serde(default)]
    pub invite_code: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewReferral {
    pub referrer_id: Uuid,
    pub referred_id: Uuid,
    pub invite_code: String,
}

/// Row of the `time_offerings` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeOffering {
    pub id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub hours: f64,
    #[serde(default)]
    pub available_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTimeOffering {
    pub user_id: Uuid,
    pub description: String,
    pub hours: f64,
    pub available_from: Option<DateTime<Utc>>,
}

impl NewTimeOffering {
    pub fn validate(&self) -> Result<()> {
        ensure(not_blank(&self.description), "Description is required")?;
        ensure(
            self.hours > 0.0 && self.hours <= 24.0,
            "Hours must be more than 0 and at most 24",
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Open,
    Fulfilled,
    Closed,
}

/// Row of the `community_requests` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: RequestStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCommunityRequest {
    pub requester_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: RequestStatus,
}

impl NewCommunityRequest {
    pub fn validate(&self) -> Result<()> {
        ensure(not_blank(&self.title), "Title is required")
    }
}
