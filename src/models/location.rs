use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinates;

/// Row of the `locations` table: a place the user was seen at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedLocation {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub visit_count: i32,
    #[serde(default)]
    pub last_visited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl TrackedLocation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTrackedLocation {
    pub user_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub visit_count: i32,
    pub last_visited_at: DateTime<Utc>,
}
