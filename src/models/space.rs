use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::geo::{haversine_km, Coordinates};
use crate::models::{ensure, not_blank};

/// Lifecycle of a space listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceStatus {
    Open,
    Full,
    Ongoing,
    Completed,
}

impl fmt::Display for SpaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpaceStatus::Open => "open",
            SpaceStatus::Full => "full",
            SpaceStatus::Ongoing => "ongoing",
            SpaceStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// How attendance is paid for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingType {
    Free,
    Fixed,
    Donation,
}

/// Row of the `spaces` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub id: Uuid,
    pub holder_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Only viewers within this distance may discover the space
    #[serde(default)]
    pub location_radius_km: Option<f64>,
    #[serde(default)]
    pub capacity: Option<i32>,
    pub status: SpaceStatus,
    pub pricing_type: PricingType,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Space {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::from_parts(self.latitude, self.longitude)
    }

    /// Whether a viewer at `viewer` may see this space.
    ///
    /// Spaces without a radius are public. A radius-restricted space is
    /// hidden from viewers whose location is unknown.
    pub fn is_visible_from(&self, viewer: Option<Coordinates>) -> bool {
        let radius = match self.location_radius_km {
            Some(radius) => radius,
            None => return true,
        };
        match (self.coordinates(), viewer) {
            (Some(space), Some(viewer)) => haversine_km(space, viewer) <= radius,
            (None, _) => true,
            (Some(_), None) => false,
        }
    }

    /// Whether `attendees` fills the space
    pub fn is_full_with(&self, attendees: usize) -> bool {
        match self.capacity {
            Some(capacity) => attendees as i64 >= capacity as i64,
            None => false,
        }
    }
}

/// Insert payload for a new space
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSpace {
    pub holder_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_radius_km: Option<f64>,
    pub capacity: Option<i32>,
    pub status: SpaceStatus,
    pub pricing_type: PricingType,
    pub price: Option<f64>,
    pub image_url: Option<String>,
}

impl NewSpace {
    /// A free, open space with only the required fields set
    pub fn new(holder_id: Uuid, title: &str, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            holder_id,
            title: title.to_string(),
            description: None,
            start_time,
            end_time,
            location: None,
            latitude: None,
            longitude: None,
            location_radius_km: None,
            capacity: None,
            status: SpaceStatus::Open,
            pricing_type: PricingType::Free,
            price: None,
            image_url: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure(not_blank(&self.title), "Title is required")?;
        ensure(self.end_time > self.start_time, "End time must be after start time")?;
        if let Some(capacity) = self.capacity {
            ensure(capacity >= 1, "Capacity must be at least 1")?;
        }
        validate_pricing(self.pricing_type, self.price)?;
        if let Some(radius) = self.location_radius_km {
            ensure(radius > 0.0, "Location radius must be positive")?;
        }
        validate_coordinates(self.latitude, self.longitude)
    }
}

/// Partial update of a space
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpaceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SpaceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl SpaceUpdate {
    /// Check the update against the row it will be applied to
    pub fn validate_against(&self, current: &Space) -> Result<()> {
        if let Some(title) = &self.title {
            ensure(not_blank(title), "Title is required")?;
        }
        let start = self.start_time.unwrap_or(current.start_time);
        let end = self.end_time.unwrap_or(current.end_time);
        ensure(end > start, "End time must be after start time")?;
        if let Some(capacity) = self.capacity {
            ensure(capacity >= 1, "Capacity must be at least 1")?;
        }
        Ok(())
    }
}

/// Row of the `space_attendees` join table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceAttendee {
    pub space_id: Uuid,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
}

fn validate_pricing(pricing: PricingType, price: Option<f64>) -> Result<()> {
    match pricing {
        PricingType::Free => ensure(price.is_none(), "Free spaces cannot have a price"),
        PricingType::Fixed => ensure(
            price.map_or(false, |p| p > 0.0),
            "Fixed pricing requires a price greater than zero",
        ),
        PricingType::Donation => ensure(
            price.map_or(true, |p| p >= 0.0),
            "Suggested donation cannot be negative",
        ),
    }
}

fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<()> {
    if let Some(lat) = latitude {
        ensure((-90.0..=90.0).contains(&lat), "Latitude must be between -90 and 90")?;
    }
    if let Some(lon) = longitude {
        ensure((-180.0..=180.0).contains(&lon), "Longitude must be between -180 and 180")?;
    }
    Ok(())
}
