//! Turns raw GPS fixes into a list of places the member keeps returning to

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::geo::{nearest, Coordinates};
use crate::models::{NewTrackedLocation, TrackedLocation};
use crate::repository::LocationGateway;

/// Fixes closer than this to a known place count as a visit to it
pub const SAME_PLACE_RADIUS_KM: f64 = 0.1;

/// Result of recording a position
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    /// The fix matched a known place; its visit count was bumped
    Existing(TrackedLocation),
    /// The fix was far from every known place and was stored as a new one
    Created(TrackedLocation),
}

impl TrackOutcome {
    pub fn location(&self) -> &TrackedLocation {
        match self {
            TrackOutcome::Existing(location) | TrackOutcome::Created(location) => location,
        }
    }
}

/// A cluster of repeated visits worth suggesting as a space location
#[derive(Debug, Clone, PartialEq)]
pub struct Hotspot {
    pub center: Coordinates,
    pub visits: u32,
}

pub struct LocationTracker {
    gateway: Arc<dyn LocationGateway>,
    user_id: Uuid,
}

impl LocationTracker {
    pub fn new(gateway: Arc<dyn LocationGateway>, user_id: Uuid) -> Self {
        Self { gateway, user_id }
    }

    /// Record a GPS fix against the member's known places
    pub async fn record_position(&self, position: Coordinates) -> Result<TrackOutcome> {
        if !position.is_valid() {
            return Err(Error::validation("Coordinates are out of range"));
        }

        let known = self.gateway.list_locations(self.user_id).await?;
        let now = Utc::now();

        if let Some((place, distance)) = nearest(position, &known) {
            if distance <= SAME_PLACE_RADIUS_KM {
                debug!(location_id = %place.id, distance_km = distance, "fix matches known place");
                let updated = self
                    .gateway
                    .record_visit(place.id, place.visit_count.saturating_add(1), now)
                    .await?;
                return Ok(TrackOutcome::Existing(updated));
            }
        }

        let created = self
            .gateway
            .create_location(&NewTrackedLocation {
                user_id: self.user_id,
                latitude: position.latitude,
                longitude: position.longitude,
                visit_count: 1,
                last_visited_at: now,
            })
            .await?;
        info!(location_id = %created.id, "new place recorded");
        Ok(TrackOutcome::Created(created))
    }

    /// Hotspot detection has no defined clustering or persistence yet.
    pub async fn detect_hotspot(&self) -> Result<Vec<Hotspot>> {
        Err(Error::NotImplemented("hotspot detection"))
    }
}
