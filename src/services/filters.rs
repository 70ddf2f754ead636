//! Client-side filtering of the fetched space list

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::geo::{haversine_km, within_radius, Coordinates, Located};
use crate::models::{PricingType, SpaceStatus};
use crate::services::spaces::SpaceListing;

/// Filter form of the space list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpaceFilters {
    /// Case-insensitive match on title, description and location
    pub search: Option<String>,
    pub status: Option<SpaceStatus>,
    pub pricing: Option<PricingType>,
    /// Only spaces starting at or after this moment
    pub starts_after: Option<DateTime<Utc>>,
    /// Only spaces starting before this moment
    pub starts_before: Option<DateTime<Utc>>,
    /// Only spaces within `radius_km` of a point
    pub near: Option<(Coordinates, f64)>,
    pub holder_id: Option<Uuid>,
    pub joined_only: bool,
    pub with_room_only: bool,
}

impl SpaceFilters {
    pub fn matches(&self, listing: &SpaceListing) -> bool {
        let space = &listing.space;

        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = [Some(space.title.as_str()), space.description.as_deref(), space.location.as_deref()]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if self.status.map_or(false, |status| space.status != status) {
            return false;
        }
        if self.pricing.map_or(false, |pricing| space.pricing_type != pricing) {
            return false;
        }
        if self.starts_after.map_or(false, |after| space.start_time < after) {
            return false;
        }
        if self.starts_before.map_or(false, |before| space.start_time >= before) {
            return false;
        }
        if self.holder_id.map_or(false, |holder| space.holder_id != holder) {
            return false;
        }
        if self.joined_only && !listing.is_member {
            return false;
        }
        if self.with_room_only && space.is_full_with(listing.attendee_count) {
            return false;
        }
        if let Some((origin, radius_km)) = self.near {
            match space.coordinates() {
                Some(position) if haversine_km(origin, position) <= radius_km => {}
                _ => return false,
            }
        }
        true
    }

    /// Matching listings; nearest first with a location filter, otherwise by start time
    pub fn apply(&self, listings: &[SpaceListing]) -> Vec<SpaceListing> {
        let mut matched: Vec<SpaceListing> = listings.iter().filter(|l| self.matches(l)).cloned().collect();
        match self.near {
            Some((origin, radius_km)) => within_radius(origin, matched, radius_km)
                .into_iter()
                .map(|(listing, _)| listing)
                .collect(),
            None => {
                matched.sort_by_key(|l| l.space.start_time);
                matched
            }
        }
    }
}

impl Located for SpaceListing {
    fn position(&self) -> Option<Coordinates> {
        self.space.coordinates()
    }
}
