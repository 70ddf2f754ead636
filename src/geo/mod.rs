//! Distances between coordinates and radius filtering of fetched lists

mod geocoder;
mod search;

use serde::{Deserialize, Serialize};

use crate::models::{Profile, Space, TrackedLocation};

pub use geocoder::*;
pub use search::*;

/// Mean earth radius used by [`haversine_km`]
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point on the globe in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Coordinates from two optional columns
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Self::new(latitude, longitude)),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn distance_km(&self, other: Coordinates) -> f64 {
        haversine_km(*self, other)
    }
}

/// Great-circle distance in kilometres
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_KM * c
}

/// Rows that may carry a position
pub trait Located {
    fn position(&self) -> Option<Coordinates>;
}

impl Located for Coordinates {
    fn position(&self) -> Option<Coordinates> {
        Some(*self)
    }
}

impl Located for Space {
    fn position(&self) -> Option<Coordinates> {
        self.coordinates()
    }
}

impl Located for Profile {
    fn position(&self) -> Option<Coordinates> {
        self.coordinates()
    }
}

impl Located for TrackedLocation {
    fn position(&self) -> Option<Coordinates> {
        Some(self.coordinates())
    }
}

/// Keep the items within `radius_km` of `origin`, nearest first.
///
/// Items without a position are dropped.
pub fn within_radius<T: Located>(origin: Coordinates, items: Vec<T>, radius_km: f64) -> Vec<(T, f64)> {
    let mut hits: Vec<(T, f64)> = items
        .into_iter()
        .filter_map(|item| {
            let distance = haversine_km(origin, item.position()?);
            (distance <= radius_km).then_some((item, distance))
        })
        .collect();
    hits.sort_by(|a, b| a.1.total_cmp(&b.1));
    hits
}

/// The item closest to `origin` and its distance
pub fn nearest<T: Located>(origin: Coordinates, items: &[T]) -> Option<(&T, f64)> {
    items
        .iter()
        .filter_map(|item| Some((item, haversine_km(origin, item.position()?))))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}
