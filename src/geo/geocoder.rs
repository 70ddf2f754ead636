//! Address lookups against an OpenStreetMap Nominatim server

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ClientOptions;
use crate::error::{Error, Result};
use crate::geo::Coordinates;

/// Shortest query sent to the geocoder
pub const MIN_QUERY_LEN: usize = 3;

/// A resolved address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedAddress {
    pub display_name: String,
    pub coordinates: Coordinates,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
}

/// Forward and reverse geocoding
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Addresses matching free text, best match first
    async fn search(&self, query: &str) -> Result<Vec<GeocodedAddress>>;

    /// The address at a position, if any
    async fn reverse(&self, coordinates: Coordinates) -> Result<Option<GeocodedAddress>>;
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    address: Option<PlaceAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct PlaceAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    postcode: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReverseResponse {
    Found(Place),
    Missing { error: String },
}

impl Place {
    fn into_address(self) -> Option<GeocodedAddress> {
        let latitude = self.lat.trim().parse::<f64>().ok()?;
        let longitude = self.lon.trim().parse::<f64>().ok()?;
        let address = self.address.unwrap_or_default();
        Some(GeocodedAddress {
            display_name: self.display_name,
            coordinates: Coordinates::new(latitude, longitude),
            city: address.city.or(address.town).or(address.village),
            postcode: address.postcode,
            country: address.country,
        })
    }
}

/// Geocoder backed by the public Nominatim API
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    user_agent: String,
    limit: usize,
}

impl NominatimGeocoder {
    pub fn new(client: Client, base_url: &str, user_agent: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            limit: 5,
        }
    }

    pub fn from_options(client: Client, options: &ClientOptions) -> Self {
        Self::new(client, &options.geocoder_url, &options.geocoder_user_agent)
    }

    /// Maximum number of search results
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.clamp(1, 50);
        self
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::geocoding(format!("Geocoding service unreachable: {}", e)))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "geocoding request failed");
            return Err(Error::geocoding(format!(
                "Geocoding failed with status {}",
                response.status().as_u16()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::geocoding(format!("Unexpected geocoding response: {}", e)))
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn search(&self, query: &str) -> Result<Vec<GeocodedAddress>> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            return Ok(Vec::new());
        }

        let places: Vec<Place> = self
            .get(
                "/search",
                &[
                    ("format", "json".to_string()),
                    ("addressdetails", "1".to_string()),
                    ("limit", self.limit.to_string()),
                    ("q", query.to_string()),
                ],
            )
            .await?;

        let results: Vec<GeocodedAddress> = places.into_iter().filter_map(Place::into_address).collect();
        debug!(count = results.len(), "address search finished");
        Ok(results)
    }

    async fn reverse(&self, coordinates: Coordinates) -> Result<Option<GeocodedAddress>> {
        if !coordinates.is_valid() {
            return Err(Error::validation("Coordinates are out of range"));
        }

        let response: ReverseResponse = self
            .get(
                "/reverse",
                &[
                    ("format", "json".to_string()),
                    ("lat", coordinates.latitude.to_string()),
                    ("lon", coordinates.longitude.to_string()),
                ],
            )
            .await?;

        match response {
            ReverseResponse::Found(place) => Ok(place.into_address()),
            ReverseResponse::Missing { error } => {
                debug!("no address at position: {}", error);
                Ok(None)
            }
        }
    }
}
