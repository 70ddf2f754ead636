//! The signed-in member's own profile

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::geo::{Coordinates, GeocodedAddress, Geocoder};
use crate::models::*;
use crate::repository::ProfileGateway;
use crate::storage::{object_path, Storage, UploadOptions, UploadPolicy, AVATAR_BUCKET};

pub struct ProfileService {
    profiles: Arc<dyn ProfileGateway>,
    geocoder: Arc<dyn Geocoder>,
    user_id: Uuid,
}

impl ProfileService {
    pub fn new(profiles: Arc<dyn ProfileGateway>, geocoder: Arc<dyn Geocoder>, user_id: Uuid) -> Self {
        Self {
            profiles,
            geocoder,
            user_id,
        }
    }

    pub async fn get(&self) -> Result<Profile> {
        self.profiles
            .get_profile(self.user_id)
            .await?
            .ok_or_else(|| Error::not_found("Profile not found"))
    }

    /// Apply an edit and recompute the completion flag
    pub async fn update(&self, mut update: ProfileUpdate) -> Result<Profile> {
        if let Some(name) = update.full_name.as_deref() {
            if name.trim().is_empty() {
                return Err(Error::validation("Full name is required"));
            }
        }
        if let Some(expertise) = update.expertise.take() {
            let mut seen = HashSet::new();
            let tags: Vec<String> = expertise
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty() && seen.insert(t.clone()))
                .collect();
            update.expertise = Some(tags);
        }

        let current = self.get().await?;
        let update = update.with_completion(&current);
        self.profiles.update_profile(self.user_id, &update).await
    }

    /// Resolve a typed address and store it with its coordinates
    pub async fn set_address(&self, query: &str) -> Result<Profile> {
        let found: Option<GeocodedAddress> = self.geocoder.search(query).await?.into_iter().next();
        let address = found.ok_or_else(|| Error::validation(format!("No address found for '{}'", query.trim())))?;
        self.store_address(address.display_name, address.coordinates).await
    }

    /// Store the current position, named by reverse geocoding when possible
    pub async fn set_position(&self, coordinates: Coordinates) -> Result<Profile> {
        let name = match self.geocoder.reverse(coordinates).await? {
            Some(address) => address.display_name,
            None => format!("{:.5}, {:.5}", coordinates.latitude, coordinates.longitude),
        };
        self.store_address(name, coordinates).await
    }

    async fn store_address(&self, address: String, coordinates: Coordinates) -> Result<Profile> {
        self.update(ProfileUpdate {
            address: Some(address),
            latitude: Some(coordinates.latitude),
            longitude: Some(coordinates.longitude),
            ..Default::default()
        })
        .await
    }

    /// Upload a new profile picture and point the profile at it.
    ///
    /// Pass a client from [`Backend::fresh_storage`](crate::Backend::fresh_storage)
    /// so the upload is not sent with an expired token.
    pub async fn upload_avatar(&self, storage: &Storage, file_name: &str, data: Vec<u8>) -> Result<Profile> {
        let content_type = UploadPolicy::avatar().check(file_name, data.len())?;
        let path = object_path(self.user_id, file_name);

        let bucket = storage.from(AVATAR_BUCKET);
        bucket
            .upload(
                &path,
                data,
                UploadOptions::default()
                    .with_content_type(content_type)
                    .with_upsert(true),
            )
            .await?;
        let avatar_url = bucket.get_public_url(&path);
        info!(%avatar_url, "avatar uploaded");

        self.update(ProfileUpdate {
            avatar_url: Some(avatar_url),
            ..Default::default()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct Profiles {
        profile: Mutex<Profile>,
        updates: Mutex<Vec<ProfileUpdate>>,
    }

    #[async_trait]
    impl ProfileGateway for Profiles {
        async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
            let profile = self.profile.lock().unwrap().clone();
            Ok((profile.id == user_id).then(|| profile))
        }
        async fn list_profiles(&self) -> Result<Vec<Profile>> {
            Ok(vec![self.profile.lock().unwrap().clone()])
        }
        async fn upsert_profile(&self, _: &NewProfile) -> Result<Profile> {
            unreachable!()
        }
        async fn update_profile(&self, _: Uuid, update: &ProfileUpdate) -> Result<Profile> {
            self.updates.lock().unwrap().push(update.clone());
            let mut profile = self.profile.lock().unwrap();
            if let Some(v) = &update.bio {
                profile.bio = Some(v.clone());
            }
            if let Some(v) = &update.address {
                profile.address = Some(v.clone());
            }
            profile.latitude = update.latitude.or(profile.latitude);
            profile.longitude = update.longitude.or(profile.longitude);
            if let Some(v) = &update.avatar_url {
                profile.avatar_url = Some(v.clone());
            }
            if let Some(v) = update.profile_completed {
                profile.profile_completed = v;
            }
            Ok(profile.clone())
        }
    }

    struct OnePlace;

    #[async_trait]
    impl Geocoder for OnePlace {
        async fn search(&self, query: &str) -> Result<Vec<GeocodedAddress>> {
            if query.contains("nowhere") {
                return Ok(Vec::new());
            }
            Ok(vec![GeocodedAddress {
                display_name: "1 Main St, Springfield".into(),
                coordinates: Coordinates::new(52.37, 4.89),
                city: Some("Springfield".into()),
                postcode: None,
                country: None,
            }])
        }
        async fn reverse(&self, _: Coordinates) -> Result<Option<GeocodedAddress>> {
            Ok(None)
        }
    }

    fn service() -> (ProfileService, Arc<Profiles>, Uuid) {
        let id = Uuid::new_v4();
        let profiles = Arc::new(Profiles {
            profile: Mutex::new(
                serde_json::from_value(json!({ "id": id, "full_name": "Ada", "bio": "Breathwork" })).unwrap(),
            ),
            updates: Mutex::new(Vec::new()),
        });
        (ProfileService::new(profiles.clone(), Arc::new(OnePlace), id), profiles, id)
    }

    #[tokio::test]
    async fn address_completes_profile() {
        let (service, profiles, _) = service();
        let profile = service.set_address("1 main st").await.unwrap();
        assert_eq!(profile.address.as_deref(), Some("1 Main St, Springfield"));
        assert_eq!(profile.coordinates(), Some(Coordinates::new(52.37, 4.89)));
        assert!(profile.profile_completed);

        let err = service.set_address("nowhere at all").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(profiles.updates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn position_without_address_uses_coordinates() {
        let (service, _, _) = service();
        let profile = service.set_position(Coordinates::new(1.5, 2.25)).await.unwrap();
        assert_eq!(profile.address.as_deref(), Some("1.50000, 2.25000"));
    }

    #[tokio::test]
    async fn blank_name_rejected() {
        let (service, profiles, _) = service();
        let update = ProfileUpdate {
            full_name: Some("  ".into()),
            ..Default::default()
        };
        assert!(service.update(update).await.is_err());
        assert!(profiles.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn expertise_is_trimmed_and_deduplicated_in_order() {
        let (service, profiles, _) = service();
        let update = ProfileUpdate {
            expertise: Some(vec!["yoga".into(), " reiki ".into(), "yoga".into(), "".into(), "reiki".into()]),
            ..Default::default()
        };
        service.update(update).await.unwrap();

        let sent = profiles.updates.lock().unwrap();
        assert_eq!(sent[0].expertise, Some(vec!["yoga".to_string(), "reiki".to_string()]));
    }

    #[tokio::test]
    async fn avatar_upload_points_profile_at_public_url() {
        use wiremock::matchers::{method, path_regex};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/storage/v1/object/avatars/[0-9a-f-]+/[0-9a-f-]+\.png$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "avatars/x.png" })))
            .expect(1)
            .mount(&server)
            .await;

        let (service, _, id) = service();
        let storage = Storage::new(&server.uri(), "anon", "token", reqwest::Client::new());

        let profile = service.upload_avatar(&storage, "me.PNG", vec![1, 2, 3]).await.unwrap();
        let url = profile.avatar_url.unwrap();
        assert!(url.starts_with(&format!("{}/storage/v1/object/public/avatars/{}/", server.uri(), id)));
        assert!(url.ends_with(".png"));

        let err = service.upload_avatar(&storage, "notes.pdf", vec![1]).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
