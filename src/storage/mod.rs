//! Object storage: uploads, removal and public URLs

mod types;
mod validation;

use reqwest::{multipart, Client};
use serde_json::json;
use tracing::{debug, info};

use crate::error::Result;
use crate::fetch::{api_error, Fetch, CLIENT_INFO};

pub use types::*;
pub use validation::*;

/// Bucket holding profile pictures
pub const AVATAR_BUCKET: &str = "avatars";

/// Bucket holding space cover images
pub const SPACE_IMAGE_BUCKET: &str = "space-images";

/// Client for the storage service
#[derive(Debug, Clone)]
pub struct Storage {
    url: String,
    key: String,
    token: String,
    client: Client,
}

/// Client for a specific storage bucket
#[derive(Debug)]
pub struct BucketClient<'a> {
    storage: &'a Storage,
    bucket_id: String,
}

impl Storage {
    pub(crate) fn new(url: &str, key: &str, token: &str, client: Client) -> Self {
        Self {
            url: url.to_string(),
            key: key.to_string(),
            token: token.to_string(),
            client,
        }
    }

    fn get_url(&self, path: &str) -> String {
        format!("{}/storage/v1{}", self.url, path)
    }

    /// Get a client for a specific bucket
    pub fn from(&self, bucket_id: &str) -> BucketClient<'_> {
        BucketClient {
            storage: self,
            bucket_id: bucket_id.to_string(),
        }
    }
}

impl<'a> BucketClient<'a> {
    /// Upload bytes to `path` in the bucket
    pub async fn upload(
        &self,
        path: &str,
        data: Vec<u8>,
        options: UploadOptions,
    ) -> Result<UploadResponse> {
        let url = self
            .storage
            .get_url(&format!("/object/{}/{}", self.bucket_id, path));

        let file_name = path.rsplit('/').next().unwrap_or(path).to_string();
        let part = multipart::Part::bytes(data)
            .file_name(file_name)
            .mime_str(&options.content_type)?;
        let form = multipart::Form::new()
            .text("cacheControl", options.cache_control.clone())
            .part("", part);

        debug!(bucket = %self.bucket_id, path, "uploading object");
        let response = self
            .storage
            .client
            .post(&url)
            .header("apikey", &self.storage.key)
            .bearer_auth(&self.storage.token)
            .header("X-Client-Info", CLIENT_INFO)
            .header("x-upsert", options.upsert.to_string())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let uploaded = response.json::<UploadResponse>().await?;
        info!(key = %uploaded.key, "object uploaded");
        Ok(uploaded)
    }

    /// Remove objects from the bucket
    pub async fn remove(&self, paths: &[&str]) -> Result<Vec<RemovedObject>> {
        let url = self.storage.get_url(&format!("/object/{}", self.bucket_id));

        Fetch::delete(&self.storage.client, &url)
            .header("apikey", &self.storage.key)
            .bearer_auth(&self.storage.token)
            .json(&json!({ "prefixes": paths }))?
            .execute::<Vec<RemovedObject>>()
            .await
    }

    /// Public URL of an object in a public bucket
    pub fn get_public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.storage.url, self.bucket_id, path
        )
    }
}
