//! Types for storage operations

use serde::{Deserialize, Serialize};

/// Response of an upload request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// `{bucket}/{path}` of the stored object
    #[serde(rename = "Key")]
    pub key: String,

    #[serde(rename = "Id", default)]
    pub id: Option<String>,
}

/// Options for uploading a file
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Cache control max-age in seconds
    pub cache_control: String,

    /// Content type of the uploaded bytes
    pub content_type: String,

    /// Overwrite an existing object at the same path
    pub upsert: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            cache_control: "3600".to_string(),
            content_type: "application/octet-stream".to_string(),
            upsert: false,
        }
    }
}

impl UploadOptions {
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }
}

/// Entry of a storage remove response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedObject {
    pub name: String,

    #[serde(default)]
    pub bucket_id: Option<String>,
}
