//! Client-side checks run before a file is uploaded

use std::path::Path;

use uuid::Uuid;

use crate::error::{Error, Result};

const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Size and type limits for one kind of upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Largest accepted file in bytes
    pub max_bytes: usize,

    /// Accepted MIME types
    pub allowed_mime_types: Vec<String>,
}

impl UploadPolicy {
    /// Profile pictures: images up to 5 MB
    pub fn avatar() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            allowed_mime_types: IMAGE_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Space cover images: images up to 10 MB
    pub fn space_image() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            allowed_mime_types: IMAGE_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Check a file against the policy and return its MIME type
    pub fn check(&self, file_name: &str, size: usize) -> Result<&'static str> {
        let mime = mime_type_for(file_name)
            .ok_or_else(|| Error::validation(format!("Unsupported file type: {}", file_name)))?;
        if !self.allowed_mime_types.iter().any(|m| m == mime) {
            return Err(Error::validation(format!("File type {} is not allowed", mime)));
        }
        if size == 0 {
            return Err(Error::validation("File is empty"));
        }
        if size > self.max_bytes {
            return Err(Error::validation(format!(
                "File is too large ({} bytes, limit {} bytes)",
                size, self.max_bytes
            )));
        }
        Ok(mime)
    }
}

/// Lowercased extension of a file name
pub fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// MIME type derived from the file extension
pub fn mime_type_for(file_name: &str) -> Option<&'static str> {
    match extension(file_name)?.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// Object path for a user's upload: `{user_id}/{random}.{ext}`
pub fn object_path(user_id: Uuid, file_name: &str) -> String {
    match extension(file_name) {
        Some(ext) => format!("{}/{}.{}", user_id, Uuid::new_v4(), ext),
        None => format!("{}/{}", user_id, Uuid::new_v4()),
    }
}
