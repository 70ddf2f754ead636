//! Error handling for the Holistic Spaces client

use std::fmt;
use thiserror::Error;

/// Unified error type for the Holistic Spaces client
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backend answered with a non-success status
    #[error("{message} (status {status})")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Realtime subscription errors
    #[error("Realtime error: {0}")]
    Realtime(String),

    /// WebSocket transport errors
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Edge Function errors
    #[error("Function error: {0}")]
    Function(String),

    /// Address lookup errors
    #[error("Geocoding error: {0}")]
    Geocoding(String),

    /// Form or input validation failed before any call was made
    #[error("{0}")]
    Validation(String),

    /// The current user may not perform the operation
    #[error("Not allowed: {0}")]
    Forbidden(String),

    /// A record that was expected to exist is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Feature that exists in the product surface but has no behavior yet
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// File system errors (session and preference files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new authentication error
    pub fn auth<T: fmt::Display>(msg: T) -> Self {
        Error::Auth(msg.to_string())
    }

    /// Create a new storage error
    pub fn storage<T: fmt::Display>(msg: T) -> Self {
        Error::Storage(msg.to_string())
    }

    /// Create a new realtime error
    pub fn realtime<T: fmt::Display>(msg: T) -> Self {
        Error::Realtime(msg.to_string())
    }

    /// Create a new function error
    pub fn function<T: fmt::Display>(msg: T) -> Self {
        Error::Function(msg.to_string())
    }

    /// Create a new geocoding error
    pub fn geocoding<T: fmt::Display>(msg: T) -> Self {
        Error::Geocoding(msg.to_string())
    }

    /// Create a new validation error
    pub fn validation<T: fmt::Display>(msg: T) -> Self {
        Error::Validation(msg.to_string())
    }

    /// Create a new forbidden error
    pub fn forbidden<T: fmt::Display>(msg: T) -> Self {
        Error::Forbidden(msg.to_string())
    }

    /// Create a new not-found error
    pub fn not_found<T: fmt::Display>(msg: T) -> Self {
        Error::NotFound(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }

    /// HTTP status of an API error, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_displays_backend_message() {
        let err = Error::Api {
            status: 409,
            code: Some("23505".to_string()),
            message: "duplicate key value violates unique constraint".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "duplicate key value violates unique constraint (status 409)"
        );
        assert_eq!(err.status(), Some(409));
    }

    #[test]
    fn not_implemented_names_the_feature() {
        let err = Error::NotImplemented("hotspot detection");
        assert_eq!(err.to_string(), "hotspot detection is not implemented");
        assert_eq!(err.status(), None);
    }
}
