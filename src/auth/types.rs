//! Types for authentication and user management

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::session::Session;
use crate::error::{Error, Result};

/// Response of the sign-up and token endpoints
///
/// With email confirmation enabled the sign-up endpoint answers with the bare
/// user object, so `id`/`email` are captured at the top level as well.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub expires_at: Option<i64>,
    pub user: Option<User>,
    pub id: Option<String>,
    pub email: Option<String>,
}

impl AuthResponse {
    /// The session carried by the response, if tokens were issued
    pub fn session(&self) -> Option<Session> {
        let access_token = self.access_token.clone()?;
        let refresh_token = self.refresh_token.clone()?;
        let expires_in = self.expires_in.unwrap_or(3600);
        let mut session = Session::new(access_token, refresh_token, expires_in, self.user.clone());
        if let Some(expires_at) = self.expires_at {
            session.expires_at = Some(expires_at);
        }
        if let Some(token_type) = &self.token_type {
            session.token_type = token_type.clone();
        }
        Some(session)
    }

    /// The id of the created or signed-in user
    pub fn user_id(&self) -> Result<Uuid> {
        let raw = self
            .user
            .as_ref()
            .map(|u| u.id.as_str())
            .or(self.id.as_deref())
            .ok_or_else(|| Error::auth("Response did not contain a user"))?;
        Uuid::parse_str(raw).map_err(|e| Error::auth(format!("Invalid user id '{}': {}", raw, e)))
    }
}

/// User data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user ID
    pub id: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub app_metadata: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub user_metadata: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub email_confirmed_at: Option<String>,

    #[serde(default)]
    pub last_sign_in_at: Option<String>,

    #[serde(default)]
    pub created_at: Option<String>,
}

impl User {
    /// The user ID as a UUID
    pub fn uuid(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.id)
            .map_err(|e| Error::auth(format!("Invalid user id '{}': {}", self.id, e)))
    }

    /// Display name stored in the user metadata at sign-up
    pub fn full_name(&self) -> Option<&str> {
        self.user_metadata.get("full_name").and_then(|v| v.as_str())
    }
}

/// User attributes that can be updated
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// User metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Metadata attached to a new account
#[derive(Debug, Clone, Serialize)]
pub struct SignUpMetadata {
    pub full_name: String,
    pub invite_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn confirmation_pending_response_has_no_session() {
        let id = Uuid::new_v4();
        let response: AuthResponse = serde_json::from_value(json!({
            "id": id.to_string(),
            "email": "new@example.com",
            "confirmation_sent_at": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert!(response.session().is_none());
        assert_eq!(response.user_id().unwrap(), id);
    }

    #[test]
    fn token_response_builds_session() {
        let id = Uuid::new_v4();
        let response: AuthResponse = serde_json::from_value(json!({
            "access_token": "at",
            "refresh_token": "rt",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 1_900_000_000i64,
            "user": { "id": id.to_string(), "email": "a@example.com",
                      "user_metadata": { "full_name": "Ada" } }
        }))
        .unwrap();
        let session = response.session().unwrap();
        assert_eq!(session.access_token, "at");
        assert_eq!(session.expires_at, Some(1_900_000_000));
        assert_eq!(response.user_id().unwrap(), id);
        assert_eq!(response.user.unwrap().full_name(), Some("Ada"));
    }
}
