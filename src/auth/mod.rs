//! Authentication and session management

mod session;
mod types;

use reqwest::Client;
use serde_json::json;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ClientOptions;
use crate::error::{Error, Result};
use crate::fetch::Fetch;

pub use session::*;
pub use types::*;

/// Client for the hosted auth service
#[derive(Clone)]
pub struct Auth {
    url: String,
    key: String,
    client: Client,
    session: Arc<RwLock<Option<Session>>>,
    store: Arc<dyn SessionStore>,
    options: ClientOptions,
}

impl Auth {
    /// Create a new Auth client, restoring a persisted session when enabled
    pub(crate) fn new(
        url: &str,
        key: &str,
        client: Client,
        options: ClientOptions,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let restored = if options.persist_session {
            match store.load() {
                Ok(session) => session,
                Err(e) => {
                    warn!("ignoring unreadable persisted session: {}", e);
                    None
                }
            }
        } else {
            None
        };
        if restored.is_some() {
            info!("restored persisted session");
        }

        Self {
            url: url.to_string(),
            key: key.to_string(),
            client,
            session: Arc::new(RwLock::new(restored)),
            store,
            options,
        }
    }

    fn get_auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.url, path)
    }

    /// Sign up a new user. Metadata is stored on the auth user.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<AuthResponse> {
        let url = self.get_auth_url("/signup");

        let body = json!({
            "email": email,
            "password": password,
            "data": metadata,
        });

        let result = Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .json(&body)?
            .execute::<AuthResponse>()
            .await?;

        if let Some(session) = result.session() {
            self.store_session(session);
        }

        info!("signed up new account");
        Ok(result)
    }

    /// Sign in a user with email and password
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let url = self.get_auth_url("/token");

        let body = json!({
            "email": email,
            "password": password,
        });

        let result = Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .query_pair("grant_type", "password")
            .json(&body)?
            .execute::<AuthResponse>()
            .await?;

        let session = result
            .session()
            .ok_or_else(|| Error::auth("Sign-in response did not contain a session"))?;
        self.store_session(session.clone());

        info!("signed in");
        Ok(session)
    }

    /// Exchange the refresh token for a new session
    pub async fn refresh_session(&self) -> Result<Session> {
        let refresh_token = self
            .get_session()
            .map(|s| s.refresh_token)
            .ok_or_else(|| Error::auth("Not logged in"))?;

        let url = self.get_auth_url("/token");

        let result = Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .query_pair("grant_type", "refresh_token")
            .json(&json!({ "refresh_token": refresh_token }))?
            .execute::<AuthResponse>()
            .await?;

        let session = result
            .session()
            .ok_or_else(|| Error::auth("Refresh response did not contain a session"))?;
        self.store_session(session.clone());

        debug!("access token refreshed");
        Ok(session)
    }

    /// Refresh the session when it is about to expire.
    ///
    /// Returns the session to use for the next request, or `None` when
    /// nobody is signed in.
    pub async fn ensure_fresh_session(&self) -> Result<Option<Session>> {
        let session = match self.get_session() {
            Some(session) => session,
            None => return Ok(None),
        };

        if self.options.auto_refresh_token && session.expires_within(self.options.refresh_margin) {
            debug!("session expires soon, refreshing");
            return self.refresh_session().await.map(Some);
        }

        Ok(Some(session))
    }

    /// Sign out the current user. The local session is dropped even when the
    /// logout request fails.
    pub async fn sign_out(&self) -> Result<()> {
        let token = self
            .get_session()
            .map(|s| s.access_token)
            .ok_or_else(|| Error::auth("Not logged in"))?;

        let url = self.get_auth_url("/logout");

        let result = Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .bearer_auth(&token)
            .execute_empty()
            .await;

        self.clear_session();
        info!("signed out");
        result
    }

    /// Send a password reset email
    pub async fn reset_password_for_email(&self, email: &str, redirect_to: Option<&str>) -> Result<()> {
        let url = self.get_auth_url("/recover");

        let mut fetch = Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .bearer_auth(&self.key);
        if let Some(redirect_to) = redirect_to {
            fetch = fetch.query_pair("redirect_to", redirect_to);
        }

        fetch.json(&json!({ "email": email }))?.execute_empty().await
    }

    /// Get the user data for the currently authenticated user
    pub async fn get_user(&self) -> Result<User> {
        let token = self
            .get_session()
            .map(|s| s.access_token)
            .ok_or_else(|| Error::auth("Not logged in"))?;

        let url = self.get_auth_url("/user");

        Fetch::get(&self.client, &url)
            .header("apikey", &self.key)
            .bearer_auth(&token)
            .execute::<User>()
            .await
    }

    /// Update the user data
    pub async fn update_user(&self, attributes: &UserAttributes) -> Result<User> {
        let token = self
            .get_session()
            .map(|s| s.access_token)
            .ok_or_else(|| Error::auth("Not logged in"))?;

        let url = self.get_auth_url("/user");

        Fetch::put(&self.client, &url)
            .header("apikey", &self.key)
            .bearer_auth(&token)
            .json(attributes)?
            .execute::<User>()
            .await
    }

    /// Get the current session
    pub fn get_session(&self) -> Option<Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Set the session, e.g. one obtained out of band
    pub fn set_session(&self, session: Session) {
        self.store_session(session);
    }

    /// Bearer token for data requests: the user's access token, or the
    /// public key when nobody is signed in
    pub fn bearer_token(&self) -> String {
        self.get_session()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.key.clone())
    }

    /// The signed-in user's id
    pub fn current_user_id(&self) -> Result<Uuid> {
        self.get_session()
            .ok_or_else(|| Error::auth("Not logged in"))?
            .user_id()
    }

    fn store_session(&self, session: Session) {
        if self.options.persist_session {
            if let Err(e) = self.store.save(&session) {
                warn!("failed to persist session: {}", e);
            }
        }
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    fn clear_session(&self) {
        if let Err(e) = self.store.clear() {
            warn!("failed to clear persisted session: {}", e);
        }
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
