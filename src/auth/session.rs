//! Session data and session persistence

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::auth::types::User;
use crate::error::{Error, Result};

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs() as i64
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Session data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,

    pub refresh_token: String,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Lifetime in seconds at issue time
    #[serde(default)]
    pub expires_in: i64,

    /// Expiry as a unix timestamp
    #[serde(default)]
    pub expires_at: Option<i64>,

    #[serde(default)]
    pub user: Option<User>,
}

/// Claims read from an access token
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl Session {
    /// Create a new session expiring `expires_in` seconds from now
    pub fn new(
        access_token: String,
        refresh_token: String,
        expires_in: i64,
        user: Option<User>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: default_token_type(),
            expires_in,
            expires_at: Some(now_secs() + expires_in),
            user,
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_within(Duration::ZERO)
    }

    /// Check if the session expires within `margin`
    pub fn expires_within(&self, margin: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => now_secs() + margin.as_secs() as i64 >= expires_at,
            None => false,
        }
    }

    /// Read the access token claims.
    ///
    /// The signature is not checked: the token was issued to us and is only
    /// inspected for its subject and expiry.
    pub fn claims(&self) -> Result<AccessTokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<AccessTokenClaims>(
            &self.access_token,
            &DecodingKey::from_secret(&[]),
            &validation,
        )?;
        Ok(data.claims)
    }

    /// The signed-in user's id, from the embedded user or the token subject
    pub fn user_id(&self) -> Result<Uuid> {
        if let Some(user) = &self.user {
            return user.uuid();
        }
        let claims = self.claims()?;
        Uuid::parse_str(&claims.sub)
            .map_err(|e| Error::auth(format!("Invalid token subject '{}': {}", claims.sub, e)))
    }

    /// Fill in an unknown expiry from the token claims
    pub(crate) fn with_expiry_from_claims(mut self) -> Self {
        if self.expires_at.is_none() {
            if let Ok(claims) = self.claims() {
                self.expires_at = claims.exp;
            }
        }
        self
    }
}

/// Storage for the signed-in session between runs
pub trait SessionStore: Send + Sync {
    /// Load a previously saved session
    fn load(&self) -> Result<Option<Session>>;

    /// Save the current session
    fn save(&self, session: &Session) -> Result<()>;

    /// Forget the saved session
    fn clear(&self) -> Result<()>;
}

/// Keeps the session for the lifetime of the process only
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>> {
        Ok(self.session.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Persists the session as a JSON file
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let session: Session = serde_json::from_str(&raw)?;
        debug!(path = %self.path.display(), "restored persisted session");
        Ok(Some(session.with_expiry_from_claims()))
    }

    fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = private_file(&self.path)?;
        file.write_all(&serde_json::to_vec_pretty(session)?)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Open for writing, readable by the owner only. The session file holds the refresh token.
fn private_file(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let file = options.open(path)?;
    // mode() only applies to newly created files
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    Ok(file)
}
