//! Holistic Spaces client library
//!
//! A typed client for the Holistic Spaces community booking backend: invite
//! gated signup, space and event listings with optimistic join/leave,
//! registrations and liability agreements, admin tools, referrals, and
//! location based discovery.

pub mod auth;
pub mod config;
pub mod error;
pub mod fetch;
pub mod functions;
pub mod geo;
pub mod invite;
pub mod models;
pub mod postgrest;
pub mod realtime;
pub mod repository;
pub mod services;
pub mod storage;
pub mod tracking;

use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;

use crate::auth::{Auth, FileSessionStore, MemorySessionStore, SessionStore};
use crate::config::{AppConfig, ClientOptions};
use crate::error::Result;
use crate::functions::Functions;
use crate::geo::NominatimGeocoder;
use crate::postgrest::{Postgrest, RpcCall, TableQuery};
use crate::realtime::RealtimeClient;
use crate::storage::Storage;

pub use crate::error::Error;

/// The main entry point: one HTTP client and one auth session shared by
/// every service client
#[derive(Clone)]
pub struct Backend {
    config: AppConfig,
    http_client: Client,
    auth: Auth,
}

impl Backend {
    /// Create a backend client. The session is persisted to
    /// `options.session_file` when one is configured.
    ///
    /// # Example
    ///
    /// ```
    /// use holistic_spaces::{Backend, config::AppConfig};
    ///
    /// let config = AppConfig::new("https://your-project.supabase.co", "your-anon-key").unwrap();
    /// let backend = Backend::new(config).unwrap();
    /// let query = backend.from("spaces").select("*");
    /// ```
    pub fn new(config: AppConfig) -> Result<Self> {
        let store: Arc<dyn SessionStore> = match &config.options.session_file {
            Some(path) => Arc::new(FileSessionStore::new(path.clone())),
            None => Arc::new(MemorySessionStore::default()),
        };
        Self::with_session_store(config, store)
    }

    /// Create a backend client with a custom session store
    pub fn with_session_store(config: AppConfig, store: Arc<dyn SessionStore>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        let auth = Auth::new(
            &config.base_url(),
            &config.anon_key,
            http_client.clone(),
            config.options.clone(),
            store,
        );

        Ok(Self {
            config,
            http_client,
            auth,
        })
    }

    /// Create a backend client from `SUPABASE_URL` / `SUPABASE_ANON_KEY`
    pub fn from_env() -> Result<Self> {
        Self::new(AppConfig::from_env()?)
    }

    /// The auth client
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn options(&self) -> &ClientOptions {
        &self.config.options
    }

    /// Database client authorized with the current session
    pub fn database(&self) -> Postgrest {
        Postgrest::new(
            &self.config.base_url(),
            &self.config.anon_key,
            &self.auth.bearer_token(),
            &self.config.options.db_schema,
            self.http_client.clone(),
        )
    }

    /// Start a query on a table or view
    pub fn from(&self, table: &str) -> TableQuery {
        self.database().from(table)
    }

    /// Call a database function
    pub fn rpc<P: Serialize>(&self, function: &str, params: &P) -> Result<RpcCall> {
        self.database().rpc(function, params)
    }

    /// Object storage client
    pub fn storage(&self) -> Storage {
        Storage::new(
            &self.config.base_url(),
            &self.config.anon_key,
            &self.auth.bearer_token(),
            self.http_client.clone(),
        )
    }

    /// Edge functions client
    pub fn functions(&self) -> Functions {
        Functions::new(
            &self.config.base_url(),
            &self.config.anon_key,
            &self.auth.bearer_token(),
            self.http_client.clone(),
        )
    }

    /// Realtime client
    pub fn realtime(&self) -> RealtimeClient {
        RealtimeClient::new(
            &self.config.base_url(),
            &self.config.anon_key,
            &self.auth.bearer_token(),
        )
    }

    /// Address lookup client
    pub fn geocoder(&self) -> NominatimGeocoder {
        NominatimGeocoder::from_options(self.http_client.clone(), &self.config.options)
    }

    /// Refresh the session if it is about to expire, then hand out a database client
    pub async fn fresh_database(&self) -> Result<Postgrest> {
        self.auth.ensure_fresh_session().await?;
        Ok(self.database())
    }

    /// Like [`Backend::storage`], after refreshing an expiring session
    pub async fn fresh_storage(&self) -> Result<Storage> {
        self.auth.ensure_fresh_session().await?;
        Ok(self.storage())
    }

    /// Like [`Backend::functions`], after refreshing an expiring session
    pub async fn fresh_functions(&self) -> Result<Functions> {
        self.auth.ensure_fresh_session().await?;
        Ok(self.functions())
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::{AppConfig, ClientOptions};
    pub use crate::error::{Error, Result};
    pub use crate::geo::{haversine_km, Coordinates, Geocoder};
    pub use crate::invite::{display_invite_code, normalize_invite_code};
    pub use crate::models::*;
    pub use crate::repository::SupabaseStore;
    pub use crate::Backend;
}
