//! Configuration for the Holistic Spaces client

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Default public Nominatim endpoint used for address lookups
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";

/// Connection settings for the hosted backend
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the backend project
    pub url: Url,

    /// Public (anonymous) API key
    pub anon_key: String,

    /// Client options
    pub options: ClientOptions,
}

impl AppConfig {
    /// Creates a new configuration, validating the URL.
    pub fn new(url_str: &str, anon_key: &str) -> Result<Self> {
        let url = Url::parse(url_str)?;
        if anon_key.is_empty() {
            return Err(Error::config("anon_key cannot be empty"));
        }
        Ok(Self {
            url,
            anon_key: anon_key.to_string(),
            options: ClientOptions::default(),
        })
    }

    /// Attempts to create configuration from environment variables.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let url_str = std::env::var("SUPABASE_URL")
            .map_err(|_| Error::config("SUPABASE_URL environment variable not found"))?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .map_err(|_| Error::config("SUPABASE_ANON_KEY environment variable not found"))?;

        let mut config = Self::new(&url_str, &anon_key)?;

        if let Ok(site_url) = std::env::var("HOLISTIC_SITE_URL") {
            config.options = config.options.with_site_url(&site_url);
        }
        if let Ok(geocoder_url) = std::env::var("HOLISTIC_GEOCODER_URL") {
            config.options = config.options.with_geocoder_url(&geocoder_url);
        }
        if let Ok(session_file) = std::env::var("HOLISTIC_SESSION_FILE") {
            config.options = config.options.with_session_file(Some(PathBuf::from(session_file)));
        }

        Ok(config)
    }

    /// Replace the client options
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Base URL without a trailing slash, ready for path concatenation
    pub fn base_url(&self) -> String {
        self.url.as_str().trim_end_matches('/').to_string()
    }
}

/// Configuration options for the client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Whether to refresh the access token before it expires
    pub auto_refresh_token: bool,

    /// Whether to persist the session between runs
    pub persist_session: bool,

    /// Refresh the token when it expires within this window
    pub refresh_margin: Duration,

    /// Where the session is persisted; `None` keeps it in memory only
    pub session_file: Option<PathBuf>,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// The database schema
    pub db_schema: String,

    /// Base URL of the geocoding service
    pub geocoder_url: String,

    /// User agent sent to the geocoding service
    pub geocoder_user_agent: String,

    /// Quiet period before an address search is sent
    pub search_debounce: Duration,

    /// Delay before the space list is refetched after join/leave
    pub refetch_delay: Duration,

    /// Public site URL used to build referral links
    pub site_url: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            auto_refresh_token: true,
            persist_session: true,
            refresh_margin: Duration::from_secs(60),
            session_file: None,
            request_timeout: Some(Duration::from_secs(30)),
            db_schema: "public".to_string(),
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            geocoder_user_agent: concat!("holistic-spaces/", env!("CARGO_PKG_VERSION")).to_string(),
            search_debounce: Duration::from_millis(300),
            refetch_delay: Duration::from_millis(500),
            site_url: "http://localhost:3000".to_string(),
        }
    }
}

impl ClientOptions {
    /// Set whether to automatically refresh the token
    pub fn with_auto_refresh_token(mut self, value: bool) -> Self {
        self.auto_refresh_token = value;
        self
    }

    /// Set whether to persist the session
    pub fn with_persist_session(mut self, value: bool) -> Self {
        self.persist_session = value;
        self
    }

    /// Set the refresh margin
    pub fn with_refresh_margin(mut self, value: Duration) -> Self {
        self.refresh_margin = value;
        self
    }

    /// Set the session file
    pub fn with_session_file(mut self, value: Option<PathBuf>) -> Self {
        self.session_file = value;
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the database schema
    pub fn with_db_schema(mut self, value: &str) -> Self {
        self.db_schema = value.to_string();
        self
    }

    /// Set the geocoder base URL
    pub fn with_geocoder_url(mut self, value: &str) -> Self {
        self.geocoder_url = value.trim_end_matches('/').to_string();
        self
    }

    /// Set the address search debounce window
    pub fn with_search_debounce(mut self, value: Duration) -> Self {
        self.search_debounce = value;
        self
    }

    /// Set the delay before refetching after join/leave
    pub fn with_refetch_delay(mut self, value: Duration) -> Self {
        self.refetch_delay = value;
        self
    }

    /// Set the public site URL
    pub fn with_site_url(mut self, value: &str) -> Self {
        self.site_url = value.trim_end_matches('/').to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_new_valid() {
        let config = AppConfig::new("http://localhost:54321", "dummy-anon-key").unwrap();
        assert_eq!(config.url.to_string(), "http://localhost:54321/");
        assert_eq!(config.base_url(), "http://localhost:54321");
        assert_eq!(config.anon_key, "dummy-anon-key");
    }

    #[test]
    fn config_new_invalid_url() {
        let config = AppConfig::new("not a valid url", "some_anon_key");
        assert!(matches!(config, Err(Error::Url(_))));
    }

    #[test]
    fn config_new_empty_key() {
        match AppConfig::new("http://localhost:54321", "") {
            Err(Error::Config(msg)) => assert!(msg.contains("anon_key cannot be empty")),
            other => panic!("Expected Config error for empty key, got {:?}", other),
        }
    }

    #[test]
    fn default_timings_match_ui_behavior() {
        let options = ClientOptions::default();
        assert_eq!(options.search_debounce, Duration::from_millis(300));
        assert_eq!(options.refetch_delay, Duration::from_millis(500));
        assert!(options.auto_refresh_token);
    }

    #[test]
    fn builders_trim_trailing_slashes() {
        let options = ClientOptions::default()
            .with_site_url("https://spaces.example.org/")
            .with_geocoder_url("http://127.0.0.1:9000/");
        assert_eq!(options.site_url, "https://spaces.example.org");
        assert_eq!(options.geocoder_url, "http://127.0.0.1:9000");
    }
}
