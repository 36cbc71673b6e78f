//! Configuration loading for triage services
//!
//! OAuth provider credentials are loaded from (in order of priority):
//! 1. Compile-time embedded credentials (for production builds)
//! 2. JSON file (Google Cloud Console format)
//! 3. Runtime environment variables (fallback)
//!
//! Everything else lives in an optional `triage.json` with serde defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Credentials filename in the triage config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

/// Settings filename in the triage config directory
const SETTINGS_FILE: &str = "triage.json";

/// Environment variable holding the Gemini API key
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Model used when `triage.json` doesn't name one
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// OAuth client credentials and endpoints for the identity provider
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// Google Cloud Console credential file format (installed or web app)
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<InstalledCredentials>,
    web: Option<InstalledCredentials>,
}

#[derive(Deserialize)]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

impl ProviderConfig {
    /// Google OAuth2 endpoints
    pub const GOOGLE_AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    pub const GOOGLE_TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Google provider with the given client credentials
    pub fn google(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: Self::GOOGLE_AUTH_URL.to_string(),
            token_url: Self::GOOGLE_TOKEN_URL.to_string(),
        }
    }

    /// Point the token exchange at a different endpoint
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Whether both client id and secret are present
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// Load credentials using the following priority:
    /// 1. Compile-time embedded credentials (for production builds)
    /// 2. JSON file (~/.config/triage/google-credentials.json)
    /// 3. Runtime environment variables
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: GoogleCredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Self::from_credential_file(creds);
        }

        Self::from_env()
    }

    /// Load credentials embedded at compile time via environment variables.
    /// Build with: GOOGLE_CLIENT_ID=xxx GOOGLE_CLIENT_SECRET=yyy cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        let client_id = option_env!("GOOGLE_CLIENT_ID")?;
        let client_secret = option_env!("GOOGLE_CLIENT_SECRET")?;

        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }

        Some(Self::google(client_id, client_secret))
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(creds)
    }

    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        let installed = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        let mut provider = Self::google(installed.client_id, installed.client_secret);
        if let Some(auth_uri) = installed.auth_uri {
            provider.auth_url = auth_uri;
        }
        if let Some(token_uri) = installed.token_uri {
            provider.token_url = token_uri;
        }
        Ok(provider)
    }

    /// Parse credentials from JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("GOOGLE_CLIENT_ID")
            .context("GOOGLE_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GOOGLE_CLIENT_SECRET")
            .context("GOOGLE_CLIENT_SECRET environment variable not set")?;

        Ok(Self::google(client_id, client_secret))
    }

    /// Get the default credentials file path (~/.config/triage/google-credentials.json)
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }
}

/// Tunables for the triage front ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageSettings {
    /// How many messages the inbox view fetches
    pub inbox_limit: usize,
    /// Optional Gmail search query applied to the inbox listing
    pub inbox_query: Option<String>,
    /// Gemini model used for insights and replies
    pub gemini_model: String,
    /// Reply database filename inside the config directory
    pub database_file: String,
    /// Session token filename inside the config directory
    pub sessions_file: String,
}

impl Default for TriageSettings {
    fn default() -> Self {
        Self {
            inbox_limit: 5,
            inbox_query: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            database_file: "replies.sqlite".to_string(),
            sessions_file: "sessions.json".to_string(),
        }
    }
}

impl TriageSettings {
    /// Load `triage.json` from the config directory, or defaults if absent
    pub fn load() -> Result<Self> {
        config::load_json_or_default(SETTINGS_FILE)
    }

    /// Path of the reply database
    pub fn database_path(&self) -> Option<PathBuf> {
        config::config_path(&self.database_file)
    }

    /// Path of the session token file
    pub fn sessions_path(&self) -> Option<PathBuf> {
        config::config_path(&self.sessions_file)
    }
}

/// Gemini API key from the environment, if set and non-empty
pub fn gemini_api_key() -> Option<String> {
    std::env::var(GEMINI_API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
}
