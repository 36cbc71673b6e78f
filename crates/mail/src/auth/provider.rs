//! Identity provider token endpoint
//!
//! The [`TokenEndpoint`] trait is the seam between the token lifecycle and the
//! network. [`HttpTokenEndpoint`] talks to the real endpoint with ureq; tests
//! substitute fakes.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::ProviderConfig;

/// Consent (authorization code exchange) response from the provider
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConsentResponse {
    pub access_token: String,
    /// Usually only present on the first consent
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Absolute expiry in epoch seconds, preferred over `expires_in`
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl ConsentResponse {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_in: None,
            expires_at: None,
            scope: None,
            token_type: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expires_in(mut self, expires_in: u64) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    pub fn with_expires_at(mut self, expires_at: i64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Successful refresh exchange response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Ignored: refresh tokens are not rotated on refresh
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl RefreshResponse {
    pub fn new(access_token: impl Into<String>, expires_in: Option<u64>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_in,
            refresh_token: None,
            scope: None,
            token_type: None,
        }
    }
}

/// Why a refresh exchange did not produce a token
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token stored for this session")]
    MissingRefreshToken,
    #[error("token endpoint returned HTTP {0}")]
    Status(u16),
    #[error("token endpoint request failed: {0}")]
    Transport(String),
    #[error("malformed token response: {0}")]
    Malformed(String),
}

/// Token endpoint operations used by the session lifecycle
pub trait TokenEndpoint: Send + Sync {
    /// `grant_type=refresh_token` exchange
    fn refresh(
        &self,
        provider: &ProviderConfig,
        refresh_token: &str,
    ) -> Result<RefreshResponse, RefreshError>;

    /// `grant_type=authorization_code` exchange that completes a consent
    fn exchange_code(
        &self,
        provider: &ProviderConfig,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ConsentResponse>;
}

/// Token endpoint over HTTPS (form-encoded POST)
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpTokenEndpoint;

impl TokenEndpoint for HttpTokenEndpoint {
    fn refresh(
        &self,
        provider: &ProviderConfig,
        refresh_token: &str,
    ) -> Result<RefreshResponse, RefreshError> {
        let response = ureq::post(&provider.token_url).send_form([
            ("client_id", provider.client_id.as_str()),
            ("client_secret", provider.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ]);

        let mut response = match response {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(code)) => return Err(RefreshError::Status(code)),
            Err(e) => return Err(RefreshError::Transport(e.to_string())),
        };

        let token: RefreshResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| RefreshError::Malformed(e.to_string()))?;

        validate_refresh(token)
    }

    fn exchange_code(
        &self,
        provider: &ProviderConfig,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ConsentResponse> {
        let mut response = ureq::post(&provider.token_url)
            .send_form([
                ("client_id", provider.client_id.as_str()),
                ("client_secret", provider.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
            ])
            .context("Failed to exchange authorization code")?;

        let consent: ConsentResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        anyhow::ensure!(
            !consent.access_token.is_empty(),
            "Token response did not contain an access token"
        );
        Ok(consent)
    }
}

/// A 2xx body without a usable `access_token` counts as a failure
pub(crate) fn validate_refresh(token: RefreshResponse) -> Result<RefreshResponse, RefreshError> {
    if token.access_token.trim().is_empty() {
        return Err(RefreshError::Malformed("empty access_token".to_string()));
    }
    Ok(token)
}
