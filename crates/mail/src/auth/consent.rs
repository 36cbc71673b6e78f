//! Interactive OAuth2 consent (authorization code flow)
//!
//! Opens the provider's consent page in a browser and receives the redirect
//! on a loopback listener. Offline access and a forced consent prompt are
//! requested so the provider hands out a refresh token.

use anyhow::{Context, Result};
use base64::Engine;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use log::{info, warn};
use rand::{RngCore, rngs::OsRng};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use url::Url;

use super::provider::{ConsentResponse, TokenEndpoint};
use super::session::SessionManager;
use super::token::SessionToken;
use crate::config::ProviderConfig;

/// Scopes requested at consent
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.modify",
];

/// Port range to try for the local OAuth callback server
const PORT_RANGE_START: u16 = 8080;
const PORT_RANGE_END: u16 = 8090;

/// Query parameters of the provider's redirect
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub state: Option<String>,
}

/// Build the consent URL
pub fn authorization_url(provider: &ProviderConfig, redirect_uri: &str, state: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
        provider.auth_url,
        urlencoding::encode(&provider.client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&SCOPES.join(" ")),
        urlencoding::encode(state),
    )
}

/// Run the consent flow and store the resulting session record
pub fn sign_in_interactive(sessions: &SessionManager, session_id: &str) -> Result<SessionToken> {
    let consent = run_consent_flow(sessions.provider(), sessions.endpoint())?;
    sessions.sign_in(session_id, consent)
}

/// Run the consent flow up to the code exchange
pub fn run_consent_flow(
    provider: &ProviderConfig,
    endpoint: &dyn TokenEndpoint,
) -> Result<ConsentResponse> {
    anyhow::ensure!(
        provider.is_complete(),
        "OAuth client id and secret are required to sign in"
    );

    let (listener, port) = start_local_server()?;
    let redirect_uri = format!("http://localhost:{}", port);
    let state = random_state();
    let auth_url = authorization_url(provider, &redirect_uri, &state);

    println!("\n=== Gmail sign-in required ===");
    println!("Opening browser for consent...");
    println!("If the browser doesn't open, visit: {}", auth_url);

    if let Err(e) = open::that(&auth_url) {
        warn!("Failed to open browser: {}. Open the URL manually.", e);
    }

    info!("Waiting for OAuth callback on port {}", port);
    let code = wait_for_callback(&listener, &state)?;

    info!("Exchanging authorization code for tokens");
    endpoint.exchange_code(provider, &code, &redirect_uri)
}

/// Bind the first free port in the callback range
fn start_local_server() -> Result<(TcpListener, u16)> {
    for port in PORT_RANGE_START..=PORT_RANGE_END {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
            return Ok((listener, port));
        }
    }
    anyhow::bail!(
        "Could not bind to any port in range {}-{}",
        PORT_RANGE_START,
        PORT_RANGE_END
    )
}

/// Accept one redirect and extract the authorization code
fn wait_for_callback(listener: &TcpListener, expected_state: &str) -> Result<String> {
    let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

    let mut request_line = String::new();
    BufReader::new(&stream)
        .read_line(&mut request_line)
        .context("Failed to read request")?;

    let params = parse_callback(&request_line);
    let state_ok = params.state.as_deref() == Some(expected_state);

    let (status, body) = if params.code.is_some() && state_ok {
        ("200 OK", "Sign-in complete. You can close this window.")
    } else {
        ("400 Bad Request", "Sign-in failed. Please try again.")
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
        status, body
    );
    if let Err(e) = stream.write_all(response.as_bytes()) {
        warn!("Failed to answer OAuth callback: {}", e);
    }

    if let Some(err) = params.error {
        anyhow::bail!("OAuth error: {}", err);
    }
    anyhow::ensure!(state_ok, "OAuth callback state mismatch");
    params.code.context("No authorization code received")
}

/// Parse `GET /?code=...&state=... HTTP/1.1`
pub fn parse_callback(request_line: &str) -> CallbackParams {
    let Some(target) = request_line.split_whitespace().nth(1) else {
        return CallbackParams::default();
    };
    let Ok(url) = Url::parse("http://localhost").and_then(|base| base.join(target)) else {
        return CallbackParams::default();
    };

    let mut params = CallbackParams::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            _ => {}
        }
    }
    params
}

/// Unpredictable value for the `state` parameter, 32 bytes from the OS RNG
fn random_state() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}
