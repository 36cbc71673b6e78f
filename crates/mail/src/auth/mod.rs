//! OAuth session handling
//!
//! - `token`: the session token record and its freshness/refresh lifecycle
//! - `provider`: token endpoint seam and wire types
//! - `session`: persistence and per-session refresh serialization
//! - `consent`: interactive authorization code flow

pub mod consent;
mod provider;
mod session;
mod token;

pub use provider::{ConsentResponse, HttpTokenEndpoint, RefreshError, RefreshResponse, TokenEndpoint};
pub use session::SessionManager;
pub use token::{
    DEFAULT_EXPIRES_IN_SECS, SessionToken, TokenError, TokenState, ensure_fresh_token,
    ensure_fresh_token_at, now_millis,
};
