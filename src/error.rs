//! Typed errors for the connector.
//!
//! Every ambiguous state maps to "not connected": nothing in this enum is
//! treated as recoverable into a valid session without a fresh exchange or a
//! successful refresh.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectError {
    /// client_id is empty or unset; surfaced before building the auth URL.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The OS randomness source failed; PKCE generation refuses to proceed.
    #[error("secure randomness unavailable: {0}")]
    RandomnessUnavailable(String),

    /// Redirect came back but no verifier is on file (attempt expired,
    /// cleared, or started on another device). User should retry the
    /// connection from the start.
    #[error("no authorization attempt in progress; start the connection again")]
    VerifierMissing,

    /// Backend refused the authorization code.
    #[error("code exchange rejected: {0}")]
    ExchangeRejected(String),

    /// Backend refused the refresh token; the session is torn down.
    #[error("token refresh rejected: {0}")]
    RefreshRejected(String),

    /// Access token does not decode to a payload with an `exp` claim.
    #[error("malformed access token: {0}")]
    MalformedToken(String),

    /// No session exists where one is needed.
    #[error("not connected")]
    NotConnected,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl ConnectError {
    pub fn exchange_rejected(msg: impl Into<String>) -> Self {
        Self::ExchangeRejected(msg.into())
    }

    pub fn refresh_rejected(msg: impl Into<String>) -> Self {
        Self::RefreshRejected(msg.into())
    }

    pub fn malformed_token(msg: impl Into<String>) -> Self {
        Self::MalformedToken(msg.into())
    }
}

pub type ConnectResult<T> = Result<T, ConnectError>;
