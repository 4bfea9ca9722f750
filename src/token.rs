//! Token pair model and access-token expiry decoding.
//!
//! The access token is decoded, not verified: the backend that issued it is
//! trusted, and no signature check happens here. Anything that fails to
//! decode into a payload with an `exp` claim is treated as invalid rather
//! than given the benefit of the doubt.

use crate::error::{ConnectError, ConnectResult};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Account identity payload returned alongside the tokens
    /// (a `user` or `organization` object, kept opaque).
    pub account: Option<Value>,
}

impl TokenPair {
    /// Normalize a backend token response into a `TokenPair`.
    ///
    /// Two live response shapes must be accepted:
    /// `{access_token, refresh_token, user}` and
    /// `{tokens: {access, refresh}, organization}`.
    pub fn from_response(j: &Value) -> ConnectResult<Self> {
        let (access, refresh) = if let Some(tokens) = j.get("tokens") {
            (
                tokens["access"].as_str(),
                tokens["refresh"].as_str(),
            )
        } else {
            (
                j["access_token"].as_str(),
                j["refresh_token"].as_str(),
            )
        };
        let access = access
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConnectError::exchange_rejected("response carries no access token"))?;
        let refresh = refresh
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConnectError::exchange_rejected("response carries no refresh token"))?;
        let account = j
            .get("user")
            .or_else(|| j.get("organization"))
            .filter(|v| !v.is_null())
            .cloned();
        Ok(Self {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            account,
        })
    }
}

/// Decode the `exp` claim (epoch seconds) from a JWT-shaped access token.
///
/// Errors if the token is not three base64url segments, the payload is not
/// JSON, or `exp` is missing/non-numeric.
pub fn decode_exp(access_token: &str) -> ConnectResult<i64> {
    let mut parts = access_token.split('.');
    let (header, payload, signature) = (parts.next(), parts.next(), parts.next());
    if header.is_none() || payload.is_none() || signature.is_none() || parts.next().is_some() {
        return Err(ConnectError::malformed_token(
            "expected three dot-separated segments",
        ));
    }
    let payload = payload.unwrap_or_default();
    let raw = general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| ConnectError::malformed_token(format!("payload is not base64url: {}", e)))?;
    let claims: Value = serde_json::from_slice(&raw)
        .map_err(|e| ConnectError::malformed_token(format!("payload is not JSON: {}", e)))?;
    claims["exp"]
        .as_i64()
        .ok_or_else(|| ConnectError::malformed_token("payload has no exp claim"))
}

/// Whether the access token is still valid `margin_sec` from now.
///
/// Recomputed from the wall clock on every call; never cache the answer.
pub fn is_valid(access_token: &str, margin_sec: i64) -> bool {
    match decode_exp(access_token) {
        Ok(exp) => Utc::now().timestamp() + margin_sec < exp,
        Err(_) => false,
    }
}
