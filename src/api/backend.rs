use super::AuthBackend;
use crate::error::{ConnectError, ConnectResult};
use crate::token::TokenPair;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::json;
use std::env;

/// HTTP transport against the application backend's auth endpoints.
/// The base URL may be overridden by the CALENDAR_BACKEND_BASE env var
/// (useful for tests).
pub struct HttpBackend {
    client: Client,
}

impl HttpBackend {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn api_base() -> String {
        env::var("CALENDAR_BACKEND_BASE")
            .unwrap_or_else(|_| "https://api.calendar-connect.example".into())
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn exchange(&self, code: &str, verifier: &str) -> ConnectResult<TokenPair> {
        let url = format!("{}/auth/calendar/exchange", Self::api_base());
        debug!("exchanging authorization code at {}", url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "code": code, "verifier": verifier }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectError::exchange_rejected(format!(
                "{} => {}",
                status, body
            )));
        }
        let j: serde_json::Value = resp.json().await?;
        TokenPair::from_response(&j)
    }

    async fn refresh(&self, refresh_token: &str) -> ConnectResult<TokenPair> {
        let url = format!("{}/auth/calendar/refresh", Self::api_base());
        debug!("refreshing tokens at {}", url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "refresh": refresh_token }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectError::refresh_rejected(format!(
                "{} => {}",
                status, body
            )));
        }
        let j: serde_json::Value = resp.json().await?;
        TokenPair::from_response(&j).map_err(|e| match e {
            // A refresh response missing tokens is a refresh failure, not an
            // exchange failure.
            ConnectError::ExchangeRejected(msg) => ConnectError::RefreshRejected(msg),
            other => other,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}
