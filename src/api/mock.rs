use super::AuthBackend;
use crate::error::ConnectResult;
use crate::token::TokenPair;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use serde_json::json;
use tracing::info;

/// A simple mock backend used in tests and when no real backend is reachable.
/// It logs operations and mints deterministic, well-formed fake tokens.
pub struct MockBackend {}

impl MockBackend {
    pub fn new() -> Self {
        Self {}
    }

    fn fake_access_token(subject: &str, ttl_sec: i64) -> String {
        let enc = |v: &[u8]| general_purpose::URL_SAFE_NO_PAD.encode(v);
        let claims = json!({ "sub": subject, "exp": Utc::now().timestamp() + ttl_sec });
        format!(
            "{}.{}.{}",
            enc(br#"{"alg":"none","typ":"JWT"}"#),
            enc(claims.to_string().as_bytes()),
            enc(b"mock")
        )
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthBackend for MockBackend {
    async fn exchange(&self, code: &str, _verifier: &str) -> ConnectResult<TokenPair> {
        info!("MockBackend: exchange code {}", code);
        Ok(TokenPair {
            access_token: Self::fake_access_token("mock-user", 3600),
            refresh_token: format!("mock-refresh-{}", code),
            account: Some(json!({ "id": "mock-user" })),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> ConnectResult<TokenPair> {
        info!("MockBackend: refresh");
        Ok(TokenPair {
            access_token: Self::fake_access_token("mock-user", 3600),
            refresh_token: refresh_token.to_string(),
            account: Some(json!({ "id": "mock-user" })),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
