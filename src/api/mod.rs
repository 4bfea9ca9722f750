pub mod backend;
pub mod mock;

use crate::error::ConnectResult;
use crate::token::TokenPair;

/// Token transport trait: the two calls the connector makes against the
/// application backend. Implementations: backend::HttpBackend and
/// mock::MockBackend.
#[async_trait::async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange an authorization code plus its PKCE verifier for tokens.
    async fn exchange(&self, code: &str, verifier: &str) -> ConnectResult<TokenPair>;

    /// Trade a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> ConnectResult<TokenPair>;

    /// Return the backend's name (for logging, UI, etc)
    fn name(&self) -> &str;
}
