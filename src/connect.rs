//! Authorization attempt orchestration.
//!
//! `begin_attempt` mints a PKCE pair, persists the verifier (so it survives
//! the round trip through the provider) and returns the URL to open.
//! `complete_attempt` consumes the redirect's authorization code, exchanges
//! it together with the stored verifier and installs the resulting session.
//! One attempt is in flight at a time; beginning a new one overwrites the
//! previous verifier.

use crate::config::Config;
use crate::db;
use crate::error::{ConnectError, ConnectResult};
use crate::pkce::PkcePair;
use crate::session::SessionManager;
use crate::token::TokenPair;
use std::env;
use tracing::info;
use url::Url;

fn auth_base() -> String {
    env::var("CALENDAR_AUTH_BASE")
        .unwrap_or_else(|_| "https://auth.calendar-provider.example".into())
}

/// Build the provider authorization URL for a given challenge.
///
/// Fails before any navigation if client_id is unset: proceeding would only
/// produce a guaranteed provider-side rejection after the user already left
/// the app.
pub fn build_authorize_url(cfg: &Config, challenge: &str) -> ConnectResult<Url> {
    if cfg.client_id.trim().is_empty() {
        return Err(ConnectError::Configuration(
            "client_id is not set; configure it before connecting".into(),
        ));
    }
    let mut url = Url::parse(&format!("{}/oauth/authorize", auth_base()))
        .map_err(|e| ConnectError::Configuration(format!("bad auth base url: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("client_id", &cfg.client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", &cfg.redirect_uri())
        .append_pair("scope", &cfg.scope)
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", "S256");
    Ok(url)
}

/// Start a new authorization attempt: generate the PKCE pair, persist the
/// verifier, return the URL the user must open. The verifier itself never
/// appears in the URL.
pub async fn begin_attempt(cfg: &Config) -> ConnectResult<Url> {
    let pair = PkcePair::generate()?;
    let url = build_authorize_url(cfg, &pair.challenge)?;

    let db_path = cfg.db_path.clone();
    let verifier = pair.verifier.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let conn = db::open_or_create(&db_path)?;
        db::save_verifier(&conn, &verifier)?;
        Ok(())
    })
    .await
    .map_err(anyhow::Error::from)??;

    info!("authorization attempt started");
    Ok(url)
}

/// Pull the authorization code out of the pasted redirect URL.
/// Surfaces the provider's `error` parameter when consent failed.
pub fn extract_code_from_redirect(redirect_url: &str) -> ConnectResult<String> {
    let parsed = Url::parse(redirect_url)
        .map_err(|e| ConnectError::exchange_rejected(format!("invalid redirect url: {}", e)))?;
    if let Some((_, err)) = parsed.query_pairs().find(|(k, _)| k == "error") {
        return Err(ConnectError::exchange_rejected(format!(
            "provider returned error: {}",
            err
        )));
    }
    parsed
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ConnectError::exchange_rejected("no code in redirect URL"))
}

/// Finish the attempt: look up the stored verifier, exchange, install the
/// session, and only then clear the verifier slot.
pub async fn complete_attempt(
    cfg: &Config,
    manager: &SessionManager,
    code: &str,
) -> ConnectResult<TokenPair> {
    let db_path = cfg.db_path.clone();
    let verifier = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<String>> {
        let conn = db::open_or_create(&db_path)?;
        db::load_verifier(&conn)
    })
    .await
    .map_err(anyhow::Error::from)??
    .ok_or(ConnectError::VerifierMissing)?;

    let pair = manager.complete_exchange(code, &verifier).await?;

    // Verifier is single-use: destroy it only after the exchange stuck.
    let db_path = cfg.db_path.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let conn = db::open_or_create(&db_path)?;
        db::clear_verifier(&conn)?;
        Ok(())
    })
    .await
    .map_err(anyhow::Error::from)??;

    info!("account connected");
    Ok(pair)
}
