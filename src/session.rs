//! Token lifecycle management.
//!
//! `SessionManager` owns the single active session: install on exchange,
//! validity from the decoded `exp` claim and the wall clock, refresh through
//! the backend, teardown on refresh rejection or malformed tokens. It is an
//! explicitly owned value with a defined lifecycle (`open`, `install`,
//! `ensure_bearer`, `teardown`), not ambient global state.

use crate::api::AuthBackend;
use crate::db;
use crate::error::{ConnectError, ConnectResult};
use crate::token::{self, TokenPair};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

const PROVIDER: &str = "calendar";

/// Observable lifecycle states of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Valid,
    Expired,
    RefreshInFlight,
    Invalid,
}

pub struct SessionManager {
    backend: Arc<dyn AuthBackend>,
    db_path: PathBuf,
    refresh_margin_sec: i64,
    /// In-memory copy of the persisted session. The mutex also serializes
    /// refresh: a second caller racing on an expired token blocks here and,
    /// on wake, sees the already-refreshed token instead of spending the
    /// refresh token a second time.
    session: tokio::sync::Mutex<Option<TokenPair>>,
    refresh_in_flight: AtomicBool,
}

impl SessionManager {
    /// Open the manager, adopting any session already on disk. No network
    /// I/O happens here; an expired or malformed stored token is only
    /// classified, not refreshed.
    pub async fn open(
        db_path: PathBuf,
        refresh_margin_sec: i64,
        backend: Arc<dyn AuthBackend>,
    ) -> ConnectResult<Self> {
        let path = db_path.clone();
        let raw = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<String>> {
            let conn = db::open_or_create(&path)?;
            db::load_session_raw(&conn, PROVIDER)
        })
        .await
        .map_err(anyhow::Error::from)??;

        let session = match raw {
            Some(s) => match serde_json::from_str::<TokenPair>(&s) {
                Ok(pair) => {
                    debug!("adopted stored session");
                    Some(pair)
                }
                Err(e) => {
                    warn!("stored session is unreadable, discarding: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            backend,
            db_path,
            refresh_margin_sec,
            session: tokio::sync::Mutex::new(session),
            refresh_in_flight: AtomicBool::new(false),
        })
    }

    async fn persist(&self, pair: &TokenPair) -> ConnectResult<()> {
        let db_path = self.db_path.clone();
        let blob = serde_json::to_string(pair)?;
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let conn = db::open_or_create(&db_path)?;
            db::save_session_raw(&conn, PROVIDER, &blob)?;
            Ok(())
        })
        .await
        .map_err(anyhow::Error::from)??;
        Ok(())
    }

    async fn erase(&self) -> ConnectResult<()> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let conn = db::open_or_create(&db_path)?;
            db::clear_session(&conn, PROVIDER)?;
            Ok(())
        })
        .await
        .map_err(anyhow::Error::from)??;
        Ok(())
    }

    /// Exchange a code + verifier and install the result as the active
    /// session. Login-equivalent: the account identity in the response is
    /// installed alongside the tokens.
    pub async fn complete_exchange(&self, code: &str, verifier: &str) -> ConnectResult<TokenPair> {
        let pair = self.backend.exchange(code, verifier).await?;
        self.install(pair.clone()).await?;
        Ok(pair)
    }

    /// Replace the active session (exchange or refresh result).
    pub async fn install(&self, pair: TokenPair) -> ConnectResult<()> {
        self.persist(&pair).await?;
        let mut lock = self.session.lock().await;
        *lock = Some(pair);
        Ok(())
    }

    /// Current lifecycle state, recomputed from the wall clock on every call.
    pub async fn state(&self) -> SessionState {
        if self.refresh_in_flight.load(Ordering::SeqCst) {
            return SessionState::RefreshInFlight;
        }
        let lock = self.session.lock().await;
        match &*lock {
            None => SessionState::NoSession,
            Some(pair) => match token::decode_exp(&pair.access_token) {
                Err(_) => SessionState::Invalid,
                Ok(exp) => {
                    if chrono::Utc::now().timestamp() + self.refresh_margin_sec < exp {
                        SessionState::Valid
                    } else {
                        SessionState::Expired
                    }
                }
            },
        }
    }

    /// The boolean the rest of the application consumes.
    pub async fn is_connected(&self) -> bool {
        self.state().await == SessionState::Valid
    }

    /// Account identity captured at exchange time, if any.
    pub async fn account(&self) -> Option<serde_json::Value> {
        let lock = self.session.lock().await;
        lock.as_ref().and_then(|p| p.account.clone())
    }

    /// Return a bearer header value backed by a currently-valid access
    /// token, refreshing through the backend if the stored one is expired.
    ///
    /// A rejected refresh tears the session down instead of retrying: a
    /// refresh token the backend refused will not become valid on retry.
    pub async fn ensure_bearer(&self) -> ConnectResult<String> {
        let mut lock = self.session.lock().await;
        let pair = lock.as_ref().ok_or(ConnectError::NotConnected)?.clone();

        let exp = match token::decode_exp(&pair.access_token) {
            Ok(exp) => exp,
            Err(e) => {
                // Undecodable token: fail closed, never "probably fine".
                warn!("access token is malformed, tearing session down");
                *lock = None;
                drop(lock);
                self.erase().await?;
                return Err(e);
            }
        };

        if chrono::Utc::now().timestamp() + self.refresh_margin_sec >= exp {
            debug!("access token expired or near expiry, refreshing");
            self.refresh_in_flight.store(true, Ordering::SeqCst);
            let refreshed = self.backend.refresh(&pair.refresh_token).await;
            self.refresh_in_flight.store(false, Ordering::SeqCst);
            match refreshed {
                Ok(new_pair) => {
                    self.persist(&new_pair).await?;
                    let bearer = format!("Bearer {}", new_pair.access_token);
                    *lock = Some(new_pair);
                    info!("session refreshed");
                    return Ok(bearer);
                }
                Err(e) => {
                    warn!("refresh rejected, tearing session down: {}", e);
                    *lock = None;
                    drop(lock);
                    self.erase().await?;
                    return Err(e);
                }
            }
        }

        Ok(format!("Bearer {}", pair.access_token))
    }

    /// Logout: drop the in-memory session and delete the stored row.
    pub async fn teardown(&self) -> ConnectResult<()> {
        {
            let mut lock = self.session.lock().await;
            *lock = None;
        }
        self.erase().await?;
        info!("session torn down");
        Ok(())
    }
}
