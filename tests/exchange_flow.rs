use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use calendar_oauth_connect as lib;
use lib::api::AuthBackend;
use lib::config::Config;
use lib::db;
use lib::error::{ConnectError, ConnectResult};
use lib::session::{SessionManager, SessionState};
use lib::token::TokenPair;
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

fn fake_jwt(exp: i64) -> String {
    let enc = |v: &[u8]| general_purpose::URL_SAFE_NO_PAD.encode(v);
    format!(
        "{}.{}.{}",
        enc(br#"{"alg":"none"}"#),
        enc(json!({ "exp": exp }).to_string().as_bytes()),
        enc(b"sig")
    )
}

/// Backend double that records what the exchange client sent it.
struct RecordingBackend {
    seen: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl AuthBackend for RecordingBackend {
    async fn exchange(&self, code: &str, verifier: &str) -> ConnectResult<TokenPair> {
        self.seen
            .lock()
            .unwrap()
            .push((code.to_string(), verifier.to_string()));
        Ok(TokenPair {
            access_token: fake_jwt(chrono::Utc::now().timestamp() + 3600),
            refresh_token: "refresh-1".into(),
            account: Some(json!({ "id": "acct-9" })),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> ConnectResult<TokenPair> {
        unreachable!("no refresh in this test")
    }

    fn name(&self) -> &str {
        "recording"
    }
}

fn test_config(db_path: &PathBuf) -> Config {
    toml::from_str(&format!(
        "client_id = \"abc123\"\ndb_path = \"{}\"",
        db_path.display()
    ))
    .expect("config")
}

#[test]
fn begin_then_complete_consumes_the_stored_verifier() {
    let dir = tempfile::tempdir().expect("tmpdir");
    let db_path = dir.path().join("connect.db");
    let cfg = test_config(&db_path);

    let backend = Arc::new(RecordingBackend {
        seen: Mutex::new(Vec::new()),
    });

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(async {
        let url = lib::connect::begin_attempt(&cfg).await.expect("begin");
        assert!(url.to_string().contains("code_challenge_method=S256"));

        // The verifier landed in the store and is not in the URL.
        let conn = db::open_or_create(&db_path).expect("open db");
        let stored = db::load_verifier(&conn).expect("load").expect("verifier");
        assert_eq!(stored.len(), 128);
        assert!(!url.to_string().contains(&stored));

        let manager = SessionManager::open(db_path.clone(), 0, backend.clone())
            .await
            .expect("open manager");
        let pair = lib::connect::complete_attempt(&cfg, &manager, "AUTHCODE")
            .await
            .expect("complete");
        assert_eq!(pair.refresh_token, "refresh-1");

        // Backend got the code and the exact stored verifier.
        let seen = backend.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![("AUTHCODE".to_string(), stored)]);

        // Session installed, verifier destroyed after use.
        assert_eq!(manager.state().await, SessionState::Valid);
        assert_eq!(manager.account().await.unwrap()["id"], "acct-9");
        assert!(db::load_verifier(&conn).expect("load").is_none());

        // A fresh manager adopts the persisted session on startup.
        let reopened = SessionManager::open(db_path.clone(), 0, backend.clone())
            .await
            .expect("reopen manager");
        assert!(reopened.is_connected().await);
    });
}

#[test]
fn exchange_without_verifier_fails_closed() {
    let dir = tempfile::tempdir().expect("tmpdir");
    let db_path = dir.path().join("connect.db");
    let cfg = test_config(&db_path);

    let backend = Arc::new(RecordingBackend {
        seen: Mutex::new(Vec::new()),
    });

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(async {
        let manager = SessionManager::open(db_path.clone(), 0, backend.clone())
            .await
            .expect("open manager");
        let res = lib::connect::complete_attempt(&cfg, &manager, "AUTHCODE").await;
        assert!(matches!(res, Err(ConnectError::VerifierMissing)));

        // Nothing was exchanged, no session appeared.
        assert!(backend.seen.lock().unwrap().is_empty());
        assert_eq!(manager.state().await, SessionState::NoSession);
    });
}

#[test]
fn overwrite_on_begin_discards_prior_attempt() {
    let dir = tempfile::tempdir().expect("tmpdir");
    let db_path = dir.path().join("connect.db");
    let cfg = test_config(&db_path);

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(async {
        lib::connect::begin_attempt(&cfg).await.expect("first");
        let conn = db::open_or_create(&db_path).expect("open db");
        let first = db::load_verifier(&conn).expect("load").expect("verifier");

        lib::connect::begin_attempt(&cfg).await.expect("second");
        let second = db::load_verifier(&conn).expect("load").expect("verifier");

        // A half-completed prior attempt can never be consumed by the next one.
        assert_ne!(first, second);
    });
}
