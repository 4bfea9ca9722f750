use base64::{engine::general_purpose, Engine as _};
use calendar_oauth_connect as lib;
use lib::api::backend::HttpBackend;
use lib::db;
use lib::error::ConnectError;
use lib::session::{SessionManager, SessionState};
use lib::token::TokenPair;
use mockito::{Matcher, Server};
use serde_json::json;
use std::env;
use std::sync::Arc;

fn fake_jwt(exp: i64) -> String {
    let enc = |v: &[u8]| general_purpose::URL_SAFE_NO_PAD.encode(v);
    format!(
        "{}.{}.{}",
        enc(br#"{"alg":"none"}"#),
        enc(json!({ "exp": exp }).to_string().as_bytes()),
        enc(b"sig")
    )
}

#[test]
fn refresh_replaces_tokens_and_rejection_tears_down() {
    let mut server = Server::new();
    let base = server.url();
    env::set_var("CALENDAR_BACKEND_BASE", &base);

    let fresh_access = fake_jwt(chrono::Utc::now().timestamp() + 3600);
    let _m_ok = server
        .mock("POST", "/auth/calendar/refresh")
        .match_body(Matcher::PartialJson(json!({ "refresh": "rt-live" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "access_token": fresh_access,
                "refresh_token": "rt-next",
                "user": { "id": 1 }
            })
            .to_string(),
        )
        .create();

    let _m_dead = server
        .mock("POST", "/auth/calendar/refresh")
        .match_body(Matcher::PartialJson(json!({ "refresh": "rt-dead" })))
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(json!({ "error": "invalid_refresh" }).to_string())
        .create();

    let rt = tokio::runtime::Runtime::new().expect("rt");
    rt.block_on(async {
        // Scenario 1: expired access token, live refresh token.
        let dir = tempfile::tempdir().expect("tmpdir");
        let db_path = dir.path().join("connect.db");
        let manager = SessionManager::open(db_path.clone(), 30, Arc::new(HttpBackend::new()))
            .await
            .expect("open");
        manager
            .install(TokenPair {
                access_token: fake_jwt(chrono::Utc::now().timestamp() - 10),
                refresh_token: "rt-live".into(),
                account: None,
            })
            .await
            .expect("install");
        assert_eq!(manager.state().await, SessionState::Expired);

        let bearer = manager.ensure_bearer().await.expect("refresh");
        assert_eq!(bearer, format!("Bearer {}", fresh_access));
        assert_eq!(manager.state().await, SessionState::Valid);

        // Both tokens were replaced and re-persisted.
        let raw = {
            let conn = db::open_or_create(&db_path).expect("db");
            db::load_session_raw(&conn, "calendar").expect("load").expect("row")
        };
        let stored: TokenPair = serde_json::from_str(&raw).expect("parse");
        assert_eq!(stored.refresh_token, "rt-next");
        assert_eq!(stored.access_token, fresh_access);

        // Scenario 2: rejected refresh forces teardown, not a retry loop.
        let dir2 = tempfile::tempdir().expect("tmpdir");
        let db_path2 = dir2.path().join("connect.db");
        let manager2 = SessionManager::open(db_path2.clone(), 30, Arc::new(HttpBackend::new()))
            .await
            .expect("open");
        manager2
            .install(TokenPair {
                access_token: fake_jwt(chrono::Utc::now().timestamp() - 10),
                refresh_token: "rt-dead".into(),
                account: None,
            })
            .await
            .expect("install");

        let err = manager2.ensure_bearer().await.err().expect("rejection");
        assert!(matches!(err, ConnectError::RefreshRejected(_)));

        // Session is gone in memory and on disk; nothing keeps operating on
        // stale tokens.
        assert_eq!(manager2.state().await, SessionState::NoSession);
        assert!(!manager2.is_connected().await);
        let conn = db::open_or_create(&db_path2).expect("db");
        assert!(db::load_session_raw(&conn, "calendar").expect("load").is_none());

        // A second attempt after teardown reports NotConnected, not a retry.
        assert!(matches!(
            manager2.ensure_bearer().await,
            Err(ConnectError::NotConnected)
        ));
    });
}
