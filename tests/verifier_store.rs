use calendar_oauth_connect::db;

#[test]
fn verifier_slot_roundtrip_and_overwrite() {
    let dir = tempfile::tempdir().expect("tmpdir");
    let db_path = dir.path().join("connect.db");
    let conn = db::open_or_create(&db_path).expect("open db");

    assert_eq!(db::load_verifier(&conn).expect("load"), None);

    db::save_verifier(&conn, "first-verifier").expect("save");
    assert_eq!(
        db::load_verifier(&conn).expect("load").as_deref(),
        Some("first-verifier")
    );

    // load does not consume
    assert!(db::load_verifier(&conn).expect("load").is_some());

    // single slot: a second attempt overwrites the first
    db::save_verifier(&conn, "second-verifier").expect("save");
    assert_eq!(
        db::load_verifier(&conn).expect("load").as_deref(),
        Some("second-verifier")
    );

    db::clear_verifier(&conn).expect("clear");
    assert_eq!(db::load_verifier(&conn).expect("load"), None);
    // clearing an empty slot is fine
    db::clear_verifier(&conn).expect("clear twice");
}

#[test]
fn verifier_survives_reopen() {
    // The user leaves for the provider and comes back; the verifier must
    // still be there in a fresh process.
    let dir = tempfile::tempdir().expect("tmpdir");
    let db_path = dir.path().join("connect.db");

    {
        let conn = db::open_or_create(&db_path).expect("open db");
        db::save_verifier(&conn, "persisted-across-redirect").expect("save");
    }

    let conn = db::open_or_create(&db_path).expect("reopen db");
    assert_eq!(
        db::load_verifier(&conn).expect("load").as_deref(),
        Some("persisted-across-redirect")
    );
}

#[test]
fn session_row_roundtrip() {
    let dir = tempfile::tempdir().expect("tmpdir");
    let db_path = dir.path().join("connect.db");
    let conn = db::open_or_create(&db_path).expect("open db");

    assert!(db::load_session_raw(&conn, "calendar").expect("load").is_none());
    db::save_session_raw(&conn, "calendar", "{\"access_token\":\"a\"}").expect("save");
    assert!(db::load_session_raw(&conn, "calendar").expect("load").is_some());
    db::clear_session(&conn, "calendar").expect("clear");
    assert!(db::load_session_raw(&conn, "calendar").expect("load").is_none());
}
