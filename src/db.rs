use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA_SQL: &str = include_str!("../db/schema.sql");

pub fn open_or_create(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    run_migrations(&conn)?;
    Ok(conn)
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Store the code verifier for the in-flight authorization attempt.
/// Single-slot: a new attempt overwrites any prior verifier, so a stale
/// attempt can never be consumed by accident. Known limitation: two attempts
/// started concurrently (e.g. two terminals) race on this one slot and the
/// later one wins.
pub fn save_verifier(conn: &Connection, verifier: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO pkce_attempt (slot, verifier, created_at) VALUES (0, ?1, strftime('%s','now')) ON CONFLICT(slot) DO UPDATE SET verifier = excluded.verifier, created_at = excluded.created_at",
        params![verifier],
    )?;
    Ok(())
}

/// Load the stored verifier, if any. Does not clear it; callers clear
/// explicitly after a successful exchange so a failed exchange can be
/// retried with the same code/verifier pair.
pub fn load_verifier(conn: &Connection) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT verifier FROM pkce_attempt WHERE slot = 0 LIMIT 1")?;
    let row = stmt.query_row([], |r| r.get::<_, String>(0)).optional()?;
    Ok(row)
}

pub fn clear_verifier(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM pkce_attempt WHERE slot = 0", [])?;
    Ok(())
}

/// Save raw session JSON for a provider.
pub fn save_session_raw(conn: &Connection, provider: &str, json_blob: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (provider, session_json, updated_at) VALUES (?1, ?2, strftime('%s','now')) ON CONFLICT(provider) DO UPDATE SET session_json = excluded.session_json, updated_at = excluded.updated_at",
        params![provider, json_blob],
    )?;
    Ok(())
}

/// Load raw session JSON for a provider.
pub fn load_session_raw(conn: &Connection, provider: &str) -> Result<Option<String>> {
    let mut stmt =
        conn.prepare("SELECT session_json FROM sessions WHERE provider = ?1 LIMIT 1")?;
    let row = stmt
        .query_row(params![provider], |r| r.get::<_, String>(0))
        .optional()?;
    Ok(row)
}

/// Delete the stored session for a provider (logout / forced teardown).
pub fn clear_session(conn: &Connection, provider: &str) -> Result<()> {
    conn.execute("DELETE FROM sessions WHERE provider = ?1", params![provider])?;
    Ok(())
}
