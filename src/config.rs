use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// OAuth client id registered with the scheduling provider.
    #[serde(default)]
    pub client_id: String,

    /// Application origin used to derive the default redirect URI.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Redirect URI sent in the authorization request. Defaults to
    /// {origin}/calendar/callback when unset.
    #[serde(default)]
    pub redirect_uri: Option<String>,

    #[serde(default = "default_scope")]
    pub scope: String,

    /// Seconds before the decoded expiry at which a token is already
    /// treated as expired, so a refresh happens before an API call fails.
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_sec: i64,

    // path to database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_origin() -> String { "http://127.0.0.1:8080".into() }
fn default_scope() -> String { "calendar.read calendar.events".into() }
fn default_refresh_margin() -> i64 { 30 }
fn default_log_dir() -> PathBuf { "/var/log/calendar-connect".into() }

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("calendar-connect")
        .join("calendar-connect.db")
}

impl Config {
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        Ok(cfg)
    }

    /// Effective redirect URI: the configured one, or the origin default.
    pub fn redirect_uri(&self) -> String {
        match &self.redirect_uri {
            Some(uri) if !uri.is_empty() => uri.clone(),
            _ => format!("{}/calendar/callback", self.origin.trim_end_matches('/')),
        }
    }
}
