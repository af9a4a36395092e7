use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
pub const CONFIG_FILE: &str = "config.toml";
pub const ENV_PREFIX: &str = "SECUREDRIVE_";

/// Bare variables from older `.env` files; still honoured.
const LEGACY_ENV_KEYS: [&str; 4] = [
    "GOOGLE_CLIENT_ID",
    "GOOGLE_CLIENT_SECRET",
    "GOOGLE_REDIRECT_URL",
    "DATABASE_URL",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub google: GoogleConfig,
    pub lock: LockConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub loglevel: String,
    pub database_url: String,
    pub static_dir: PathBuf,
    /// Master secret for private cookies; at least 32 bytes, otherwise a
    /// random per-process key is used.
    pub cookie_secret: Option<String>,
    /// Drop the `Secure` attribute on cookies (plain-http development only).
    pub insecure_cookie: bool,
    pub max_upload_bytes: usize,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            loglevel: "info".to_string(),
            database_url: "sqlite://securedrive.db".to_string(),
            static_dir: PathBuf::from("static"),
            cookie_secret: None,
            insecure_cookie: false,
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: Url,
    /// When set, only this Google account may complete the OAuth flow.
    pub operator_email: Option<String>,
    pub proxy: Option<Url>,
    pub auth_url: Url,
    pub token_url: Url,
    pub drive_api_base: Url,
    pub drive_upload_base: Url,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: static_url("http://localhost:8080/oauth2callback"),
            operator_email: None,
            proxy: None,
            auth_url: static_url("https://accounts.google.com/o/oauth2/v2/auth"),
            token_url: static_url("https://oauth2.googleapis.com/token"),
            drive_api_base: static_url("https://www.googleapis.com/drive/v3"),
            drive_upload_base: static_url("https://www.googleapis.com/upload/drive/v3"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub unlock_attempts_per_minute: u32,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            unlock_attempts_per_minute: 10,
        }
    }
}

impl Config {
    /// Defaults, then `config.toml`, then `SECUREDRIVE_*` env vars
    /// (`__` separates sections), then the legacy bare env vars.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(
                Env::raw()
                    .only(&LEGACY_ENV_KEYS)
                    .map(|key| legacy_key(key.as_str()).into()),
            )
    }
}

fn legacy_key(key: &str) -> String {
    match key.to_ascii_uppercase().as_str() {
        "GOOGLE_CLIENT_ID" => "google.client_id".to_string(),
        "GOOGLE_CLIENT_SECRET" => "google.client_secret".to_string(),
        "GOOGLE_REDIRECT_URL" => "google.redirect_url".to_string(),
        "DATABASE_URL" => "basic.database_url".to_string(),
        other => other.to_ascii_lowercase(),
    }
}

fn static_url(s: &str) -> Url {
    // Only called with the literals above.
    Url::parse(s).unwrap_or_else(|e| panic!("invalid built-in url {s}: {e}"))
}
