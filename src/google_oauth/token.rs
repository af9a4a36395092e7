use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Expiry skew applied before a token is considered stale.
const EXPIRY_SKEW_SECS: i64 = 60;

/// The operator's Drive capability: what the OAuth exchange hands back.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct DriveToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: DateTime<Utc>,
    pub email: Option<String>,
}

impl std::fmt::Debug for DriveToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveToken")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expiry", &self.expiry)
            .field("email", &self.email)
            .finish()
    }
}

impl DriveToken {
    pub fn is_expired(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expiry
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Pull the `email` claim out of an id_token payload.
///
/// The token comes straight from the token endpoint over TLS, so the
/// signature is not checked here.
pub fn email_from_id_token(id_token: &str) -> Option<String> {
    let payload_b64 = id_token.split('.').nth(1)?;
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64.trim_end_matches('='))
        .ok()?;
    let payload_json = serde_json::from_slice::<Value>(&decoded).ok()?;
    payload_json
        .get("email")
        .and_then(|e| e.as_str())
        .map(str::to_string)
}
