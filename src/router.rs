use crate::api::drive_api::{DriveApi, build_http_client};
use crate::config::Config;
use crate::db::FolderLockStorage;
use crate::error::DriveError;
use crate::google_oauth::GoogleOauthEndpoints;
use crate::handlers::{drive, folder_lock, google_oauth};
use crate::service::folder_lock::FolderLockService;
use crate::service::session_actor::{self, SessionHandle};

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    routing::{delete, get, post},
};
use axum_extra::extract::cookie::Key;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::warn;

/// Minimum master-secret length accepted by `Key::derive_from`.
const MIN_COOKIE_SECRET_LEN: usize = 32;

#[derive(Clone)]
pub struct DriveState {
    pub session: SessionHandle,
    pub oauth: Arc<GoogleOauthEndpoints>,
    pub drive: DriveApi,
    pub locks: FolderLockService,
    pub operator_email: Option<Arc<str>>,
    pub insecure_cookie: bool,
    static_dir: PathBuf,
    max_upload_bytes: usize,
    key: Key,
}

impl DriveState {
    /// Wire up the HTTP client, OAuth endpoints, session actor and lock service.
    pub async fn new(cfg: &Config, storage: FolderLockStorage) -> Result<Self, DriveError> {
        let http = build_http_client(&cfg.google)?;
        let oauth = Arc::new(GoogleOauthEndpoints::new(&cfg.google, http.clone())?);
        let session = session_actor::spawn(oauth.clone()).await?;
        let drive = DriveApi::new(http, &cfg.google);
        let locks = FolderLockService::new(storage, cfg.lock.unlock_attempts_per_minute);

        Ok(Self {
            session,
            oauth,
            drive,
            locks,
            operator_email: cfg.google.operator_email.as_deref().map(Arc::from),
            insecure_cookie: cfg.basic.insecure_cookie,
            static_dir: cfg.basic.static_dir.clone(),
            max_upload_bytes: cfg.basic.max_upload_bytes,
            key: cookie_key(cfg.basic.cookie_secret.as_deref()),
        })
    }
}

impl FromRef<DriveState> for Key {
    fn from_ref(state: &DriveState) -> Self {
        state.key.clone()
    }
}

fn cookie_key(secret: Option<&str>) -> Key {
    match secret {
        Some(s) if s.len() >= MIN_COOKIE_SECRET_LEN => Key::derive_from(s.as_bytes()),
        Some(_) => {
            warn!(
                "cookie_secret shorter than {} bytes; using a random per-process key",
                MIN_COOKIE_SECRET_LEN
            );
            Key::generate()
        }
        None => Key::generate(),
    }
}

pub fn drive_router(state: DriveState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);
    let static_files = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/", get(drive::root_listing))
        .route("/files", get(drive::list_files_json))
        .route(
            "/folder",
            get(folder_lock::folder_view).post(folder_lock::folder_unlock),
        )
        .route(
            "/setPassword",
            get(folder_lock::set_password_form).post(folder_lock::set_password),
        )
        .route(
            "/removePassword",
            get(folder_lock::remove_password_query).post(folder_lock::remove_password_form),
        )
        .route("/upload", post(drive::upload).layer(upload_limit))
        .route("/download", get(drive::download))
        .route("/rename", get(drive::rename))
        .route("/move", get(drive::move_file))
        .route("/delete", delete(drive::delete_file))
        .route("/oauth2callback", get(google_oauth::google_oauth_callback))
        .route("/signout", post(google_oauth::sign_out))
        .nest_service("/static", static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_cookie_secret_falls_back_to_random_key() {
        let a = cookie_key(Some("short"));
        let b = cookie_key(Some("short"));
        assert_ne!(a.master(), b.master());
    }

    #[test]
    fn long_cookie_secret_is_deterministic() {
        let secret = "0123456789abcdef0123456789abcdef-extra";
        assert_eq!(
            cookie_key(Some(secret)).master(),
            cookie_key(Some(secret)).master()
        );
    }
}
