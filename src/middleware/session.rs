use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::PrivateCookieJar;

use crate::error::DriveError;
use crate::handlers::google_oauth::redirect_to_consent;
use crate::router::DriveState;

/// Access token for page routes. Without a session the browser is sent
/// to Google's consent screen.
#[derive(Debug, Clone)]
pub struct DriveSession {
    pub access_token: String,
}

impl FromRequestParts<DriveState> for DriveSession {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &DriveState,
    ) -> Result<Self, Self::Rejection> {
        match state.session.access_token().await {
            Ok(Some(access_token)) => Ok(Self { access_token }),
            Ok(None) => {
                let jar = PrivateCookieJar::from_request_parts(parts, state)
                    .await
                    .map_err(IntoResponse::into_response)?;
                Err(redirect_to_consent(jar, state))
            }
            Err(e) => Err(e.into_response()),
        }
    }
}

/// Access token for script-facing JSON routes; answers 401 instead of redirecting.
#[derive(Debug, Clone)]
pub struct ApiSession {
    pub access_token: String,
}

impl FromRequestParts<DriveState> for ApiSession {
    type Rejection = DriveError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &DriveState,
    ) -> Result<Self, Self::Rejection> {
        state
            .session
            .access_token()
            .await?
            .map(|access_token| Self { access_token })
            .ok_or(DriveError::NoSession)
    }
}
