use crate::error::DriveError;
use crate::middleware::session::DriveSession;
use crate::router::DriveState;
use crate::views;
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeChallenge, PkceCodeVerifier};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use time::Duration;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub const CSRF_COOKIE: &str = "oauth_csrf_token";
pub const PKCE_COOKIE: &str = "oauth_pkce_verifier";

/// Start the OAuth dance: stash CSRF + PKCE in private cookies and send the
/// browser to Google's consent page.
pub fn redirect_to_consent(jar: PrivateCookieJar, state: &DriveState) -> Response {
    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, csrf_token) = state.oauth.build_authorize_url(challenge);

    let jar = store_oauth_cookies(jar, &csrf_token, verifier.secret(), state.insecure_cookie);

    info!("Dispatching OAuth redirect");
    (jar, Redirect::temporary(auth_url.as_str())).into_response()
}

/// GET /oauth2callback -> exchanges the code and installs the Drive session.
pub async fn google_oauth_callback(
    State(state): State<DriveState>,
    Query(query): Query<AuthCallbackQuery>,
    jar: PrivateCookieJar,
) -> impl IntoResponse {
    let (pkce_verifier, csrf_cookie, jar) = match load_oauth_session(jar) {
        Ok(data) => data,
        Err((jar, err)) => return respond_with_error(jar, err),
    };

    if let Some(provider_error) = query.error.as_deref() {
        return respond_with_error(
            jar,
            DriveError::OauthFlowError(format!("provider returned error: {provider_error}")),
        );
    }

    let Some(state_param) = query.state.as_deref() else {
        return respond_with_error(
            jar,
            DriveError::OauthFlowError("missing `state` in callback".to_string()),
        );
    };

    if !bool::from(state_param.as_bytes().ct_eq(csrf_cookie.as_bytes())) {
        return respond_with_error(
            jar,
            DriveError::OauthFlowError("CSRF token mismatch".to_string()),
        );
    }

    let Some(code) = query.code.as_deref() else {
        return respond_with_error(
            jar,
            DriveError::OauthFlowError("missing `code` in callback".to_string()),
        );
    };

    let token = match state
        .oauth
        .exchange_authorization_code(
            AuthorizationCode::new(code.to_owned()),
            PkceCodeVerifier::new(pkce_verifier),
        )
        .await
    {
        Ok(token) => token,
        Err(err) => return respond_with_error(jar, err),
    };

    if let Err(err) = check_operator(state.operator_email.as_deref(), token.email.as_deref()) {
        return respond_with_error(jar, err);
    }

    if token.refresh_token.is_none() {
        info!("OAuth response carried no refresh_token; session ends when the access token expires");
    }

    state.session.install(token).await;

    info!("OAuth callback installed drive session");
    (jar, Redirect::to("/")).into_response()
}

/// POST /signout -> forget the shared Drive session.
pub async fn sign_out(State(state): State<DriveState>, _session: DriveSession) -> Html<String> {
    state.session.clear().await;
    info!("drive session signed out");
    Html(views::signed_out_page())
}

/// Only the configured operator may bind the shared session.
fn check_operator(expected: Option<&str>, actual: Option<&str>) -> Result<(), DriveError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match actual {
        Some(email) if email.eq_ignore_ascii_case(expected) => Ok(()),
        Some(email) => Err(DriveError::OperatorMismatch(email.to_string())),
        None => Err(DriveError::OperatorMismatch("<unknown>".to_string())),
    }
}

fn store_oauth_cookies(
    jar: PrivateCookieJar,
    csrf: &CsrfToken,
    pkce_verifier: &str,
    insecure: bool,
) -> PrivateCookieJar {
    jar.add(build_cookie(CSRF_COOKIE, csrf.secret().to_string(), insecure))
        .add(build_cookie(PKCE_COOKIE, pkce_verifier.to_string(), insecure))
}

fn load_oauth_session(
    jar: PrivateCookieJar,
) -> Result<(String, String, PrivateCookieJar), (PrivateCookieJar, DriveError)> {
    let Some(csrf_cookie) = jar.get(CSRF_COOKIE).map(|c| c.value().to_owned()) else {
        let jar = clear_oauth_cookies(jar);
        return Err((
            jar,
            DriveError::OauthFlowError("Missing CSRF token in cookie".to_string()),
        ));
    };

    let Some(pkce_cookie) = jar.get(PKCE_COOKIE).map(|c| c.value().to_owned()) else {
        let jar = clear_oauth_cookies(jar);
        return Err((
            jar,
            DriveError::OauthFlowError("Missing PKCE verifier in cookie".to_string()),
        ));
    };

    let jar = clear_oauth_cookies(jar);

    Ok((pkce_cookie, csrf_cookie, jar))
}

fn clear_oauth_cookies(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(clear_cookie(CSRF_COOKIE))
        .remove(clear_cookie(PKCE_COOKIE))
}

fn build_cookie(name: &str, value: String, insecure: bool) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .secure(!insecure)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(15))
        .build()
}

fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn respond_with_error(jar: PrivateCookieJar, err: DriveError) -> Response {
    (jar, err.into_response()).into_response()
}
