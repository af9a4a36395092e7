use crate::config::{DRIVE_SCOPE, GoogleConfig};
use crate::error::DriveError;
use crate::google_oauth::token::{DriveToken, email_from_id_token};

use chrono::{Duration, Utc};
use oauth2::{
    AuthUrl, AuthorizationCode, Client as OAuth2Client, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, ExtraTokenFields, PkceCodeChallenge, PkceCodeVerifier,
    RedirectUrl, RefreshToken, Scope, StandardRevocableToken, StandardTokenResponse,
    TokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenType,
    },
};
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Google OAuth endpoints bound to this deployment's client registration.
pub struct GoogleOauthEndpoints {
    client: GoogleOauth2Client,
    http_client: reqwest::Client,
}

impl GoogleOauthEndpoints {
    pub fn new(cfg: &GoogleConfig, http_client: reqwest::Client) -> Result<Self, DriveError> {
        let client = OAuth2Client::new(ClientId::new(cfg.client_id.clone()))
            .set_client_secret(ClientSecret::new(cfg.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(cfg.auth_url.as_str().to_string())?)
            .set_token_uri(TokenUrl::new(cfg.token_url.as_str().to_string())?)
            .set_redirect_uri(RedirectUrl::new(cfg.redirect_url.as_str().to_string())?);
        Ok(Self {
            client,
            http_client,
        })
    }

    /// Consent page URL plus the CSRF token it carries as `state`.
    pub fn build_authorize_url(&self, challenge: PkceCodeChallenge) -> (Url, CsrfToken) {
        self.client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(DRIVE_SCOPE.to_string()))
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(challenge)
            .url()
    }

    pub async fn exchange_authorization_code(
        &self,
        code: AuthorizationCode,
        verifier: PkceCodeVerifier,
    ) -> Result<DriveToken, DriveError> {
        let token_result: GoogleTokenResponse = self
            .client
            .exchange_code(code)
            .set_pkce_verifier(verifier)
            .request_async(&self.http_client)
            .await?;
        let token = token_from_response(&token_result, None);
        info!(email = ?token.email, "authorization code exchanged");
        Ok(token)
    }

    /// Refresh the access token; the old refresh token is kept if Google
    /// does not rotate it.
    pub async fn refresh_access_token(&self, current: &DriveToken) -> Result<DriveToken, DriveError> {
        let refresh = current
            .refresh_token
            .clone()
            .ok_or_else(|| DriveError::Oauth2Token("no refresh token".to_string()))?;
        let token_result: GoogleTokenResponse = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh))
            .request_async(&self.http_client)
            .await?;
        let mut token = token_from_response(&token_result, current.refresh_token.clone());
        if token.email.is_none() {
            token.email = current.email.clone();
        }
        info!(email = ?token.email, "access token refreshed");
        Ok(token)
    }
}

fn token_from_response(resp: &GoogleTokenResponse, fallback_refresh: Option<String>) -> DriveToken {
    let lifetime = resp
        .expires_in()
        .and_then(|d| Duration::from_std(d).ok())
        .unwrap_or_else(|| Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));
    DriveToken {
        access_token: resp.access_token().secret().to_string(),
        refresh_token: resp
            .refresh_token()
            .map(|t| t.secret().to_string())
            .or(fallback_refresh),
        expiry: Utc::now() + lifetime,
        email: resp
            .extra_fields()
            .id_token
            .as_deref()
            .and_then(email_from_id_token),
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoogleTokenField {
    #[serde(rename = "id_token")]
    pub id_token: Option<String>,
}
impl ExtraTokenFields for GoogleTokenField {}

pub type GoogleTokenResponse = StandardTokenResponse<GoogleTokenField, BasicTokenType>;

pub type GoogleOauth2Client = OAuth2Client<
    BasicErrorResponse,
    GoogleTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;
