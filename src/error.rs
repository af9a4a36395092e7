use axum::extract::multipart::MultipartError;
use axum::http::header::InvalidHeaderValue;
use axum::{Json, http::StatusCode, response::IntoResponse};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::{error, warn};

use crate::service::password::PasswordError;

#[derive(Debug, ThisError)]
pub enum DriveError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth2 server error: {error}")]
    Oauth2Server { error: String },

    #[error("OAuth flow error: {0}")]
    OauthFlowError(String),

    #[error("account {0} is not the configured operator")]
    OperatorMismatch(String),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Blocking task failed: {0}")]
    BlockingTask(#[from] tokio::task::JoinError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    #[error("No Drive session; sign in first")]
    NoSession,

    #[error("Folder {0} is password protected")]
    FolderLocked(String),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
}

impl From<figment::Error> for DriveError {
    fn from(e: figment::Error) -> Self {
        DriveError::Config(Box::new(e))
    }
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for DriveError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => DriveError::Oauth2Server {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(req_e) => {
                DriveError::Oauth2Token(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => {
                DriveError::Oauth2Token(format!("unparseable token response: {}", parse_err))
            }
            RequestTokenError::Other(s) => DriveError::Oauth2Token(s),
        }
    }
}

impl IntoResponse for DriveError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            DriveError::DatabaseError(_)
            | DriveError::RactorError(_)
            | DriveError::BlockingTask(_)
            | DriveError::InvalidHeader(_)
            | DriveError::JsonError(_)
            | DriveError::Config(_) => {
                error!(error = %self, "internal failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorBody::new("INTERNAL_ERROR", "An internal server error occurred."),
                )
            }
            DriveError::Oauth2Token(_)
            | DriveError::Oauth2Server { .. }
            | DriveError::OauthFlowError(_) => {
                warn!(error = %self, "authentication failure");
                (
                    StatusCode::UNAUTHORIZED,
                    ApiErrorBody::new("UNAUTHORIZED", "Authentication error."),
                )
            }
            DriveError::OperatorMismatch(_) => {
                warn!(error = %self, "rejected non-operator account");
                (
                    StatusCode::FORBIDDEN,
                    ApiErrorBody::new("FORBIDDEN", "This account may not use this drive."),
                )
            }
            DriveError::Reqwest(_) | DriveError::UrlParse(_) => {
                warn!(error = %self, "upstream unreachable");
                (
                    StatusCode::BAD_GATEWAY,
                    ApiErrorBody::new("BAD_GATEWAY", "Upstream service is unavailable."),
                )
            }
            DriveError::UpstreamStatus(code) => {
                let (status, err_code, msg) = match code {
                    StatusCode::TOO_MANY_REQUESTS => {
                        (code, "RATE_LIMIT", "Upstream rate limit exceeded.")
                    }
                    StatusCode::UNAUTHORIZED => {
                        (code, "UNAUTHORIZED", "Upstream authentication failed.")
                    }
                    StatusCode::FORBIDDEN => (code, "FORBIDDEN", "Upstream permission denied."),
                    StatusCode::NOT_FOUND => (code, "NOT_FOUND", "Upstream resource not found."),
                    _ => (
                        StatusCode::BAD_GATEWAY,
                        "UPSTREAM_ERROR",
                        "An upstream error occurred.",
                    ),
                };
                (status, ApiErrorBody::new(err_code, msg))
            }
            DriveError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiErrorBody::new("BAD_REQUEST", msg))
            }
            DriveError::Password(e) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody::new("INVALID_PASSWORD", e.to_string()),
            ),
            DriveError::NoSession => (
                StatusCode::UNAUTHORIZED,
                ApiErrorBody::new("NO_SESSION", "Sign in with Google first."),
            ),
            DriveError::FolderLocked(_) => (
                StatusCode::FORBIDDEN,
                ApiErrorBody::new("FOLDER_LOCKED", "This folder is password protected."),
            ),
            DriveError::Multipart(e) => {
                let status = e.status();
                (status, ApiErrorBody::new("BAD_UPLOAD", e.body_text()))
            }
        };
        (status, Json(ApiErrorResponse { error: error_body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiErrorBody {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
