//! Error types for the OIDC session guard

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OIDC discovery failed: {0}")]
    Discovery(String),

    #[error("Token error: {0}")]
    Token(String),

    #[error("OAuth callback error: {0}")]
    Callback(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Session cookie error: {0}")]
    Cookie(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            // No redirect back to login: a provider-side denial would loop
            Self::Callback(_) | Self::Auth(_) => {
                tracing::warn!(error = %self, "Login flow failed");
                (StatusCode::BAD_REQUEST, "Authentication failed").into_response()
            }
            Self::Token(_) | Self::Http(_) | Self::Discovery(_) => {
                tracing::error!(error = %self, "Identity provider request failed");
                (StatusCode::BAD_GATEWAY, "Identity provider unavailable").into_response()
            }
            _ => {
                tracing::error!(error = %self, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

/// Why a refresh-token exchange did not produce new tokens.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("token endpoint unreachable: {0}")]
    Network(#[source] reqwest::Error),

    #[error("token endpoint timed out")]
    Timeout,

    #[error("token endpoint rejected refresh ({status}): {error}")]
    Rejected {
        status: u16,
        error: String,
        description: Option<String>,
    },

    #[error("malformed token response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for RefreshError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RefreshError::Timeout
        } else if e.is_decode() {
            RefreshError::Malformed(e.to_string())
        } else {
            RefreshError::Network(e)
        }
    }
}

/// Reasons the session refresh guard ends or ignores a session.
#[derive(Error, Debug)]
pub enum GuardError {
    /// No readable session cookie. Never ends a session; the guard reports it
    /// as `GuardOutcome::Anonymous` and logs it.
    #[error("no session cookie")]
    SessionAbsent,

    #[error("access token expired and no refresh token is available")]
    TokenExpiredNoRefresh,

    #[error("refresh exchange failed: {0}")]
    RefreshExchangeFailed(#[from] RefreshError),

    #[error("could not reissue session cookie: {0}")]
    CookieRewriteFailed(String),
}
