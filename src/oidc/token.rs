//! Token endpoint wire types
//!
//! Success and error bodies returned by the provider's token endpoint for the
//! `authorization_code` and `refresh_token` grants.

use crate::error::{AppError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Token response from OIDC provider
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Error body from the token endpoint (RFC 6749 section 5.2)
#[derive(Debug, Clone, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenErrorResponse {
    /// Parse an error body, falling back to a generic code for non-JSON bodies
    pub fn from_body(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| TokenErrorResponse {
            error: "unknown_error".to_string(),
            error_description: None,
        })
    }
}

/// Read the claims of an ID token received directly from the token endpoint
///
/// The signature is not checked: the token came over the TLS connection to
/// the provider's token endpoint (OIDC Core 3.1.3.7).
pub fn id_token_claims(id_token: &str) -> Result<Map<String, Value>> {
    let payload = id_token
        .split('.')
        .nth(1)
        .ok_or_else(|| AppError::Token("ID token is not a JWT".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AppError::Token(format!("ID token payload is not base64url: {}", e)))?;

    Ok(serde_json::from_slice(&bytes)?)
}
