//! Session principal and its token bundle
//!
//! Both live only inside the sealed session cookie.

use crate::oidc::TokenResponse;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Lifetime assumed when the provider omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;
/// Upper bound on `expires_in`, keeps the expiry arithmetic in range
const MAX_EXPIRES_IN_SECS: u64 = 366 * 24 * 3600;

/// Tokens held by an authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub access_token_expiry: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl TokenBundle {
    /// Build a bundle from a token endpoint response received at `issued_at`
    pub fn from_response(response: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        let expires_in = response
            .expires_in
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
            .min(MAX_EXPIRES_IN_SECS);

        TokenBundle {
            access_token: response.access_token,
            access_token_expiry: issued_at + Duration::seconds(expires_in as i64),
            refresh_token: response.refresh_token,
            id_token: response.id_token,
        }
    }

    /// Successor bundle after a refresh exchange
    ///
    /// Keeps the current refresh token and ID token when the provider does not
    /// rotate them.
    pub fn rotate(&self, response: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        let mut next = TokenBundle::from_response(response, issued_at);
        if next.refresh_token.is_none() {
            next.refresh_token = self.refresh_token.clone();
        }
        if next.id_token.is_none() {
            next.id_token = self.id_token.clone();
        }
        next
    }

    /// Whether the access token must be replaced before use
    pub fn is_expired(&self, now: DateTime<Utc>, clock_skew: Duration) -> bool {
        self.access_token.is_empty() || now + clock_skew >= self.access_token_expiry
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// The authenticated identity carried by a session cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPrincipal {
    /// Claim type to values, as released by the provider
    #[serde(default)]
    pub claims: BTreeMap<String, Vec<String>>,
    pub tokens: TokenBundle,
}

impl SessionPrincipal {
    pub fn new(claims: BTreeMap<String, Vec<String>>, tokens: TokenBundle) -> Self {
        Self { claims, tokens }
    }

    /// Build a principal from a userinfo document
    ///
    /// Arrays become multi-valued claims, scalars are stringified, `null` is dropped.
    pub fn from_user_info(user_info: Map<String, Value>, tokens: TokenBundle) -> Self {
        let claims = user_info
            .into_iter()
            .filter_map(|(key, value)| {
                let values = match value {
                    Value::Null => return None,
                    Value::Array(items) => items.into_iter().filter_map(claim_value).collect(),
                    other => claim_value(other).into_iter().collect(),
                };
                Some((key, values))
            })
            .collect();

        Self { claims, tokens }
    }

    /// First value of a claim
    pub fn claim(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .get(claim_type)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn claim_values(&self, claim_type: &str) -> &[String] {
        self.claims
            .get(claim_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Same identity with a replaced token bundle
    pub fn with_tokens(self, tokens: TokenBundle) -> Self {
        Self { tokens, ..self }
    }
}

fn claim_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
