//! Claim-type mapping and the per-request authenticated user

use super::SessionPrincipal;
use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use std::convert::Infallible;

/// Which claim types hold the canonical name and roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimMap {
    name: String,
    role: String,
}

impl ClaimMap {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
        }
    }

    /// Project a principal onto the canonical user fields
    pub fn resolve(&self, principal: &SessionPrincipal) -> AuthenticatedUser {
        AuthenticatedUser {
            subject: principal.claim("sub").map(String::from),
            name: principal.claim(&self.name).map(String::from),
            roles: principal.claim_values(&self.role).to_vec(),
            access_token: principal.tokens.access_token.clone(),
            access_token_expiry: principal.tokens.access_token_expiry,
        }
    }
}

impl Default for ClaimMap {
    fn default() -> Self {
        Self::new("name", "roles")
    }
}

/// Authenticated user attached to a request by the session refresh guard
///
/// The access token is guaranteed unexpired when the request entered the
/// pipeline.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub subject: Option<String>,
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub access_token: String,
    pub access_token_expiry: DateTime<Utc>,
}

impl AuthenticatedUser {
    pub fn is_in_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for AuthenticatedUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthenticatedUser>().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TokenBundle;
    use std::collections::BTreeMap;

    fn principal() -> SessionPrincipal {
        let mut claims = BTreeMap::new();
        claims.insert("sub".to_string(), vec!["u-1".to_string()]);
        claims.insert("name".to_string(), vec!["Ada".to_string()]);
        claims.insert("preferred_username".to_string(), vec!["ada".to_string()]);
        claims.insert("roles".to_string(), vec!["admin".to_string()]);
        claims.insert(
            "groups".to_string(),
            vec!["staff".to_string(), "ops".to_string()],
        );

        SessionPrincipal::new(
            claims,
            TokenBundle {
                access_token: "A1".to_string(),
                access_token_expiry: DateTime::from_timestamp(100, 0).unwrap(),
                refresh_token: None,
                id_token: None,
            },
        )
    }

    #[test]
    fn test_default_mapping() {
        let user = ClaimMap::default().resolve(&principal());

        assert_eq!(user.subject.as_deref(), Some("u-1"));
        assert_eq!(user.name.as_deref(), Some("Ada"));
        assert!(user.is_in_role("admin"));
        assert_eq!(user.access_token, "A1");
    }

    #[test]
    fn test_remapped_claim_types() {
        let user = ClaimMap::new("preferred_username", "groups").resolve(&principal());

        assert_eq!(user.name.as_deref(), Some("ada"));
        assert_eq!(user.roles, vec!["staff", "ops"]);
        assert!(!user.is_in_role("admin"));
    }
}
