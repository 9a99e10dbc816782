//! Sealed session and login-challenge cookies
//!
//! Sealing (authenticated encryption) is done by `PrivateCookieJar`; this
//! module only decides what goes in and how the cookie is scoped.

use super::SessionPrincipal;
use crate::error::{AppError, Result};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::PrivateCookieJar;
use serde::de::DeserializeOwned;
use serde::Serialize;
use time::Duration;

/// Browsers drop cookies larger than this (name, value and attributes)
const MAX_COOKIE_BYTES: usize = 4096;
/// Nonce and authentication tag added by the private jar
const SEAL_OVERHEAD_BYTES: usize = 12 + 16;
const CHALLENGE_TTL_MINUTES: i64 = 5;

/// Cookie settings shared by the guard and the login routes
#[derive(Debug, Clone)]
pub struct SessionCookies {
    name: String,
    challenge_name: String,
    secure: bool,
    max_age: Duration,
}

impl SessionCookies {
    pub fn new(name: impl Into<String>, secure: bool, session_days: i64) -> Self {
        let name = name.into();
        Self {
            challenge_name: format!("{}.challenge", name),
            name,
            secure,
            max_age: Duration::days(session_days),
        }
    }

    /// Read the principal from the session cookie
    ///
    /// A cookie that fails to unseal or parse is reported as no session.
    pub fn load(&self, jar: &PrivateCookieJar) -> Option<SessionPrincipal> {
        let cookie = jar.get(&self.name)?;
        match serde_json::from_str(cookie.value()) {
            Ok(principal) => Some(principal),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed session cookie");
                None
            }
        }
    }

    /// Session cookie carrying the principal, to be sealed by the jar
    pub fn seal(&self, principal: &SessionPrincipal) -> Result<Cookie<'static>> {
        let value = to_cookie_value(&self.name, principal)?;

        Ok(Cookie::build((self.name.clone(), value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(self.max_age)
            .build())
    }

    /// Cookie that removes the session when passed to `jar.remove`
    pub fn removal(&self) -> Cookie<'static> {
        Cookie::build((self.name.clone(), "")).path("/").build()
    }

    /// Short-lived cookie holding the pending login challenge
    pub fn challenge<T: Serialize>(&self, challenge: &T) -> Result<Cookie<'static>> {
        let value = to_cookie_value(&self.challenge_name, challenge)?;

        Ok(Cookie::build((self.challenge_name.clone(), value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(Duration::minutes(CHALLENGE_TTL_MINUTES))
            .build())
    }

    pub fn load_challenge<T: DeserializeOwned>(&self, jar: &PrivateCookieJar) -> Option<T> {
        let cookie = jar.get(&self.challenge_name)?;
        serde_json::from_str(cookie.value()).ok()
    }

    pub fn challenge_removal(&self) -> Cookie<'static> {
        Cookie::build((self.challenge_name.clone(), "")).path("/").build()
    }
}

fn to_cookie_value<T: Serialize>(name: &str, value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;

    // Sealed values are base64 of nonce + ciphertext + tag
    let sealed_len = (json.len() + SEAL_OVERHEAD_BYTES).div_ceil(3) * 4;
    if name.len() + 1 + sealed_len > MAX_COOKIE_BYTES {
        return Err(AppError::Cookie(format!(
            "sealed cookie would be {} bytes, limit is {}",
            name.len() + 1 + sealed_len,
            MAX_COOKIE_BYTES
        )));
    }

    Ok(json)
}
