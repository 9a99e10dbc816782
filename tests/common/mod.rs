//! Shared helpers for integration tests against a mocked identity provider

#![allow(dead_code)]

use axum::response::IntoResponse;
use axum::Router;
use axum_extra::extract::cookie::{Cookie, Key};
use axum_extra::extract::PrivateCookieJar;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Response};
use mockito::ServerGuard;
use oidc_session_guard::config::Config;
use oidc_session_guard::oidc::OidcClient;
use oidc_session_guard::server::{build_router, AppState};
use oidc_session_guard::session::{SessionCookies, SessionPrincipal, TokenBundle};
use std::collections::BTreeMap;

pub const COOKIE_NAME: &str = "session";
const KEY_BYTES: [u8; 64] = [42; 64];

pub fn cookie_key() -> Key {
    Key::from(&KEY_BYTES[..])
}

/// Mock the discovery document of an identity provider hosted by `server`
pub async fn mock_discovery(server: &mut ServerGuard) {
    server
        .mock("GET", "/.well-known/openid-configuration")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(
            r#"{{
                "issuer": "{0}",
                "authorization_endpoint": "{0}/authorize",
                "token_endpoint": "{0}/token",
                "userinfo_endpoint": "{0}/userinfo",
                "end_session_endpoint": "{0}/logout"
            }}"#,
            server.url()
        ))
        .create_async()
        .await;
}

/// Build the full application against the mocked provider
pub async fn setup_app(server: &mut ServerGuard, clock_skew_secs: u64) -> Router {
    mock_discovery(server).await;

    let skew = clock_skew_secs.to_string();
    let config = Config::try_parse_from([
        "oidc-session-guard",
        "--issuer-url",
        &server.url(),
        "--client-id",
        "test-client-id",
        "--client-secret",
        "test-client-secret",
        "--public-url",
        "http://app.test",
        "--cookie-name",
        COOKIE_NAME,
        "--cookie-key",
        &STANDARD.encode(KEY_BYTES),
        "--clock-skew-secs",
        &skew,
        "--refresh-timeout-secs",
        "2",
    ])
    .expect("valid test configuration");
    config.validate().expect("configuration validates");

    let oidc = OidcClient::new(
        &config.issuer_url,
        config.client_id.clone(),
        config.client_secret.clone(),
        config.scopes(),
        config.redirect_url(),
        config.refresh_timeout(),
    )
    .await
    .expect("Failed to create OIDC client");

    build_router(AppState::new(&config, oidc).expect("app state"))
}

pub fn principal(
    access_token: &str,
    expiry: DateTime<Utc>,
    refresh_token: Option<&str>,
) -> SessionPrincipal {
    SessionPrincipal::new(
        BTreeMap::from([
            ("sub".to_string(), vec!["u-1".to_string()]),
            ("name".to_string(), vec!["Ada".to_string()]),
            ("roles".to_string(), vec!["admin".to_string()]),
        ]),
        TokenBundle {
            access_token: access_token.to_string(),
            access_token_expiry: expiry,
            refresh_token: refresh_token.map(String::from),
            id_token: Some("ID1".to_string()),
        },
    )
}

pub fn expired_principal(refresh_token: Option<&str>) -> SessionPrincipal {
    principal("A1", Utc::now() - Duration::seconds(1), refresh_token)
}

pub fn valid_principal() -> SessionPrincipal {
    principal("A1", Utc::now() + Duration::hours(1), Some("R1"))
}

/// `Cookie` request header value carrying a sealed session
pub fn sealed_session(principal: &SessionPrincipal) -> String {
    let cookie = SessionCookies::new(COOKIE_NAME, true, 14)
        .seal(principal)
        .expect("principal fits in a cookie");
    let jar = PrivateCookieJar::new(cookie_key()).add(cookie);
    let response = (jar, ()).into_response();

    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("jar emits Set-Cookie");
    request_cookie(set_cookie)
}

/// Turn a `Set-Cookie` value into a `Cookie` request header pair
pub fn request_cookie(set_cookie: &str) -> String {
    let cookie = Cookie::parse(set_cookie.to_string()).expect("valid Set-Cookie");
    format!("{}={}", cookie.name(), cookie.value())
}

/// All `Set-Cookie` values for the named cookie
pub fn set_cookies_named<B>(response: &Response<B>, name: &str) -> Vec<String> {
    let prefix = format!("{}=", name);
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| v.starts_with(&prefix))
        .map(String::from)
        .collect()
}

/// Unseal a session `Set-Cookie` value
pub fn unseal_session(set_cookie: &str) -> Option<SessionPrincipal> {
    let mut headers = HeaderMap::new();
    headers.insert(
        COOKIE,
        HeaderValue::from_str(&request_cookie(set_cookie)).ok()?,
    );
    let jar = PrivateCookieJar::from_headers(&headers, cookie_key());
    SessionCookies::new(COOKIE_NAME, true, 14).load(&jar)
}

pub fn is_removal(set_cookie: &str) -> bool {
    set_cookie.contains("Max-Age=0")
}

pub fn location<B>(response: &Response<B>) -> String {
    response
        .headers()
        .get(http::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
