//! Login, logout and OIDC callback routes
//!
//! The only place a session is created. Tokens obtained here are sealed into
//! the session cookie and from then on only the refresh guard replaces them.

use crate::error::{AppError, Result};
use crate::middleware::LOGIN_PATH;
use crate::oidc::id_token_claims;
use crate::server::{AppState, AuthPaths};
use crate::session::{AuthenticatedUser, SessionPrincipal, TokenBundle};
use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use axum_extra::extract::PrivateCookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const LOGOUT_PATH: &str = "/authentication/logout";

/// Routes that manage the session cookie themselves
pub fn router(paths: &AuthPaths) -> Router<AppState> {
    Router::new()
        .route(LOGIN_PATH, get(login))
        .route(LOGOUT_PATH, post(logout))
        .route(&paths.callback_path, get(callback))
        .route(&paths.signed_out_callback_path, get(signed_out))
}

#[derive(Debug, Deserialize)]
pub struct ReturnUrlParams {
    #[serde(rename = "returnUrl")]
    pub return_url: Option<String>,
}

/// State kept in a sealed cookie between the login redirect and the callback
#[derive(Debug, Serialize, Deserialize)]
struct LoginChallenge {
    state: String,
    nonce: String,
    code_verifier: String,
    return_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Authentication state exposed to the client
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserState {
    pub is_authenticated: bool,
    pub name: Option<String>,
    pub roles: Vec<String>,
}

async fn login(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(params): Query<ReturnUrlParams>,
) -> Result<(PrivateCookieJar, Redirect)> {
    let request = state.oidc.authorization_request()?;

    let challenge = LoginChallenge {
        state: request.state,
        nonce: request.nonce,
        code_verifier: request.code_verifier,
        return_url: local_return_url(params.return_url.as_deref()),
    };
    let cookie = state.cookies.challenge(&challenge)?;

    tracing::debug!(return_url = %challenge.return_url, "Redirecting to identity provider");
    Ok((jar.add(cookie), Redirect::to(&request.url)))
}

async fn callback(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackQuery>,
) -> Result<(PrivateCookieJar, Redirect)> {
    if let Some(error) = params.error {
        let description = params
            .error_description
            .unwrap_or_else(|| "No description provided".to_string());
        return Err(AppError::Callback(format!("{} - {}", error, description)));
    }

    let challenge: LoginChallenge = state
        .cookies
        .load_challenge(&jar)
        .ok_or_else(|| AppError::Callback("No pending login challenge".to_string()))?;

    if params.state.as_deref() != Some(challenge.state.as_str()) {
        return Err(AppError::Auth(
            "State mismatch - possible CSRF attack".to_string(),
        ));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::Callback("Missing code parameter in callback".to_string()))?;

    let issued_at = Utc::now();
    let tokens = state
        .oidc
        .exchange_code(&code, &challenge.code_verifier)
        .await?;

    let mut claims = match tokens.id_token.as_deref() {
        Some(id_token) => {
            let claims = id_token_claims(id_token)?;
            if claims.get("nonce").and_then(Value::as_str) != Some(challenge.nonce.as_str()) {
                return Err(AppError::Auth("ID token nonce mismatch".to_string()));
            }
            claims
        }
        None => Map::new(),
    };
    if state.oidc.provider().userinfo_endpoint.is_some() {
        claims.extend(state.oidc.user_info(&tokens.access_token).await?);
    }
    if claims.is_empty() {
        return Err(AppError::Auth("Provider released no user claims".to_string()));
    }

    let principal =
        SessionPrincipal::from_user_info(claims, TokenBundle::from_response(tokens, issued_at));
    let cookie = state.cookies.seal(&principal)?;

    tracing::info!(subject = ?principal.claim("sub"), "Login successful");

    let jar = jar
        .remove(state.cookies.challenge_removal())
        .add(cookie);
    Ok((jar, Redirect::to(&challenge.return_url)))
}

async fn logout(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(params): Form<ReturnUrlParams>,
) -> Result<(PrivateCookieJar, Redirect)> {
    let id_token = state
        .cookies
        .load(&jar)
        .and_then(|principal| principal.tokens.id_token);

    let target = match state
        .oidc
        .end_session_url(id_token.as_deref(), &state.paths.post_logout_redirect_url)?
    {
        Some(url) => url,
        None => local_return_url(params.return_url.as_deref()),
    };

    tracing::info!("Signed out");
    Ok((jar.remove(state.cookies.removal()), Redirect::to(&target)))
}

async fn signed_out() -> Redirect {
    Redirect::to("/")
}

/// Authentication state of the current request
pub async fn current_user(user: Option<AuthenticatedUser>) -> Json<UserState> {
    Json(match user {
        Some(user) => UserState {
            is_authenticated: true,
            name: user.name,
            roles: user.roles,
        },
        None => UserState {
            is_authenticated: false,
            name: None,
            roles: Vec::new(),
        },
    })
}

/// Accept only same-site relative paths as post-login destinations
pub fn local_return_url(return_url: Option<&str>) -> String {
    match return_url {
        Some(url) if url.starts_with('/') && !url.starts_with("//") && !url.starts_with("/\\") => {
            url.to_string()
        }
        _ => "/".to_string(),
    }
}
