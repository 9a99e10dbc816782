//! Request pipeline stages for session refresh and authorization
//!
//! `session_refresh` runs on every application request and applies the
//! refresh guard's decision to the session cookie. `require_authenticated`
//! sits on protected routes, after it, and sends anonymous callers to login.

use crate::error::GuardError;
use crate::server::AppState;
use crate::session::{AuthenticatedUser, GuardOutcome};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::PrivateCookieJar;
use chrono::Utc;
use tracing::{debug, warn};

pub const LOGIN_PATH: &str = "/authentication/login";

/// Marks a request whose session was ended by the refresh guard
#[derive(Debug, Clone, Copy)]
pub struct SessionEnded;

/// Keep the session's access token valid, refreshing or ending the session
pub async fn session_refresh(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let principal = state.cookies.load(&jar);

    // Dropping this future (client gone) abandons the exchange and writes no cookie
    match state.guard.check(principal, Utc::now()).await {
        GuardOutcome::Anonymous => next.run(req).await,
        GuardOutcome::Valid(principal) => {
            req.extensions_mut().insert(state.claims.resolve(&principal));
            next.run(req).await
        }
        GuardOutcome::Refreshed(principal) => match state.cookies.seal(&principal) {
            Ok(cookie) => {
                debug!("Reissuing session cookie with refreshed tokens");
                req.extensions_mut().insert(state.claims.resolve(&principal));
                let response = next.run(req).await;
                (jar.add(cookie), response).into_response()
            }
            Err(e) => {
                end_session(
                    &state,
                    jar,
                    req,
                    next,
                    GuardError::CookieRewriteFailed(e.to_string()),
                )
                .await
            }
        },
        GuardOutcome::Ended(reason) => end_session(&state, jar, req, next, reason).await,
    }
}

async fn end_session(
    state: &AppState,
    jar: PrivateCookieJar,
    mut req: Request,
    next: Next,
    reason: GuardError,
) -> Response {
    warn!(reason = %reason, path = %req.uri().path(), "Ending session");

    req.extensions_mut().insert(SessionEnded);
    let response = next.run(req).await;
    (jar.remove(state.cookies.removal()), response).into_response()
}

/// Reject requests without an authenticated user by redirecting to login
pub async fn require_authenticated(req: Request, next: Next) -> Response {
    if req.extensions().get::<AuthenticatedUser>().is_some() {
        return next.run(req).await;
    }

    if req.extensions().get::<SessionEnded>().is_some() {
        debug!("Session expired, redirecting to login");
    }

    let return_url = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Redirect::to(&login_url(return_url)).into_response()
}

/// Login path carrying the page to come back to
pub fn login_url(return_url: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("returnUrl", return_url)
        .finish();
    format!("{}?{}", LOGIN_PATH, query)
}
