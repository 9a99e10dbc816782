//! HTTP server assembly
//!
//! Builds the shared application state and the ordered request pipeline:
//! session refresh guard, then authorization, then the route handlers.

use crate::config::Config;
use crate::error::Result;
use crate::middleware::{require_authenticated, session_refresh};
use crate::oidc::OidcClient;
use crate::routes;
use crate::session::{ClaimMap, RefreshGuard, SessionCookies};
use crate::weather::{RandomForecaster, WeatherForecaster};
use axum::extract::FromRef;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::Router;
use axum_extra::extract::cookie::Key;
use std::sync::Arc;

/// Redirect targets derived from configuration
#[derive(Debug, Clone)]
pub struct AuthPaths {
    pub callback_path: String,
    pub signed_out_callback_path: String,
    pub post_logout_redirect_url: String,
}

/// State shared by every pipeline stage and handler
#[derive(Clone)]
pub struct AppState {
    pub oidc: Arc<OidcClient>,
    pub guard: Arc<RefreshGuard>,
    pub cookies: Arc<SessionCookies>,
    pub claims: Arc<ClaimMap>,
    pub paths: Arc<AuthPaths>,
    pub forecaster: Arc<dyn WeatherForecaster>,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(config: &Config, oidc: OidcClient) -> Result<Self> {
        let cookie_key = config.cookie_key()?;
        if config.cookie_key.is_none() {
            tracing::warn!("COOKIE_KEY not set, using an ephemeral key; sessions end on restart");
        }

        let oidc = Arc::new(oidc);
        let guard = RefreshGuard::new(oidc.clone(), config.clock_skew());

        Ok(Self {
            guard: Arc::new(guard),
            oidc,
            cookies: Arc::new(SessionCookies::new(
                config.cookie_name.clone(),
                !config.insecure_cookies,
                config.session_days,
            )),
            claims: Arc::new(config.claim_map()),
            paths: Arc::new(AuthPaths {
                callback_path: config.callback_path.clone(),
                signed_out_callback_path: config.signed_out_callback_path.clone(),
                post_logout_redirect_url: config.post_logout_redirect_url(),
            }),
            forecaster: Arc::new(RandomForecaster),
            cookie_key,
        })
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Build the application router
///
/// Login and logout routes bypass the refresh guard so their own cookie writes
/// are never overridden by a reissued session cookie.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/weather-forecast", get(routes::weather::forecast))
        .route_layer(from_fn(require_authenticated));

    let app = Router::new()
        .route("/", get(routes::index))
        .route("/authentication/user", get(routes::auth::current_user))
        .merge(protected)
        .layer(from_fn_with_state(state.clone(), session_refresh));

    app.merge(routes::auth::router(&state.paths))
        .with_state(state)
}

/// Serve the application until Ctrl+C
pub async fn run_server(config: Config, oidc_client: OidcClient) -> Result<()> {
    let state = AppState::new(&config, oidc_client)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down gracefully...");
            }
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
