//! Configuration parsing and validation

use crate::error::{AppError, Result};
use crate::session::ClaimMap;
use axum_extra::extract::cookie::Key;
use base64::{engine::general_purpose::STANDARD, Engine};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_SCOPES: &str = "openid profile offline_access";
const MAX_CLOCK_SKEW_SECS: u64 = 60;
const MIN_COOKIE_KEY_BYTES: usize = 64;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "oidc-session-guard",
    version,
    about = "OIDC cookie-session web app with transparent access-token refresh",
    long_about = "Signs users in through an OpenID Connect provider, keeps the tokens in a sealed session cookie and refreshes the access token on expiry before protected handlers run"
)]
pub struct Config {
    /// OIDC issuer URL (e.g., https://api.descope.com/<project>)
    #[arg(long, env = "DESCOPE_ISSUER_URL")]
    pub issuer_url: String,

    /// OAuth client ID
    #[arg(long, env = "DESCOPE_PROJECT_ID")]
    pub client_id: String,

    /// OAuth client secret (optional for public clients)
    #[arg(long, env = "DESCOPE_CLIENT_SECRET")]
    pub client_secret: Option<String>,

    /// Space-separated OAuth scopes (default: "openid profile offline_access")
    #[arg(long, env = "OIDC_SCOPES")]
    pub scopes: Option<String>,

    /// Address the HTTP server binds to
    #[arg(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:5000")]
    pub listen: SocketAddr,

    /// Externally visible base URL used to build redirect URIs (default: http://<listen>)
    #[arg(long, env = "PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Path the provider redirects to after sign-in
    #[arg(long, default_value = "/signin-oidc")]
    pub callback_path: String,

    /// Path the provider redirects to after sign-out
    #[arg(long, default_value = "/signout-callback-oidc")]
    pub signed_out_callback_path: String,

    /// Claim holding the user's display name
    #[arg(long, default_value = "name")]
    pub name_claim: String,

    /// Claim holding the user's roles
    #[arg(long, default_value = "roles")]
    pub role_claim: String,

    /// Name of the session cookie
    #[arg(long, default_value = "session")]
    pub cookie_name: String,

    /// Base64-encoded key (at least 64 bytes) sealing the session cookie
    #[arg(long, env = "COOKIE_KEY", hide_env_values = true)]
    pub cookie_key: Option<String>,

    /// Session cookie lifetime in days
    #[arg(long, default_value_t = 14)]
    pub session_days: i64,

    /// Issue cookies without the Secure attribute (plain-HTTP development)
    #[arg(long, env = "INSECURE_COOKIES")]
    pub insecure_cookies: bool,

    /// Seconds before expiry at which an access token is already treated as expired
    #[arg(long, default_value_t = 60)]
    pub clock_skew_secs: u64,

    /// Timeout for the refresh-token exchange, in seconds
    #[arg(long, default_value_t = 5)]
    pub refresh_timeout_secs: u64,

    /// Don't show the startup banner
    #[arg(long)]
    pub no_banner: bool,

    /// Show only error messages
    #[arg(long, conflicts_with = "debug")]
    pub silent: bool,

    /// Enable debug logging
    #[arg(long, env = "SESSION_GUARD_DEBUG")]
    pub debug: bool,
}

impl Config {
    /// Parse configuration from CLI arguments and environment variables
    pub fn parse_args() -> Self {
        Config::parse()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.issuer_url.is_empty() {
            return Err(AppError::Config("OIDC issuer URL is required".to_string()));
        }

        if self.client_id.is_empty() {
            return Err(AppError::Config("OIDC client ID is required".to_string()));
        }

        url::Url::parse(&self.issuer_url)
            .map_err(|e| AppError::Config(format!("Invalid OIDC issuer URL: {}", e)))?;

        if let Some(ref public_url) = self.public_url {
            url::Url::parse(public_url)
                .map_err(|e| AppError::Config(format!("Invalid public URL: {}", e)))?;
        }

        for path in [&self.callback_path, &self.signed_out_callback_path] {
            if !path.starts_with('/') {
                return Err(AppError::Config(format!(
                    "Callback path must start with '/': {}",
                    path
                )));
            }
        }

        if self.cookie_name.is_empty() {
            return Err(AppError::Config("Cookie name must not be empty".to_string()));
        }

        if self.clock_skew_secs > MAX_CLOCK_SKEW_SECS {
            return Err(AppError::Config(format!(
                "Clock skew must be at most {} seconds",
                MAX_CLOCK_SKEW_SECS
            )));
        }

        if self.refresh_timeout_secs == 0 {
            return Err(AppError::Config(
                "Refresh timeout must be greater than zero".to_string(),
            ));
        }

        if self.session_days <= 0 {
            return Err(AppError::Config(
                "Session lifetime must be at least one day".to_string(),
            ));
        }

        self.cookie_key()?;

        Ok(())
    }

    /// Get OAuth scopes as a list (with defaults)
    pub fn scopes(&self) -> Vec<String> {
        let scopes_str = self.scopes.as_deref().unwrap_or(DEFAULT_SCOPES);

        let mut scopes: Vec<String> = scopes_str.split_whitespace().map(String::from).collect();

        if !scopes.iter().any(|s| s == "openid") {
            scopes.insert(0, "openid".to_string());
        }

        // Without offline_access the provider issues no refresh token
        if !scopes.iter().any(|s| s == "offline_access") {
            scopes.push("offline_access".to_string());
        }

        scopes
    }

    /// Externally visible base URL, without a trailing slash
    pub fn public_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.listen))
            .trim_end_matches('/')
            .to_string()
    }

    /// Redirect URI registered with the provider for sign-in
    pub fn redirect_url(&self) -> String {
        format!("{}{}", self.public_url(), self.callback_path)
    }

    /// Redirect URI registered with the provider for sign-out
    pub fn post_logout_redirect_url(&self) -> String {
        format!("{}{}", self.public_url(), self.signed_out_callback_path)
    }

    /// Claim-type mapping applied when a session is loaded
    pub fn claim_map(&self) -> ClaimMap {
        ClaimMap::new(self.name_claim.clone(), self.role_claim.clone())
    }

    pub fn clock_skew(&self) -> Duration {
        Duration::from_secs(self.clock_skew_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    /// Decode the configured cookie key, or generate an ephemeral one
    ///
    /// An ephemeral key invalidates every session on restart.
    pub fn cookie_key(&self) -> Result<Key> {
        let Some(ref encoded) = self.cookie_key else {
            return Ok(Key::generate());
        };

        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| AppError::Config(format!("COOKIE_KEY is not valid base64: {}", e)))?;

        if bytes.len() < MIN_COOKIE_KEY_BYTES {
            return Err(AppError::Config(format!(
                "COOKIE_KEY must decode to at least {} bytes",
                MIN_COOKIE_KEY_BYTES
            )));
        }

        Key::try_from(bytes.as_slice())
            .map_err(|e| AppError::Config(format!("Invalid COOKIE_KEY: {}", e)))
    }

    /// Get log level based on flags
    pub fn log_level(&self) -> tracing::Level {
        if self.silent {
            tracing::Level::ERROR
        } else if self.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
