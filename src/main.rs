//! OIDC Session Guard - Main entry point
//!
//! Serves a small web application whose users sign in through an OpenID Connect
//! provider. Tokens live in a sealed session cookie and the access token is
//! refreshed on expiry before protected routes run.

use oidc_session_guard::config::Config;
use oidc_session_guard::error::Result;
use oidc_session_guard::oidc::OidcClient;
use oidc_session_guard::server;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const BANNER: &str = r#"
╔══════════════════════════════════════════════════════════════╗
║                      OIDC Session Guard                      ║
║        cookie sessions with transparent token refresh        ║
╚══════════════════════════════════════════════════════════════╝
"#;

fn setup_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}", config.log_level())));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let config = Config::parse_args();

    setup_logging(&config);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    if !config.no_banner && !config.silent {
        eprintln!("{}", BANNER);
        info!("OIDC Issuer: {}", config.issuer_url);
        info!("Client ID: {}", config.client_id);
        info!("Scopes: {}", config.scopes().join(" "));
        info!("Redirect URL: {}", config.redirect_url());
        info!(
            "Token refresh: skew {}s, timeout {}s",
            config.clock_skew_secs, config.refresh_timeout_secs
        );
        eprintln!();
    }

    if let Err(e) = run(config).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    info!("Initializing OIDC client...");

    let oidc_client = OidcClient::new(
        &config.issuer_url,
        config.client_id.clone(),
        config.client_secret.clone(),
        config.scopes(),
        config.redirect_url(),
        config.refresh_timeout(),
    )
    .await?;

    info!(
        "OIDC client initialized (token endpoint: {})",
        oidc_client.provider().token_endpoint
    );

    server::run_server(config, oidc_client).await
}
