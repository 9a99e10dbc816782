//! OIDC provider discovery
//!
//! Fetches OIDC configuration from /.well-known/openid-configuration

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
}

impl OidcConfig {
    /// Discover OIDC configuration from issuer URL
    pub async fn discover(http: &reqwest::Client, issuer_url: &str) -> Result<Self> {
        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            issuer_url.trim_end_matches('/')
        );

        let response = http
            .get(&discovery_url)
            .timeout(DISCOVERY_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::Discovery(format!("Failed to fetch OIDC configuration: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Discovery(format!(
                "OIDC discovery request failed with status: {}",
                response.status()
            )));
        }

        let config: OidcConfig = response
            .json()
            .await
            .map_err(|e| AppError::Discovery(format!("Failed to parse OIDC configuration: {}", e)))?;

        if config.authorization_endpoint.is_empty() {
            return Err(AppError::Discovery(
                "OIDC configuration missing authorization_endpoint".to_string(),
            ));
        }

        if config.token_endpoint.is_empty() {
            return Err(AppError::Discovery(
                "OIDC configuration missing token_endpoint".to_string(),
            ));
        }

        Ok(config)
    }
}
