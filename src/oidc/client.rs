//! OIDC client implementation
//!
//! Talks to the identity provider on behalf of the web app: builds the
//! authorization request, exchanges the authorization code, refreshes access
//! tokens and fetches userinfo claims. Holds no per-user state; every token
//! lives in the caller's session cookie.

use super::{generate_state, OidcConfig, PkceParams, TokenErrorResponse, TokenResponse};
use crate::error::{AppError, RefreshError, Result};
use crate::session::TokenRefresher;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

/// Authorization request parameters to keep until the callback arrives
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub nonce: String,
    pub code_verifier: String,
}

/// OIDC client for the authorization code and refresh token grants
pub struct OidcClient {
    client_id: String,
    client_secret: Option<String>,
    scopes: Vec<String>,
    redirect_url: String,
    refresh_timeout: Duration,
    oidc_config: OidcConfig,
    http: reqwest::Client,
}

impl OidcClient {
    /// Create a new OIDC client, discovering the provider's endpoints
    pub async fn new(
        issuer_url: &str,
        client_id: String,
        client_secret: Option<String>,
        scopes: Vec<String>,
        redirect_url: String,
        refresh_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::new();
        let oidc_config = OidcConfig::discover(&http, issuer_url).await?;

        Ok(Self {
            client_id,
            client_secret,
            scopes,
            redirect_url,
            refresh_timeout,
            oidc_config,
            http,
        })
    }

    pub fn provider(&self) -> &OidcConfig {
        &self.oidc_config
    }

    /// Build an authorization URL with fresh state and PKCE values
    pub fn authorization_request(&self) -> Result<AuthorizationRequest> {
        let pkce = PkceParams::generate();
        let state = generate_state();
        let nonce = generate_state();

        let mut url = Url::parse(&self.oidc_config.authorization_endpoint)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_url)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", &state)
            .append_pair("nonce", &nonce)
            .append_pair("code_challenge", &pkce.code_challenge)
            .append_pair("code_challenge_method", "S256");

        Ok(AuthorizationRequest {
            url: url.to_string(),
            state,
            nonce,
            code_verifier: pkce.code_verifier,
        })
    }

    /// Exchange authorization code for tokens
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenResponse> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_url.as_str()),
            ("client_id", self.client_id.as_str()),
            ("code_verifier", code_verifier),
        ];

        if let Some(ref secret) = self.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let response = self
            .http
            .post(&self.oidc_config.token_endpoint)
            .timeout(self.refresh_timeout)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = TokenErrorResponse::from_body(&body);
            return Err(AppError::Token(format!(
                "Token exchange failed with status {}: {}",
                status, error.error
            )));
        }

        let token_response: TokenResponse = response.json().await?;
        Ok(token_response)
    }

    /// Exchange a refresh token for a new token pair
    pub async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<TokenResponse, RefreshError> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ];

        if let Some(ref secret) = self.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        tracing::debug!("Refreshing access token");

        let response = self
            .http
            .post(&self.oidc_config.token_endpoint)
            .timeout(self.refresh_timeout)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let error = TokenErrorResponse::from_body(&body);
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                error: error.error,
                description: error.error_description,
            });
        }

        let token_response: TokenResponse =
            serde_json::from_str(&body).map_err(|e| RefreshError::Malformed(e.to_string()))?;

        if token_response.access_token.is_empty() {
            return Err(RefreshError::Malformed("empty access_token".to_string()));
        }

        Ok(token_response)
    }

    /// Fetch the user's claims from the userinfo endpoint
    pub async fn user_info(&self, access_token: &str) -> Result<Map<String, Value>> {
        let endpoint = self.oidc_config.userinfo_endpoint.as_deref().ok_or_else(|| {
            AppError::Discovery("Provider does not advertise a userinfo_endpoint".to_string())
        })?;

        let response = self
            .http
            .get(endpoint)
            .bearer_auth(access_token)
            .timeout(self.refresh_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Token(format!(
                "Userinfo request failed with status: {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    /// Build the provider's end-session URL, if the provider supports RP-initiated logout
    pub fn end_session_url(
        &self,
        id_token_hint: Option<&str>,
        post_logout_redirect_url: &str,
    ) -> Result<Option<String>> {
        let Some(ref endpoint) = self.oidc_config.end_session_endpoint else {
            return Ok(None);
        };

        let mut url = Url::parse(endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("post_logout_redirect_uri", post_logout_redirect_url);
            if let Some(hint) = id_token_hint {
                query.append_pair("id_token_hint", hint);
            }
        }

        Ok(Some(url.to_string()))
    }
}

#[async_trait]
impl TokenRefresher for OidcClient {
    async fn refresh(&self, refresh_token: &str) -> std::result::Result<TokenResponse, RefreshError> {
        self.exchange_refresh_token(refresh_token).await
    }
}
