//! OIDC provider access

pub mod client;
pub mod discovery;
pub mod pkce;
pub mod token;

pub use client::{AuthorizationRequest, OidcClient};
pub use discovery::OidcConfig;
pub use pkce::{generate_state, PkceParams};
pub use token::{id_token_claims, TokenErrorResponse, TokenResponse};
