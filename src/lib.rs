//! OIDC Session Guard Library
//!
//! Cookie-held OIDC sessions whose access tokens are refreshed transparently
//! before requests reach protected handlers.

pub mod config;
pub mod error;
pub mod middleware;
pub mod oidc;
pub mod routes;
pub mod server;
pub mod session;
pub mod weather;
