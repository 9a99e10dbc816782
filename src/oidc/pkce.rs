//! PKCE (Proof Key for Code Exchange) and random challenge values
//!
//! Implements RFC 7636 S256 challenges plus the `state` and `nonce` values
//! sent with each authorization request.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

const VERIFIER_LEN: usize = 64;
const STATE_LEN: usize = 32;

/// PKCE parameters for one authorization request
#[derive(Debug, Clone)]
pub struct PkceParams {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkceParams {
    /// Generate a random verifier and its S256 challenge
    pub fn generate() -> Self {
        Self::from_verifier(random_token(VERIFIER_LEN))
    }

    /// Compute the challenge for a known verifier: BASE64URL(SHA256(verifier))
    pub fn from_verifier(code_verifier: String) -> Self {
        let hash = Sha256::digest(code_verifier.as_bytes());
        let code_challenge = URL_SAFE_NO_PAD.encode(hash);

        PkceParams {
            code_verifier,
            code_challenge,
        }
    }
}

/// Random `state` or `nonce` value for an authorization request
pub fn generate_state() -> String {
    random_token(STATE_LEN)
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
