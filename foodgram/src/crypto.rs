//! Auth token generation and digesting.
//!
//! Tokens are opaque: 32 random bytes encoded as base64url. The database only ever sees an
//! HMAC-SHA256 digest keyed with the configured secret, so a leaked `auth_tokens` table cannot be
//! replayed against the API.

use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use rand::prelude::RngExt;
use rand::rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Generates a cryptographically secure auth token with 256 bits of entropy.
///
/// ```ignore
/// let token = generate_auth_token();
/// assert_eq!(token.len(), 43);
/// ```
pub fn generate_auth_token() -> String {
    // Generate 32 bytes (256 bits) of cryptographically secure random data
    let mut token_bytes = [0u8; 32];
    rng().fill(&mut token_bytes);

    // Encode as base64url without padding
    general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}

/// Hex encoded HMAC-SHA256 of `token` under `key`.
pub fn token_digest(key: &str, token: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(token.as_bytes());
    format!("{:x}", mac.finalize().into_bytes())
}
