//! PKCE material and state tokens (RFC 7636).

use std::sync::LazyLock;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Redirect state tokens are 32 random bytes, base64url-encoded to 43
/// characters; anything outside this shape is rejected before the flow
/// store is consulted.
static STATE_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{20,64}$").unwrap_or_else(|e| unreachable!("bad state pattern: {e}"))
});

/// A PKCE code verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct PkcePair {
    /// The code verifier, kept local until the token exchange.
    pub verifier: String,
    /// `base64url(sha256(verifier))`, sent in the authorization request.
    pub challenge: String,
}

/// Generate a PKCE pair: a 48-byte random verifier and its S256 challenge.
#[must_use]
pub fn generate_pkce() -> PkcePair {
    let mut bytes = [0u8; 48];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let verifier = URL_SAFE_NO_PAD.encode(bytes);

    let digest = Sha256::digest(verifier.as_bytes());
    let challenge = URL_SAFE_NO_PAD.encode(digest);

    PkcePair {
        verifier,
        challenge,
    }
}

/// Generate a 32-byte random anti-CSRF state token.
#[must_use]
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Whether a callback `state` parameter has a plausible token shape.
#[must_use]
pub fn is_valid_state_shape(state: &str) -> bool {
    STATE_SHAPE.is_match(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_is_s256_of_verifier() {
        let pair = generate_pkce();
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(pair.verifier.as_bytes()));
        assert_eq!(pair.challenge, expected);
        assert_ne!(pair.verifier, pair.challenge);
    }

    #[test]
    fn test_verifier_length_and_charset() {
        let pair = generate_pkce();
        // 48 bytes -> 64 base64url chars, within RFC 7636's 43..=128 bounds.
        assert_eq!(pair.verifier.len(), 64);
        assert!(pair
            .verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_generated_state_passes_shape_check() {
        let state = generate_state();
        assert_eq!(state.len(), 43);
        assert!(is_valid_state_shape(&state));
        assert_ne!(state, generate_state());
    }

    #[test]
    fn test_state_shape_rejects_malformed_input() {
        assert!(!is_valid_state_shape(""));
        assert!(!is_valid_state_shape("short"));
        assert!(!is_valid_state_shape(&"x".repeat(65)));
        assert!(!is_valid_state_shape("has spaces and $ymbols aplenty!!"));
        assert!(!is_valid_state_shape("padded-base64-would-end-with=="));
    }
}
