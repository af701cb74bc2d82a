//! PKCE (Proof Key for Code Exchange) implementation for OAuth 2.0
//!
//! Implements RFC 7636 S256 challenges for authorization without a client
//! secret. The verifier is kept in the credential store between the
//! authorization request and the redirect that completes it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes behind a verifier (encodes to 43 characters).
pub const VERIFIER_ENTROPY_BYTES: usize = 32;

/// Generate a cryptographically secure code verifier
///
/// Returns a URL-safe base64-encoded (unpadded) random string of 32 bytes,
/// which is 43 characters and inside the RFC 7636 43-128 range.
pub fn generate_code_verifier() -> String {
    let mut random_bytes = [0u8; VERIFIER_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut random_bytes);
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Generate code challenge from verifier using SHA256
///
/// Per RFC 7636, the challenge is BASE64URL(SHA256(ASCII(code_verifier)))
pub fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// PKCE challenge pair for one authorization attempt
///
/// The verifier is sent during token exchange, the challenge during the
/// authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    /// Random string (43-128 chars, base64url encoded)
    pub code_verifier: String,

    /// SHA256 hash of `code_verifier` (base64url encoded)
    pub code_challenge: String,
}

impl PkceChallenge {
    /// Generate a new challenge from fresh randomness.
    ///
    /// # Examples
    /// ```
    /// use eventtracker_common::auth::pkce::PkceChallenge;
    ///
    /// let challenge = PkceChallenge::generate();
    /// assert_eq!(challenge.code_verifier.len(), 43);
    /// ```
    pub fn generate() -> Self {
        Self::from_verifier(generate_code_verifier())
    }

    /// Rebuild the pair from a previously persisted verifier.
    pub fn from_verifier(code_verifier: String) -> Self {
        let code_challenge = generate_code_challenge(&code_verifier);
        Self { code_verifier, code_challenge }
    }

    /// Get the challenge method (always "S256" for SHA256)
    #[must_use]
    pub fn challenge_method(&self) -> &str {
        "S256"
    }
}
