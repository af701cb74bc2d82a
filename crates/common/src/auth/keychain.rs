//! OAuth token storage helpers layered on top of [`CredentialStore`].
//!
//! The token set is serialized as one JSON entry per account so that a
//! refresh replaces it in a single write. The PKCE verifier lives in its own
//! entry and only exists while an authorization attempt is in flight.

use tracing::debug;

use crate::auth::types::TokenSet;
use crate::security::{CredentialStore, KeychainError};

const TOKENS_PREFIX: &str = "tokens.";
const VERIFIER_PREFIX: &str = "pkce_verifier.";

/// Token and verifier persistence for any credential store.
pub trait TokenStorage {
    /// Load the token set for `account`.
    fn load_tokens(&self, account: &str) -> Result<Option<TokenSet>, KeychainError>;

    /// Replace the token set for `account`.
    fn store_tokens(&self, account: &str, tokens: &TokenSet) -> Result<(), KeychainError>;

    /// Remove the token set for `account`.
    fn delete_tokens(&self, account: &str) -> Result<(), KeychainError>;

    /// Persist the verifier of the authorization attempt in flight.
    fn store_code_verifier(&self, account: &str, verifier: &str) -> Result<(), KeychainError>;

    /// Read the pending verifier, if any.
    fn load_code_verifier(&self, account: &str) -> Result<Option<String>, KeychainError>;

    /// Drop the pending verifier.
    fn delete_code_verifier(&self, account: &str) -> Result<(), KeychainError>;
}

impl<S: CredentialStore + ?Sized> TokenStorage for S {
    fn load_tokens(&self, account: &str) -> Result<Option<TokenSet>, KeychainError> {
        let Some(raw) = self.get_secret(&format!("{TOKENS_PREFIX}{account}"))? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn store_tokens(&self, account: &str, tokens: &TokenSet) -> Result<(), KeychainError> {
        debug!(account = %account, expires_at_ms = tokens.expires_at_ms, "Storing OAuth tokens");
        let raw = serde_json::to_string(tokens)?;
        self.set_secret(&format!("{TOKENS_PREFIX}{account}"), &raw)
    }

    fn delete_tokens(&self, account: &str) -> Result<(), KeychainError> {
        debug!(account = %account, "Deleting OAuth tokens");
        self.delete_secret(&format!("{TOKENS_PREFIX}{account}"))
    }

    fn store_code_verifier(&self, account: &str, verifier: &str) -> Result<(), KeychainError> {
        self.set_secret(&format!("{VERIFIER_PREFIX}{account}"), verifier)
    }

    fn load_code_verifier(&self, account: &str) -> Result<Option<String>, KeychainError> {
        Ok(self
            .get_secret(&format!("{VERIFIER_PREFIX}{account}"))?
            .filter(|verifier| !verifier.trim().is_empty()))
    }

    fn delete_code_verifier(&self, account: &str) -> Result<(), KeychainError> {
        self.delete_secret(&format!("{VERIFIER_PREFIX}{account}"))
    }
}
