//! Trait abstractions for secret storage
//!
//! Components that persist OAuth tokens or need the archive key depend on
//! [`CredentialStore`] rather than on a concrete keychain, so tests can use the
//! in-memory mock from `testing`.

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

use super::keychain::KeychainError;

/// Length in bytes of keys handed out by [`CredentialStore::symmetric_key`].
pub const SYMMETRIC_KEY_LEN: usize = 32;

/// Encrypted key-value persistence backed by a platform-managed master key.
pub trait CredentialStore: Send + Sync {
    /// Read a secret, `None` when absent.
    fn get_secret(&self, key: &str) -> Result<Option<String>, KeychainError>;

    /// Create or overwrite a secret.
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError>;

    /// Delete a secret (idempotent).
    fn delete_secret(&self, key: &str) -> Result<(), KeychainError>;

    /// Return the 256-bit key stored under `key_id`, generating and storing a
    /// random one on first use.
    ///
    /// Keys are stored hex-encoded.
    ///
    /// # Errors
    /// Returns `KeychainError::InvalidKey` if a stored key is not 32 bytes of
    /// hex, or any storage error.
    fn symmetric_key(&self, key_id: &str) -> Result<[u8; SYMMETRIC_KEY_LEN], KeychainError> {
        if let Some(encoded) = self.get_secret(key_id)? {
            let bytes = hex::decode(encoded.trim())
                .map_err(|e| KeychainError::InvalidKey(format!("{key_id}: {e}")))?;
            return <[u8; SYMMETRIC_KEY_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
                KeychainError::InvalidKey(format!(
                    "{key_id}: expected {SYMMETRIC_KEY_LEN} bytes, found {}",
                    bytes.len()
                ))
            });
        }

        debug!(key_id = %key_id, "No existing key found, generating new key");
        let mut key = [0u8; SYMMETRIC_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        self.set_secret(key_id, &hex::encode(key))?;
        Ok(key)
    }
}

impl<T: CredentialStore + ?Sized> CredentialStore for std::sync::Arc<T> {
    fn get_secret(&self, key: &str) -> Result<Option<String>, KeychainError> {
        (**self).get_secret(key)
    }

    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        (**self).set_secret(key, value)
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        (**self).delete_secret(key)
    }

    fn symmetric_key(&self, key_id: &str) -> Result<[u8; SYMMETRIC_KEY_LEN], KeychainError> {
        (**self).symmetric_key(key_id)
    }
}
