//! Mock implementations of common traits
//!
//! Provides mock objects for testing purposes.

// Allow missing error/panic docs for test mocks - they are designed to be simple
// and errors are clearly indicated by their return types
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::auth::{OAuthClientError, OAuthClientTrait, PkceChallenge, TokenResponse};
use crate::security::{CredentialStore, KeychainError};

type StorageData = Arc<Mutex<HashMap<String, String>>>;

/// In-memory credential store.
///
/// Clones share the same storage, so a test can hand one clone to the code
/// under test and inspect the other.
///
/// # Examples
///
/// ```ignore
/// use eventtracker_common::security::CredentialStore;
/// use eventtracker_common::testing::MockKeychainProvider;
///
/// let store = MockKeychainProvider::new("test");
/// store.set_secret("key", "value").unwrap();
/// assert_eq!(store.get_secret("key").unwrap().as_deref(), Some("value"));
/// ```
#[derive(Debug, Clone)]
pub struct MockKeychainProvider {
    storage: StorageData,
    service_name: String,
    fail_writes: Arc<Mutex<bool>>,
}

impl MockKeychainProvider {
    /// Create a new mock keychain provider with a service name for namespacing.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            storage: Arc::new(Mutex::new(HashMap::new())),
            service_name: service_name.into(),
            fail_writes: Arc::new(Mutex::new(false)),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Make every subsequent write fail with `AccessFailed`.
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    /// Determine whether a secret exists.
    #[must_use]
    pub fn secret_exists(&self, key: &str) -> bool {
        self.storage.lock().unwrap().contains_key(key)
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all stored values.
    pub fn clear(&self) {
        self.storage.lock().unwrap().clear();
    }
}

impl Default for MockKeychainProvider {
    fn default() -> Self {
        Self::new("eventtracker-test")
    }
}

impl CredentialStore for MockKeychainProvider {
    fn get_secret(&self, key: &str) -> Result<Option<String>, KeychainError> {
        Ok(self.storage.lock().unwrap().get(key).cloned())
    }

    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(KeychainError::AccessFailed(format!("write to '{key}' rejected")));
        }
        self.storage.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        self.storage.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Canned token endpoint reply.
#[derive(Debug, Clone)]
enum ScriptedReply {
    Tokens { access: String, refresh: Option<String>, expires_in: i64 },
    Status(u16),
}

impl ScriptedReply {
    fn tokens(access: &str, refresh: Option<&str>, expires_in: i64) -> Self {
        Self::Tokens {
            access: access.to_string(),
            refresh: refresh.map(str::to_string),
            expires_in,
        }
    }

    fn into_result(self) -> Result<TokenResponse, OAuthClientError> {
        match self {
            Self::Tokens { access, refresh, expires_in } => Ok(TokenResponse {
                access_token: access,
                refresh_token: refresh,
                token_type: Some("bearer".to_string()),
                expires_in: Some(expires_in),
            }),
            Self::Status(status) => Err(OAuthClientError::HttpStatus {
                status,
                body: format!("scripted status {status}"),
            }),
        }
    }
}

/// Mock OAuth client that simulates the token endpoint without network calls.
///
/// Builder methods script the replies; clones share call counters.
#[derive(Debug, Clone)]
pub struct MockOAuthClient {
    exchange_reply: ScriptedReply,
    refresh_reply: ScriptedReply,
    refresh_delay: Option<Duration>,
    exchange_calls: Arc<AtomicUsize>,
    refresh_calls: Arc<AtomicUsize>,
}

impl MockOAuthClient {
    /// Create a client whose exchanges and refreshes succeed.
    pub fn new() -> Self {
        Self {
            exchange_reply: ScriptedReply::tokens(
                "mock_access_token",
                Some("mock_refresh_token"),
                14_400,
            ),
            refresh_reply: ScriptedReply::tokens("refreshed_access_token", None, 14_400),
            refresh_delay: None,
            exchange_calls: Arc::new(AtomicUsize::new(0)),
            refresh_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn with_exchange_response(
        mut self,
        access: &str,
        refresh: Option<&str>,
        expires_in: i64,
    ) -> Self {
        self.exchange_reply = ScriptedReply::tokens(access, refresh, expires_in);
        self
    }

    #[must_use]
    pub fn with_exchange_status(mut self, status: u16) -> Self {
        self.exchange_reply = ScriptedReply::Status(status);
        self
    }

    #[must_use]
    pub fn with_refresh_response(
        mut self,
        access: &str,
        refresh: Option<&str>,
        expires_in: i64,
    ) -> Self {
        self.refresh_reply = ScriptedReply::tokens(access, refresh, expires_in);
        self
    }

    #[must_use]
    pub fn with_refresh_status(mut self, status: u16) -> Self {
        self.refresh_reply = ScriptedReply::Status(status);
        self
    }

    /// Hold every refresh for `delay` before replying.
    #[must_use]
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockOAuthClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OAuthClientTrait for MockOAuthClient {
    fn authorization_url(&self, challenge: &PkceChallenge) -> String {
        format!(
            "https://mock.dropbox.test/oauth2/authorize?client_id=test\
             &code_challenge_method={}&code_challenge={}",
            challenge.challenge_method(),
            challenge.code_challenge
        )
    }

    async fn exchange_code(
        &self,
        _code: &str,
        _code_verifier: &str,
    ) -> Result<TokenResponse, OAuthClientError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.exchange_reply.clone().into_result()
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, OAuthClientError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if refresh_token.trim().is_empty() {
            return Err(OAuthClientError::NoRefreshToken);
        }
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        self.refresh_reply.clone().into_result()
    }
}
