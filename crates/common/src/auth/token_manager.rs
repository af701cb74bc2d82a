//! Token manager with single-flight refresh
//!
//! Manages the OAuth token lifecycle for one provider account:
//! - PKCE authorization start and redirect completion
//! - Access token validation against a safety margin
//! - Refresh through the token endpoint, serialized so concurrent callers
//!   share one network round trip
//! - Unlinking (dropping stored tokens)

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::OAuthClientError;
use super::keychain::TokenStorage;
use super::pkce::PkceChallenge;
use super::traits::{Clock, OAuthClientTrait, SystemClock};
use super::types::TokenSet;
use crate::security::{CredentialStore, KeychainError};

/// Access tokens with less validity left than this are refreshed.
pub const DEFAULT_EXPIRY_MARGIN_MS: i64 = 60_000;

/// Error type for token manager operations
#[derive(Debug)]
pub enum TokenManagerError {
    /// Keychain operation failed
    KeychainError(KeychainError),

    /// OAuth operation failed
    OAuthError(OAuthClientError),

    /// Redirect URI could not be parsed
    InvalidRedirect(String),

    /// Provider reported an authorization error on the redirect
    AuthorizationDenied { error: String, description: Option<String> },

    /// Redirect carried no `code` parameter
    MissingCode,

    /// No authorization attempt is in flight
    NoPendingAuthorization,

    /// Code exchange succeeded without issuing a refresh token
    MissingRefreshToken,

    /// No tokens available (not linked)
    NotAuthenticated,
}

impl std::fmt::Display for TokenManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeychainError(e) => write!(f, "Keychain error: {e}"),
            Self::OAuthError(e) => write!(f, "OAuth error: {e}"),
            Self::InvalidRedirect(msg) => write!(f, "Invalid redirect URI: {msg}"),
            Self::AuthorizationDenied { error, description } => match description {
                Some(desc) => write!(f, "Authorization denied: {error}: {desc}"),
                None => write!(f, "Authorization denied: {error}"),
            },
            Self::MissingCode => write!(f, "Redirect has no authorization code"),
            Self::NoPendingAuthorization => write!(f, "No authorization attempt in progress"),
            Self::MissingRefreshToken => write!(f, "Token response has no refresh token"),
            Self::NotAuthenticated => write!(f, "Not authenticated (no tokens)"),
        }
    }
}

impl std::error::Error for TokenManagerError {}

impl From<OAuthClientError> for TokenManagerError {
    fn from(err: OAuthClientError) -> Self {
        Self::OAuthError(err)
    }
}

impl From<KeychainError> for TokenManagerError {
    fn from(err: KeychainError) -> Self {
        Self::KeychainError(err)
    }
}

type GateKey = (usize, String);

/// Refresh gates keyed by store identity and account. Entries are weak, so a
/// gate lives exactly as long as some manager holds it.
static REFRESH_GATES: Lazy<parking_lot::Mutex<HashMap<GateKey, Weak<Mutex<()>>>>> =
    Lazy::new(|| parking_lot::Mutex::new(HashMap::new()));

/// Gate shared by every manager over the same store allocation and account.
///
/// A live entry implies a live manager, and that manager keeps the store
/// allocation alive, so the address cannot have been reused.
fn refresh_gate_for<S>(store: &Arc<S>, account_name: &str) -> Arc<Mutex<()>> {
    let key = (Arc::as_ptr(store).cast::<()>() as usize, account_name.to_string());
    let mut gates = REFRESH_GATES.lock();
    if let Some(gate) = gates.get(&key).and_then(Weak::upgrade) {
        return gate;
    }
    gates.retain(|_, gate| gate.strong_count() > 0);
    let gate = Arc::new(Mutex::new(()));
    gates.insert(key, Arc::downgrade(&gate));
    gate
}

/// Token manager for one provider account
///
/// The credential store is the only copy of the token set; every read goes
/// through it. Refresh is serialized by a gate shared with every other
/// manager built over the same `Arc` store and account, and a caller re-reads
/// the store after acquiring it, so a burst of callers racing an expiring
/// token costs one refresh request no matter how many managers they hold.
pub struct TokenManager<C: OAuthClientTrait + 'static, S: CredentialStore + 'static> {
    oauth_client: Arc<C>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    account_name: String,
    expiry_margin_ms: i64,
    refresh_gate: Arc<Mutex<()>>,
}

impl<C: OAuthClientTrait + 'static, S: CredentialStore + 'static> TokenManager<C, S> {
    /// Create a new token manager using the system clock and the default
    /// 60 second expiry margin.
    #[must_use]
    pub fn new(oauth_client: C, store: Arc<S>, account_name: impl Into<String>) -> Self {
        Self::with_clock(oauth_client, store, account_name, Arc::new(SystemClock))
    }

    /// Create a token manager with an injected clock.
    #[must_use]
    pub fn with_clock(
        oauth_client: C,
        store: Arc<S>,
        account_name: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let account_name = account_name.into();
        let refresh_gate = refresh_gate_for(&store, &account_name);
        Self {
            oauth_client: Arc::new(oauth_client),
            store,
            clock,
            account_name,
            expiry_margin_ms: DEFAULT_EXPIRY_MARGIN_MS,
            refresh_gate,
        }
    }

    /// Override the refresh margin.
    #[must_use]
    pub fn with_expiry_margin_ms(mut self, margin_ms: i64) -> Self {
        self.expiry_margin_ms = margin_ms;
        self
    }

    /// Account name the tokens are stored under.
    #[must_use]
    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// True iff a non-blank refresh token is stored.
    pub fn is_linked(&self) -> bool {
        match self.store.load_tokens(&self.account_name) {
            Ok(tokens) => tokens.is_some_and(|t| t.is_linked()),
            Err(e) => {
                warn!(account = %self.account_name, error = %e, "token.load.failed");
                false
            }
        }
    }

    /// Start an authorization attempt
    ///
    /// Generates a fresh PKCE pair, persists the verifier (replacing any
    /// unconsumed one), and returns the authorization URL to open.
    ///
    /// # Errors
    /// Returns error if the verifier cannot be persisted.
    pub fn start_link(&self) -> Result<String, TokenManagerError> {
        let challenge = PkceChallenge::generate();
        self.store.store_code_verifier(&self.account_name, &challenge.code_verifier)?;

        info!(account = %self.account_name, "oauth.link.started");
        Ok(self.oauth_client.authorization_url(&challenge))
    }

    /// Complete an authorization attempt from the redirect URI.
    ///
    /// Returns `false` (leaving stored tokens untouched) when the redirect
    /// has no code, no attempt is pending, the exchange fails, or no refresh
    /// token is issued.
    pub async fn handle_redirect(&self, redirect_uri: &str) -> bool {
        match self.complete_link(redirect_uri).await {
            Ok(()) => true,
            Err(e) => {
                warn!(account = %self.account_name, error = %e, "oauth.link.failed");
                false
            }
        }
    }

    /// Fallible form of [`Self::handle_redirect`].
    ///
    /// # Errors
    /// See [`TokenManagerError`] variants.
    pub async fn complete_link(&self, redirect_uri: &str) -> Result<(), TokenManagerError> {
        let url = url::Url::parse(redirect_uri)
            .map_err(|e| TokenManagerError::InvalidRedirect(e.to_string()))?;

        let mut code = None;
        let mut provider_error = None;
        let mut description = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" if !value.is_empty() => code = Some(value.into_owned()),
                "error" => provider_error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = provider_error {
            // The user cancelled or the provider refused: the attempt is over.
            self.store.delete_code_verifier(&self.account_name)?;
            return Err(TokenManagerError::AuthorizationDenied { error, description });
        }

        let code = code.ok_or(TokenManagerError::MissingCode)?;
        let verifier = self
            .store
            .load_code_verifier(&self.account_name)?
            .ok_or(TokenManagerError::NoPendingAuthorization)?;

        let exchanged = self.oauth_client.exchange_code(&code, &verifier).await;

        // A verifier is single use whatever the exchange outcome.
        if let Err(e) = self.store.delete_code_verifier(&self.account_name) {
            warn!(account = %self.account_name, error = %e, "oauth.verifier.delete_failed");
        }

        let response = exchanged?;
        let refresh_token = response
            .non_blank_refresh_token()
            .ok_or(TokenManagerError::MissingRefreshToken)?
            .to_string();

        let tokens = TokenSet::new(
            response.access_token.clone(),
            refresh_token,
            response.expires_in_secs(),
            self.clock.now_millis(),
        );
        self.store.store_tokens(&self.account_name, &tokens)?;

        info!(
            account = %self.account_name,
            expires_at_ms = tokens.expires_at_ms,
            "oauth.link.completed"
        );
        Ok(())
    }

    /// Return an access token valid for at least the expiry margin
    ///
    /// Refreshes when needed. Returns `None` when unlinked or when the
    /// refresh fails; stored state is left untouched in both cases.
    pub async fn get_valid_access_token(&self) -> Option<String> {
        match self.access_token().await {
            Ok(token) => Some(token),
            Err(TokenManagerError::NotAuthenticated) => {
                debug!(account = %self.account_name, "token.unavailable.unlinked");
                None
            }
            Err(e) => {
                warn!(account = %self.account_name, error = %e, "token.refresh.failed");
                None
            }
        }
    }

    /// Fallible form of [`Self::get_valid_access_token`].
    ///
    /// # Errors
    /// `NotAuthenticated` when no refresh token is stored, otherwise the
    /// keychain or token endpoint failure.
    pub async fn access_token(&self) -> Result<String, TokenManagerError> {
        if let Some(tokens) = self.load_tokens()? {
            if tokens.is_access_token_fresh(self.clock.now_millis(), self.expiry_margin_ms) {
                return Ok(tokens.access_token);
            }
        }

        let _gate = self.refresh_gate.lock().await;

        // Another caller may have refreshed while we waited on the gate.
        let current = self.load_tokens()?.ok_or(TokenManagerError::NotAuthenticated)?;
        if current.is_access_token_fresh(self.clock.now_millis(), self.expiry_margin_ms) {
            debug!(account = %self.account_name, "token.refresh.shared");
            return Ok(current.access_token);
        }
        if !current.is_linked() {
            return Err(TokenManagerError::NotAuthenticated);
        }

        let refreshed = self.refresh(&current).await?;
        Ok(refreshed.access_token)
    }

    /// Drop stored tokens and any pending verifier.
    ///
    /// # Errors
    /// Returns error if the credential store cannot be updated.
    pub fn unlink(&self) -> Result<(), TokenManagerError> {
        self.store.delete_code_verifier(&self.account_name)?;
        self.store.delete_tokens(&self.account_name)?;
        info!(account = %self.account_name, "oauth.unlinked");
        Ok(())
    }

    fn load_tokens(&self) -> Result<Option<TokenSet>, TokenManagerError> {
        Ok(self.store.load_tokens(&self.account_name)?)
    }

    async fn refresh(&self, current: &TokenSet) -> Result<TokenSet, TokenManagerError> {
        debug!(account = %self.account_name, "token.refresh.started");
        let response = self.oauth_client.refresh_access_token(&current.refresh_token).await?;

        // Providers rarely rotate the refresh token; keep ours unless a new one arrives.
        let refresh_token = response
            .non_blank_refresh_token()
            .map_or_else(|| current.refresh_token.clone(), str::to_string);

        let tokens = TokenSet::new(
            response.access_token.clone(),
            refresh_token,
            response.expires_in_secs(),
            self.clock.now_millis(),
        );
        self.store.store_tokens(&self.account_name, &tokens)?;

        info!(
            account = %self.account_name,
            expires_at_ms = tokens.expires_at_ms,
            "token.refresh.completed"
        );
        Ok(tokens)
    }
}
