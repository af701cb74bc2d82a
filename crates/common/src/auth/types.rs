//! OAuth 2.0 types and structures
//!
//! Token set persisted in the credential store, the raw token endpoint
//! response, and provider configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// OAuth 2.0 access and refresh tokens with an absolute expiry
///
/// Stored as a single credential-store entry and replaced wholesale, so a
/// reader never sees an access token paired with another generation's
/// expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Bearer token for API calls
    pub access_token: String,

    /// Long-lived token used to mint new access tokens
    pub refresh_token: String,

    /// Absolute expiry of `access_token`, epoch milliseconds (UTC)
    pub expires_at_ms: i64,
}

impl TokenSet {
    /// Build a token set from a lifetime reported by the provider.
    #[must_use]
    pub fn new(
        access_token: String,
        refresh_token: String,
        expires_in_secs: i64,
        now_ms: i64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at_ms: now_ms.saturating_add(expires_in_secs.saturating_mul(1000)),
        }
    }

    /// A non-blank refresh token means the account is linked.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        !self.refresh_token.trim().is_empty()
    }

    /// Whether the access token can be used for at least `margin_ms` more.
    #[must_use]
    pub fn is_access_token_fresh(&self, now_ms: i64, margin_ms: i64) -> bool {
        !self.access_token.trim().is_empty()
            && self.expires_at_ms > now_ms.saturating_add(margin_ms)
    }

    /// Milliseconds left before the access token expires (negative once
    /// expired).
    #[must_use]
    pub fn millis_until_expiry(&self, now_ms: i64) -> i64 {
        self.expires_at_ms - now_ms
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at_ms", &self.expires_at_ms)
            .finish()
    }
}

/// OAuth token response from authorization server
///
/// Standard OAuth 2.0 token response format (RFC 6749). Refresh responses
/// usually omit `refresh_token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    /// Refresh token if the provider returned a non-blank one.
    #[must_use]
    pub fn non_blank_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|token| !token.trim().is_empty())
    }

    /// Lifetime in seconds; providers that omit it are treated as expiring
    /// immediately.
    #[must_use]
    pub fn expires_in_secs(&self) -> i64 {
        self.expires_in.unwrap_or(0)
    }
}

/// OAuth configuration for a public (secret-less) client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    /// OAuth client ID (Dropbox app key)
    pub client_id: String,

    /// Redirect URI registered with the provider
    pub redirect_uri: String,

    /// Authorization endpoint opened in the browser
    pub authorization_endpoint: String,

    /// Token endpoint for code and refresh exchanges
    pub token_endpoint: String,

    /// Provider-specific query parameters appended to the authorization URL
    pub extra_authorize_params: Vec<(String, String)>,
}

impl OAuthConfig {
    /// Create a new OAuth configuration
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        authorization_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            authorization_endpoint: authorization_endpoint.into(),
            token_endpoint: token_endpoint.into(),
            extra_authorize_params: Vec::new(),
        }
    }

    /// Append a provider-specific authorization parameter.
    #[must_use]
    pub fn with_authorize_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.extra_authorize_params.push((key.into(), value.into()));
        self
    }
}

/// OAuth error response from authorization server (RFC 6749 §5.2)
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthError {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuthError {}
