//! OAuth 2.0 client implementation with PKCE support
//!
//! Stateless HTTP side of the authorization-code flow:
//! - Browser authorization URL building
//! - Authorization code exchange
//! - Token refresh
//!
//! The PKCE verifier is owned by the caller (it lives in the credential store
//! between the two legs of the flow), so this client holds no per-attempt
//! state. Token endpoint calls are never retried here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::pkce::PkceChallenge;
use super::traits::OAuthClientTrait;
use super::types::{OAuthConfig, OAuthError, TokenResponse};

/// Default bound on a token endpoint round trip.
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for OAuth client operations
#[derive(Debug)]
pub enum OAuthClientError {
    /// HTTP request failed (connect, timeout, body read)
    RequestFailed(reqwest::Error),

    /// OAuth server returned a structured error
    OAuthError { status: u16, error: OAuthError },

    /// Non-success status without a parseable OAuth error body
    HttpStatus { status: u16, body: String },

    /// Failed to parse response
    ParseError(String),

    /// No refresh token available
    NoRefreshToken,

    /// Invalid configuration
    ConfigError(String),
}

impl OAuthClientError {
    /// HTTP status reported by the token endpoint, if one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::OAuthError { status, .. } | Self::HttpStatus { status, .. } => Some(*status),
            Self::RequestFailed(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl std::fmt::Display for OAuthClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestFailed(e) => write!(f, "HTTP request failed: {e}"),
            Self::OAuthError { status, error } => write!(f, "OAuth error ({status}): {error}"),
            Self::HttpStatus { status, body } => {
                write!(f, "Token endpoint returned HTTP {status}: {body}")
            }
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
            Self::NoRefreshToken => write!(f, "No refresh token available"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for OAuthClientError {}

impl From<reqwest::Error> for OAuthClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed(err)
    }
}

/// OAuth 2.0 public client with PKCE support
///
/// Implements RFC 6749 (OAuth 2.0) and RFC 7636 (PKCE) for providers that
/// accept form-encoded token requests, such as Dropbox.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthConfig,
    client: Client,
}

impl OAuthClient {
    /// Create a new OAuth client with the given configuration
    ///
    /// # Errors
    /// Returns `ConfigError` if the underlying HTTP client cannot be built.
    ///
    /// # Examples
    /// ```
    /// use eventtracker_common::auth::{OAuthClient, OAuthConfig};
    ///
    /// let config = OAuthConfig::new(
    ///     "app_key",
    ///     "eventtracker://oauth2redirect",
    ///     "https://www.dropbox.com/oauth2/authorize",
    ///     "https://api.dropbox.com/oauth2/token",
    /// );
    /// let client = OAuthClient::new(config).unwrap();
    /// ```
    pub fn new(config: OAuthConfig) -> Result<Self, OAuthClientError> {
        Self::with_timeout(config, DEFAULT_TOKEN_TIMEOUT)
    }

    /// Create a client whose token requests give up after `timeout`.
    ///
    /// # Errors
    /// Returns `ConfigError` if the underlying HTTP client cannot be built.
    pub fn with_timeout(config: OAuthConfig, timeout: Duration) -> Result<Self, OAuthClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| OAuthClientError::ConfigError(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Build the browser authorization URL for a PKCE challenge.
    #[must_use]
    pub fn build_authorization_url(&self, challenge: &PkceChallenge) -> String {
        let mut params = vec![
            ("client_id".to_string(), self.config.client_id.clone()),
            ("response_type".to_string(), "code".to_string()),
        ];
        params.extend(self.config.extra_authorize_params.iter().cloned());
        params.extend([
            ("code_challenge_method".to_string(), challenge.challenge_method().to_string()),
            ("code_challenge".to_string(), challenge.code_challenge.clone()),
            ("redirect_uri".to_string(), self.config.redirect_uri.clone()),
        ]);

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.config.authorization_endpoint, query_string)
    }

    /// Exchange an authorization code for tokens
    ///
    /// # Errors
    /// Returns error if the request fails, the server rejects the code, or
    /// the response cannot be parsed.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, OAuthClientError> {
        let params = [
            ("code", code),
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
        ];
        self.post_token_form(&params).await
    }

    /// Refresh access token using refresh token
    ///
    /// # Errors
    /// Returns error if:
    /// - No refresh token provided
    /// - Refresh fails
    /// - Token is invalid/revoked
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, OAuthClientError> {
        if refresh_token.trim().is_empty() {
            return Err(OAuthClientError::NoRefreshToken);
        }

        let params = [
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
        ];
        self.post_token_form(&params).await
    }

    /// Get a reference to the OAuth configuration
    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    async fn post_token_form(
        &self,
        params: &[(&str, &str)],
    ) -> Result<TokenResponse, OAuthClientError> {
        let response = self.client.post(&self.config.token_endpoint).form(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<OAuthError>(&body) {
                Ok(error) => OAuthClientError::OAuthError { status: status.as_u16(), error },
                Err(_) => OAuthClientError::HttpStatus { status: status.as_u16(), body },
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| OAuthClientError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl OAuthClientTrait for OAuthClient {
    fn authorization_url(&self, challenge: &PkceChallenge) -> String {
        self.build_authorization_url(challenge)
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, OAuthClientError> {
        Self::exchange_code(self, code, code_verifier).await
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, OAuthClientError> {
        Self::refresh_access_token(self, refresh_token).await
    }
}
