//! Traits for OAuth operations
//!
//! These traits enable dependency injection and testing by abstracting the
//! provider's token endpoint and the wall clock used for expiry checks.

use async_trait::async_trait;

use super::client::OAuthClientError;
use super::pkce::PkceChallenge;
use super::types::TokenResponse;

/// Trait for OAuth client operations
#[async_trait]
pub trait OAuthClientTrait: Send + Sync {
    /// Build the browser authorization URL for `challenge`.
    fn authorization_url(&self, challenge: &PkceChallenge) -> String;

    /// Exchange an authorization code and its PKCE verifier for tokens.
    ///
    /// # Errors
    /// Returns error if the request fails or the provider rejects the code.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, OAuthClientError>;

    /// Mint a new access token from a refresh token.
    ///
    /// # Errors
    /// Returns error if refresh fails or token is invalid/revoked
    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, OAuthClientError>;
}

/// Wall clock in epoch milliseconds
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds since UNIX epoch.
    fn now_millis(&self) -> i64;
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
