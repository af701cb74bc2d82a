//! OAuth 2.0 + PKCE account linking
//!
//! Public-client authorization-code flow with refresh tokens, as used by the
//! cloud backup provider. The credential store is the only place tokens
//! live; nothing is cached in memory between calls.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  TokenManager   │  link / redirect / valid token / unlink
//! └────────┬────────┘
//!          │
//!          ├──► OAuthClientTrait   (authorization URL, token endpoint)
//!          ├──► TokenStorage       (token set + pending verifier entries)
//!          │         │
//!          │         └──► CredentialStore  (platform keychain)
//!          │
//!          └──► PKCE utilities     (verifier and S256 challenge)
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use eventtracker_common::auth::{OAuthClient, OAuthConfig, TokenManager};
//! use eventtracker_common::security::KeychainProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OAuthConfig::new(
//!         "app_key",
//!         "eventtracker://oauth2redirect",
//!         "https://www.dropbox.com/oauth2/authorize",
//!         "https://api.dropbox.com/oauth2/token",
//!     )
//!     .with_authorize_param("token_access_type", "offline");
//!
//!     let store = Arc::new(KeychainProvider::new("eventtracker"));
//!     let manager = TokenManager::new(OAuthClient::new(config)?, store, "dropbox");
//!
//!     let url = manager.start_link()?;
//!     println!("Open this URL in your browser: {url}");
//!
//!     // ... the platform delivers the redirect ...
//!     let linked = manager.handle_redirect("eventtracker://oauth2redirect?code=abc").await;
//!     println!("linked: {linked}");
//!
//!     if let Some(token) = manager.get_valid_access_token().await {
//!         println!("token length: {}", token.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - **[`types`]**: `TokenSet`, `TokenResponse`, `OAuthConfig`, `OAuthError`
//! - **[`pkce`]**: verifier and challenge generation
//! - **[`client`]**: HTTP client for the token endpoint
//! - **[`token_manager`]**: link lifecycle and single-flight refresh
//! - **[`traits`]**: seams for the token endpoint and the clock

pub mod client;
mod keychain;
pub mod pkce;
pub mod token_manager;
pub mod traits;
pub mod types;

pub use client::{OAuthClient, OAuthClientError};
pub use keychain::TokenStorage;
pub use pkce::{generate_code_challenge, generate_code_verifier, PkceChallenge};
pub use token_manager::{TokenManager, TokenManagerError, DEFAULT_EXPIRY_MARGIN_MS};
pub use traits::{Clock, OAuthClientTrait, SystemClock};
pub use types::{OAuthConfig, OAuthError, TokenResponse, TokenSet};
