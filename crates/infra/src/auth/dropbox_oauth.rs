//! Dropbox account linking on top of the shared PKCE token manager.
//!
//! Dropbox issues short-lived access tokens; `token_access_type=offline` asks
//! for a refresh token as well, which is what "linked" means here. Tokens and
//! the pending verifier live in the credential store under [`DROPBOX_ACCOUNT`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eventtracker_common::auth::{
    Clock, OAuthClient, OAuthConfig, SystemClock, TokenManager, TokenManagerError,
};
use eventtracker_common::security::CredentialStore;
use eventtracker_core::backup::ports::{AccountLink, UrlLauncher};
use eventtracker_domain::constants::TOKEN_EXPIRY_SAFETY_MARGIN_MS;
use eventtracker_domain::{EventTrackerError, ProviderConfig, Result};
use tracing::{info, warn};

use crate::errors::InfraError;

/// Credential store account the Dropbox tokens are kept under.
pub const DROPBOX_ACCOUNT: &str = "dropbox";

pub struct DropboxAuthManager<S: CredentialStore + 'static> {
    configured: bool,
    tokens: TokenManager<OAuthClient, S>,
    launcher: Arc<dyn UrlLauncher>,
}

impl<S: CredentialStore + 'static> DropboxAuthManager<S> {
    pub fn new(
        config: &ProviderConfig,
        store: Arc<S>,
        launcher: Arc<dyn UrlLauncher>,
    ) -> Result<Self> {
        Self::with_clock(config, store, launcher, Arc::new(SystemClock))
    }

    /// Build with an injected clock, used to drive expiry in tests.
    pub fn with_clock(
        config: &ProviderConfig,
        store: Arc<S>,
        launcher: Arc<dyn UrlLauncher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let oauth_config = OAuthConfig::new(
            config.app_key.trim(),
            &config.redirect_uri,
            &config.authorize_endpoint,
            &config.token_endpoint,
        )
        .with_authorize_param("token_access_type", "offline");
        let client = OAuthClient::with_timeout(
            oauth_config,
            Duration::from_secs(config.http_timeout_secs.max(1)),
        )
        .map_err(|e| EventTrackerError::Config(e.to_string()))?;

        let tokens = TokenManager::with_clock(client, store, DROPBOX_ACCOUNT, clock)
            .with_expiry_margin_ms(TOKEN_EXPIRY_SAFETY_MARGIN_MS);

        Ok(Self { configured: config.is_configured(), tokens, launcher })
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn is_linked(&self) -> bool {
        self.tokens.is_linked()
    }

    /// Begin linking: persist a fresh verifier and open the authorization
    /// page. Returns the URL that was opened.
    pub fn start_link(&self) -> Result<String> {
        if !self.configured {
            return Err(EventTrackerError::Config("Dropbox app key is not configured".into()));
        }
        let url = self.tokens.start_link().map_err(to_domain)?;
        self.launcher.open_url(&url)?;
        Ok(url)
    }

    /// Finish linking from the redirect URI. `false` leaves the previous
    /// link state untouched.
    pub async fn handle_redirect(&self, redirect_uri: &str) -> bool {
        let linked = self.tokens.handle_redirect(redirect_uri).await;
        if linked {
            info!("dropbox.linked");
        }
        linked
    }

    pub async fn get_valid_access_token(&self) -> Option<String> {
        self.tokens.get_valid_access_token().await
    }

    pub fn unlink(&self) -> Result<()> {
        self.tokens.unlink().map_err(to_domain)?;
        info!("dropbox.unlinked");
        Ok(())
    }
}

#[async_trait]
impl<S: CredentialStore + 'static> AccountLink for DropboxAuthManager<S> {
    fn is_configured(&self) -> bool {
        DropboxAuthManager::is_configured(self)
    }

    fn is_linked(&self) -> bool {
        DropboxAuthManager::is_linked(self)
    }

    async fn valid_access_token(&self) -> Option<String> {
        if !self.configured {
            warn!("dropbox.token.not_configured");
            return None;
        }
        self.get_valid_access_token().await
    }
}

fn to_domain(err: TokenManagerError) -> EventTrackerError {
    InfraError::from(err).into()
}
