//! System browser launcher.

use eventtracker_core::backup::ports::UrlLauncher;
use eventtracker_domain::{EventTrackerError, Result};
use tracing::debug;

/// Opens authorization URLs with the platform's default handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserLauncher;

impl UrlLauncher for BrowserLauncher {
    fn open_url(&self, url: &str) -> Result<()> {
        debug!("browser.open");
        open::that(url)
            .map_err(|e| EventTrackerError::Internal(format!("failed to open browser: {e}")))
    }
}
