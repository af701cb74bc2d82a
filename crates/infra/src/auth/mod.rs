//! Account linking for the backup provider.

pub mod browser;
pub mod dropbox_oauth;

pub use browser::BrowserLauncher;
pub use dropbox_oauth::{DropboxAuthManager, DROPBOX_ACCOUNT};
