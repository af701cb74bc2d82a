//! Configuration management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_KEYCHAIN_SERVICE, DEFAULT_REDIRECT_URI,
    DEFAULT_RETENTION_COUNT, PERIODIC_BACKUP_INTERVAL_SECS, PLACEHOLDER_APP_KEY,
    REMOTE_BACKUP_DIR, STORE_FILE_NAME,
};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Cloud provider (Dropbox) configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub app_key: String,
    pub redirect_uri: String,
    pub authorize_endpoint: String,
    pub token_endpoint: String,
    pub api_endpoint: String,
    pub content_endpoint: String,
    pub http_timeout_secs: u64,
}

impl ProviderConfig {
    /// True when an app key has been filled in.
    pub fn is_configured(&self) -> bool {
        let key = self.app_key.trim();
        !key.is_empty() && key != PLACEHOLDER_APP_KEY
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            app_key: PLACEHOLDER_APP_KEY.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            authorize_endpoint: "https://www.dropbox.com/oauth2/authorize".to_string(),
            token_endpoint: "https://api.dropbox.com/oauth2/token".to_string(),
            api_endpoint: "https://api.dropboxapi.com".to_string(),
            content_endpoint: "https://content.dropboxapi.com".to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

/// Backup policy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub remote_dir: String,
    pub retention_count: usize,
    pub scratch_dir: PathBuf,
    pub daily_enabled: bool,
    pub periodic_interval_secs: u64,
    pub keychain_service: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            remote_dir: REMOTE_BACKUP_DIR.to_string(),
            retention_count: DEFAULT_RETENTION_COUNT,
            scratch_dir: std::env::temp_dir().join("eventtracker-backups"),
            daily_enabled: false,
            periodic_interval_secs: PERIODIC_BACKUP_INTERVAL_SECS,
            keychain_service: DEFAULT_KEYCHAIN_SERVICE.to_string(),
        }
    }
}

/// Local store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: PathBuf::from(STORE_FILE_NAME) }
    }
}
