//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Loads a `.env` file into the process environment when one exists
//! 2. If `EVENTTRACKER_DROPBOX_APP_KEY` is set, builds the config from
//!    environment variables over the defaults
//! 3. Otherwise probes standard locations for a JSON or TOML config file
//! 4. With neither, returns the defaults (cloud backup unconfigured)
//!
//! ## Environment Variables
//! - `EVENTTRACKER_DROPBOX_APP_KEY`: Dropbox app key (required for env loading)
//! - `EVENTTRACKER_DB_PATH`: Local store file path
//! - `EVENTTRACKER_SCRATCH_DIR`: Directory for temporary archives
//! - `EVENTTRACKER_BACKUP_RETENTION`: Number of remote backups to keep
//! - `EVENTTRACKER_DAILY_BACKUP`: Whether the daily backup is enabled
//! - `EVENTTRACKER_HTTP_TIMEOUT_SECS`: Provider request timeout in seconds
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.{json,toml}` and `./eventtracker.{json,toml}`
//! 2. `../config.{json,toml}` and `../../config.{json,toml}`
//! 3. The same names relative to the executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use eventtracker_domain::{Config, EventTrackerError, Result};

pub const ENV_APP_KEY: &str = "EVENTTRACKER_DROPBOX_APP_KEY";
pub const ENV_DB_PATH: &str = "EVENTTRACKER_DB_PATH";
pub const ENV_SCRATCH_DIR: &str = "EVENTTRACKER_SCRATCH_DIR";
pub const ENV_BACKUP_RETENTION: &str = "EVENTTRACKER_BACKUP_RETENTION";
pub const ENV_DAILY_BACKUP: &str = "EVENTTRACKER_DAILY_BACKUP";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "EVENTTRACKER_HTTP_TIMEOUT_SECS";

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `EventTrackerError::Config` if an environment value or a config
/// file that was found is invalid.
pub fn load() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    if std::env::var(ENV_APP_KEY).is_ok() {
        let config = load_from_env()?;
        tracing::info!("Configuration loaded from environment variables");
        return Ok(config);
    }

    match probe_config_paths() {
        Some(path) => load_from_file(Some(path)),
        None => {
            tracing::warn!("No configuration found, cloud backup stays unconfigured");
            Ok(Config::default())
        }
    }
}

/// Load configuration from environment variables
///
/// The app key is required; every other variable overrides its default
/// only when set.
///
/// # Errors
/// Returns `EventTrackerError::Config` if the app key is missing or a value
/// cannot be parsed.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();
    config.provider.app_key = env_var(ENV_APP_KEY)?;

    if let Ok(path) = std::env::var(ENV_DB_PATH) {
        config.store.path = PathBuf::from(path);
    }
    if let Ok(dir) = std::env::var(ENV_SCRATCH_DIR) {
        config.backup.scratch_dir = PathBuf::from(dir);
    }
    if let Some(retention) = env_parse::<usize>(ENV_BACKUP_RETENTION, "backup retention")? {
        config.backup.retention_count = retention;
    }
    if let Some(timeout) = env_parse::<u64>(ENV_HTTP_TIMEOUT_SECS, "HTTP timeout")? {
        config.provider.http_timeout_secs = timeout;
    }
    config.backup.daily_enabled = env_bool(ENV_DAILY_BACKUP, config.backup.daily_enabled);

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `EventTrackerError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(EventTrackerError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            EventTrackerError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| EventTrackerError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content, by file extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| EventTrackerError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| EventTrackerError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(EventTrackerError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 8] = [
        "config.json",
        "config.toml",
        "eventtracker.json",
        "eventtracker.toml",
        "../config.json",
        "../config.toml",
        "../../config.json",
        "../../config.toml",
    ];

    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    let exe_dir = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf));
    if let Some(exe_dir) = exe_dir {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        EventTrackerError::Config(format!("Missing required environment variable: {}", key))
    })
}

fn env_parse<T>(key: &str, label: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| EventTrackerError::Config(format!("Invalid {label}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
