//! Application constants
//!
//! Centralized location for the domain-level constants of the backup
//! subsystem.

// Archive naming
pub const APP_ID: &str = "eventtracker";
pub const BACKUP_EXTENSION: &str = "etbak";

// Local store files
pub const STORE_FILE_NAME: &str = "eventtracker.db";
pub const WAL_SUFFIX: &str = "-wal";
pub const SHM_SUFFIX: &str = "-shm";

// Remote layout and retention
pub const REMOTE_BACKUP_DIR: &str = "/backups";
pub const DEFAULT_RETENTION_COUNT: usize = 30;
pub const NO_BACKUPS_FOUND: &str = "No backups found";

// OAuth
pub const TOKEN_EXPIRY_SAFETY_MARGIN_MS: i64 = 60_000;
pub const PLACEHOLDER_APP_KEY: &str = "PUT_YOUR_DROPBOX_APP_KEY_HERE";
pub const DEFAULT_REDIRECT_URI: &str = "eventtracker://oauth2redirect";

// Scheduling
pub const PERIODIC_BACKUP_INTERVAL_SECS: u64 = 24 * 60 * 60;
pub const BACKUP_RETRY_INITIAL_SECS: u64 = 30;
pub const BACKUP_RETRY_MAX_ATTEMPTS: u32 = 5;

// HTTP
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

// Credential store
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "eventtracker";
pub const ARCHIVE_KEY_ID: &str = "backup_archive_key";
