//! # EventTracker Infrastructure
//!
//! Infrastructure implementations of the core backup ports.
//!
//! This crate contains:
//! - The encrypted archive codec and the Dropbox remote store
//! - Dropbox account linking on top of the shared token manager
//! - The SQLite local store
//! - The backup scheduler, config loader, and logging setup
//!
//! ## Architecture
//! - Implements traits defined in `eventtracker-core`
//! - Depends on `eventtracker-common` and `eventtracker-domain`
//! - Contains all "impure" code (I/O, HTTP, keychain, filesystem)

pub mod auth;
pub mod backup;
pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod observability;
pub mod scheduling;

// Re-export commonly used items
pub use auth::{BrowserLauncher, DropboxAuthManager};
pub use backup::{DropboxBackupStore, EncryptedArchiveCodec};
pub use database::SqliteLocalStore;
pub use errors::InfraError;
pub use http::HttpClient;
pub use scheduling::{BackupScheduler, BackupSchedulerConfig};
