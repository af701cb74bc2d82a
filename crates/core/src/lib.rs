//! # EventTracker Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for the local store, the archive
//!   codec, the remote backup provider, and account linking
//! - The backup orchestrator and the store handle it leases from
//!
//! ## Architecture Principles
//! - Only depends on `eventtracker-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod backup;

pub use backup::ports::{
    AccountLink, BackupArchiveCodec, LocalStore, RemoteBackupStore, StoreFiles, UrlLauncher,
};
pub use backup::{BackupOrchestrator, StoreHandle};
