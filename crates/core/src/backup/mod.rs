//! Cloud backup and restore of the local store.

pub mod ports;
pub mod service;
pub mod store_handle;

pub use ports::{
    AccountLink, BackupArchiveCodec, LocalStore, RemoteBackupStore, StoreFiles, UrlLauncher,
};
pub use service::BackupOrchestrator;
pub use store_handle::{ExclusiveLease, SharedLease, StoreHandle};
