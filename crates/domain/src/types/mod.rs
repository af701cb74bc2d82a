//! Domain types and models

pub mod backup;

pub use backup::{
    BackupErrorKind, BackupOutcome, BackupPhase, BackupVerdict, RemoteBackupEntry, RestoreReport,
};
