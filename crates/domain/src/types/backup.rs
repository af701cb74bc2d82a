//! Backup and restore result types.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::NO_BACKUPS_FOUND;

/// Failure taxonomy shared by the remote store and the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupErrorKind {
    /// Connectivity failure or timeout
    Network,
    /// Token invalid, expired, revoked, or the app is not configured
    Auth,
    /// Local I/O, missing backup, or decode failure
    File,
    /// Anything uncategorized
    Unknown,
}

impl fmt::Display for BackupErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Network => "network",
            Self::Auth => "auth",
            Self::File => "file",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Terminal result of a remote backup operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackupOutcome {
    Success { file: Option<PathBuf> },
    Error { message: String, kind: BackupErrorKind },
}

impl BackupOutcome {
    pub fn success() -> Self {
        Self::Success { file: None }
    }

    pub fn with_file(file: PathBuf) -> Self {
        Self::Success { file: Some(file) }
    }

    pub fn error(kind: BackupErrorKind, message: impl Into<String>) -> Self {
        Self::Error { message: message.into(), kind }
    }

    /// The remote directory is missing or holds no archives.
    pub fn no_backups_found() -> Self {
        Self::error(BackupErrorKind::File, NO_BACKUPS_FOUND)
    }

    pub fn is_no_backups_found(&self) -> bool {
        matches!(
            self,
            Self::Error { kind: BackupErrorKind::File, message } if message == NO_BACKUPS_FOUND
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Error kind, if this outcome is a failure.
    pub fn error_kind(&self) -> Option<BackupErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Error { kind, .. } => Some(*kind),
        }
    }
}

/// A backup file as listed by the remote provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBackupEntry {
    pub name: String,
    pub path: String,
    pub server_modified: DateTime<Utc>,
}

/// Scheduler-facing verdict for a backup cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupVerdict {
    Success,
    /// Transient failure; the scheduler may try again with backoff
    Retry,
    /// Permanent failure; requires user action (relink, configure)
    Failure,
}

impl BackupVerdict {
    /// Map an error kind to the retry policy.
    pub fn for_error(kind: BackupErrorKind) -> Self {
        match kind {
            BackupErrorKind::Auth => Self::Failure,
            BackupErrorKind::Network | BackupErrorKind::File | BackupErrorKind::Unknown => {
                Self::Retry
            }
        }
    }
}

/// Outcome of a restore cycle as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RestoreReport {
    /// Store files were replaced from the named archive
    Restored { archive: String },
    /// Fetching the archive failed, including an empty remote directory;
    /// the local store was not touched
    DownloadFailed { message: String, kind: BackupErrorKind },
    /// Decoding or writing the archive failed after the store was closed
    RestoreFailed { message: String },
}

impl RestoreReport {
    /// The download found nothing to restore.
    pub fn is_no_backups_found(&self) -> bool {
        matches!(
            self,
            Self::DownloadFailed { kind: BackupErrorKind::File, message }
                if message == NO_BACKUPS_FOUND
        )
    }
}

/// Phases of a single backup or restore operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupPhase {
    Idle,
    AuthCheck,
    Encoding,
    Uploading,
    Downloading,
    Decoding,
    Completed,
    Failed,
}

impl BackupPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AuthCheck => "auth_check",
            Self::Encoding => "encoding",
            Self::Uploading => "uploading",
            Self::Downloading => "downloading",
            Self::Decoding => "decoding",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}
