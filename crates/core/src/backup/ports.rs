//! Port interfaces for cloud backup
//!
//! These traits define the boundaries between the backup business logic
//! and the infrastructure that talks to the local store, the archive
//! format, the remote provider, and the platform.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use eventtracker_domain::constants::{SHM_SUFFIX, WAL_SUFFIX};
use eventtracker_domain::{BackupOutcome, Result};

/// On-disk files that make up the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFiles {
    /// Main database file
    pub primary: PathBuf,
    /// Write-ahead log and shared-memory index; either may be absent on disk
    pub side_files: Vec<PathBuf>,
}

impl StoreFiles {
    /// Files of a SQLite store in WAL mode: `<primary>`, `<primary>-wal`,
    /// `<primary>-shm`.
    pub fn sqlite(primary: impl Into<PathBuf>) -> Self {
        let primary = primary.into();
        let side_files = [WAL_SUFFIX, SHM_SUFFIX]
            .iter()
            .map(|suffix| {
                let mut name = primary.as_os_str().to_owned();
                name.push(suffix);
                PathBuf::from(name)
            })
            .collect();
        Self { primary, side_files }
    }

    /// Primary file followed by the side files.
    pub fn all(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.primary.as_path()).chain(self.side_files.iter().map(PathBuf::as_path))
    }
}

/// The live local database whose files are backed up.
///
/// `close` and `reopen` take `&mut self`; callers reach them through the
/// exclusive lease of a [`StoreHandle`](super::StoreHandle).
pub trait LocalStore: Send + Sync {
    fn primary_file_path(&self) -> PathBuf;

    fn side_file_paths(&self) -> Vec<PathBuf>;

    /// Flush pending writes into the files so a shared-lease reader sees a
    /// consistent snapshot.
    fn checkpoint(&self) -> Result<()> {
        Ok(())
    }

    /// Release every handle on the store files.
    fn close(&mut self) -> Result<()>;

    /// Open the store files again after `close`.
    fn reopen(&mut self) -> Result<()>;

    fn files(&self) -> StoreFiles {
        StoreFiles { primary: self.primary_file_path(), side_files: self.side_file_paths() }
    }
}

/// Encrypted archive of the store files.
#[async_trait]
pub trait BackupArchiveCodec: Send + Sync {
    /// Pack and encrypt the store files into a new archive in the scratch
    /// directory. Missing side files are skipped; the live files are only
    /// read.
    async fn create_encrypted_backup(&self, files: &StoreFiles) -> Result<PathBuf>;

    /// Decrypt `archive` and replace the store files with its members.
    ///
    /// The store must be closed for the duration of the call.
    async fn restore_from_encrypted_backup(&self, archive: &Path, files: &StoreFiles)
        -> Result<()>;
}

/// Remote storage for archives.
///
/// Operations never fail with `Err`; every failure is classified inside the
/// returned [`BackupOutcome`].
#[async_trait]
pub trait RemoteBackupStore: Send + Sync {
    /// Upload `file` and prune the remote directory down to the
    /// `retention_count` most recent archives (`0` disables pruning).
    async fn upload_backup(&self, file: &Path, retention_count: usize) -> BackupOutcome;

    /// Download the most recent archive into the scratch directory.
    async fn download_latest_backup(&self) -> BackupOutcome;
}

/// Link state of the backup provider account.
#[async_trait]
pub trait AccountLink: Send + Sync {
    /// The application carries real provider credentials.
    fn is_configured(&self) -> bool;

    /// A refresh token is stored.
    fn is_linked(&self) -> bool;

    /// Bearer token valid for at least the safety margin, refreshing if
    /// needed. `None` when unlinked or when refresh fails.
    async fn valid_access_token(&self) -> Option<String>;
}

/// Opens URLs in the user's browser.
pub trait UrlLauncher: Send + Sync {
    fn open_url(&self, url: &str) -> Result<()>;
}
