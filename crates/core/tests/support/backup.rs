//! Mock implementations of the backup ports
//!
//! Every mock appends to a shared [`EventLog`] so tests can assert the order
//! in which the orchestrator touched the store, the codec, and the remote.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use eventtracker_core::backup::ports::{
    AccountLink, BackupArchiveCodec, LocalStore, RemoteBackupStore, StoreFiles,
};
use eventtracker_domain::{BackupOutcome, EventTrackerError, Result as DomainResult};
use parking_lot::Mutex;

/// Ordered record of port calls.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// Local store whose files live in a caller-provided directory.
#[derive(Debug)]
pub struct MockLocalStore {
    files: StoreFiles,
    log: EventLog,
    pub open: bool,
    fail_close: bool,
}

impl MockLocalStore {
    pub fn new(dir: &Path, log: EventLog) -> Self {
        Self {
            files: StoreFiles::sqlite(dir.join("eventtracker.db")),
            log,
            open: true,
            fail_close: false,
        }
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

impl LocalStore for MockLocalStore {
    fn primary_file_path(&self) -> PathBuf {
        self.files.primary.clone()
    }

    fn side_file_paths(&self) -> Vec<PathBuf> {
        self.files.side_files.clone()
    }

    fn close(&mut self) -> DomainResult<()> {
        self.log.push("store.close");
        if self.fail_close {
            return Err(EventTrackerError::Database("close failed".to_string()));
        }
        self.open = false;
        Ok(())
    }

    fn reopen(&mut self) -> DomainResult<()> {
        self.log.push("store.reopen");
        self.open = true;
        Ok(())
    }
}

/// Codec that writes placeholder archives into a scratch directory.
pub struct MockArchiveCodec {
    scratch: PathBuf,
    log: EventLog,
    counter: AtomicUsize,
    fail_create: bool,
    fail_restore: bool,
}

impl MockArchiveCodec {
    pub fn new(scratch: &Path, log: EventLog) -> Self {
        Self {
            scratch: scratch.to_path_buf(),
            log,
            counter: AtomicUsize::new(0),
            fail_create: false,
            fail_restore: false,
        }
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing_restore(mut self) -> Self {
        self.fail_restore = true;
        self
    }
}

#[async_trait]
impl BackupArchiveCodec for MockArchiveCodec {
    async fn create_encrypted_backup(&self, files: &StoreFiles) -> DomainResult<PathBuf> {
        self.log.push("codec.create");
        if self.fail_create {
            return Err(EventTrackerError::File("primary file unreadable".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let path = self.scratch.join(format!("eventtracker-{}.etbak", 1_000 + n));
        std::fs::write(&path, files.primary.to_string_lossy().as_bytes())
            .map_err(|e| EventTrackerError::File(e.to_string()))?;
        Ok(path)
    }

    async fn restore_from_encrypted_backup(
        &self,
        archive: &Path,
        _files: &StoreFiles,
    ) -> DomainResult<()> {
        self.log.push(format!("codec.restore:{}", archive.display()));
        if self.fail_restore {
            return Err(EventTrackerError::Security("segment 0 failed authentication".to_string()));
        }
        Ok(())
    }
}

/// Remote store with scripted outcomes.
pub struct MockRemoteStore {
    scratch: PathBuf,
    log: EventLog,
    upload_outcome: BackupOutcome,
    download_outcome: BackupOutcome,
    uploaded: Mutex<Vec<String>>,
}

impl MockRemoteStore {
    pub fn new(scratch: &Path, log: EventLog) -> Self {
        Self {
            scratch: scratch.to_path_buf(),
            log,
            upload_outcome: BackupOutcome::success(),
            download_outcome: BackupOutcome::no_backups_found(),
            uploaded: Mutex::new(Vec::new()),
        }
    }

    pub fn with_upload_outcome(mut self, outcome: BackupOutcome) -> Self {
        self.upload_outcome = outcome;
        self
    }

    /// A `Success` outcome makes the download write an archive into scratch.
    pub fn with_download_outcome(mut self, outcome: BackupOutcome) -> Self {
        self.download_outcome = outcome;
        self
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().clone()
    }
}

#[async_trait]
impl RemoteBackupStore for MockRemoteStore {
    async fn upload_backup(&self, file: &Path, retention_count: usize) -> BackupOutcome {
        self.log.push(format!("remote.upload:retain={retention_count}"));
        assert!(file.exists(), "archive must exist while uploading");
        let name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        self.uploaded.lock().push(name);
        self.upload_outcome.clone()
    }

    async fn download_latest_backup(&self) -> BackupOutcome {
        self.log.push("remote.download");
        match &self.download_outcome {
            BackupOutcome::Success { .. } => {
                let path = self.scratch.join("eventtracker-1700000000000.etbak");
                std::fs::write(&path, b"archive").unwrap();
                BackupOutcome::with_file(path)
            }
            failure => failure.clone(),
        }
    }
}

/// Account link with fixed state.
pub struct MockAccount {
    pub configured: bool,
    pub linked: bool,
}

impl MockAccount {
    pub fn linked() -> Self {
        Self { configured: true, linked: true }
    }
}

#[async_trait]
impl AccountLink for MockAccount {
    fn is_configured(&self) -> bool {
        self.configured
    }

    fn is_linked(&self) -> bool {
        self.linked
    }

    async fn valid_access_token(&self) -> Option<String> {
        self.linked.then(|| "token".to_string())
    }
}
