//! Backup orchestration service - core business logic
//!
//! Runs one backup or restore cycle at a time through the phases
//! `AuthCheck → Encoding → Uploading` or `AuthCheck → Downloading →
//! Decoding`, and reduces the outcome to what the scheduler and the UI need.

use std::path::Path;
use std::sync::Arc;

use eventtracker_domain::constants::NO_BACKUPS_FOUND;
use eventtracker_domain::{
    BackupErrorKind, BackupOutcome, BackupPhase, BackupVerdict, RestoreReport,
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::ports::{AccountLink, BackupArchiveCodec, LocalStore, RemoteBackupStore};
use super::store_handle::StoreHandle;

const BACKUP_OPERATION: &str = "backup";
const RESTORE_OPERATION: &str = "restore";

/// Backup orchestration service
pub struct BackupOrchestrator<S: LocalStore> {
    store: Arc<StoreHandle<S>>,
    codec: Arc<dyn BackupArchiveCodec>,
    remote: Arc<dyn RemoteBackupStore>,
    account: Arc<dyn AccountLink>,
    retention_count: usize,
    phase: watch::Sender<BackupPhase>,
}

impl<S: LocalStore> BackupOrchestrator<S> {
    /// Create a new orchestrator
    pub fn new(
        store: Arc<StoreHandle<S>>,
        codec: Arc<dyn BackupArchiveCodec>,
        remote: Arc<dyn RemoteBackupStore>,
        account: Arc<dyn AccountLink>,
        retention_count: usize,
    ) -> Self {
        let (phase, _) = watch::channel(BackupPhase::Idle);
        Self { store, codec, remote, account, retention_count, phase }
    }

    /// Observe phase transitions of the running cycle.
    pub fn subscribe_phase(&self) -> watch::Receiver<BackupPhase> {
        self.phase.subscribe()
    }

    pub fn current_phase(&self) -> BackupPhase {
        *self.phase.borrow()
    }

    pub fn store(&self) -> &Arc<StoreHandle<S>> {
        &self.store
    }

    /// Run a backup cycle and reduce it to the scheduler's verdict.
    pub async fn backup_cycle(&self) -> BackupVerdict {
        match self.run_backup().await {
            BackupOutcome::Success { .. } => BackupVerdict::Success,
            BackupOutcome::Error { kind, .. } => BackupVerdict::for_error(kind),
        }
    }

    /// Run a backup cycle and return the detailed outcome.
    pub async fn run_backup(&self) -> BackupOutcome {
        self.transition(BACKUP_OPERATION, BackupPhase::AuthCheck);
        if let Some(outcome) = self.check_account() {
            return self.finish(BACKUP_OPERATION, outcome);
        }

        self.transition(BACKUP_OPERATION, BackupPhase::Encoding);
        let archive = {
            let lease = self.store.shared().await;
            if let Err(e) = lease.checkpoint() {
                warn!(error = %e, "backup.checkpoint.failed");
            }
            self.codec.create_encrypted_backup(&lease.files()).await
        };
        let archive = match archive {
            Ok(path) => path,
            Err(e) => {
                error!(error = %e, "backup.encode.failed");
                let outcome = BackupOutcome::error(
                    BackupErrorKind::File,
                    format!("Failed to create backup archive: {e}"),
                );
                return self.finish(BACKUP_OPERATION, outcome);
            }
        };

        self.transition(BACKUP_OPERATION, BackupPhase::Uploading);
        let outcome = self.remote.upload_backup(&archive, self.retention_count).await;
        remove_scratch(&archive).await;

        self.finish(BACKUP_OPERATION, outcome)
    }

    /// Replace the local store with the most recent remote backup.
    pub async fn restore_cycle(&self) -> RestoreReport {
        self.transition(RESTORE_OPERATION, BackupPhase::AuthCheck);
        if let Some(BackupOutcome::Error { message, kind }) = self.check_account() {
            self.transition(RESTORE_OPERATION, BackupPhase::Failed);
            return RestoreReport::DownloadFailed { message, kind };
        }

        self.transition(RESTORE_OPERATION, BackupPhase::Downloading);
        let archive = match self.remote.download_latest_backup().await {
            BackupOutcome::Success { file: Some(file) } => file,
            BackupOutcome::Success { file: None } => {
                self.transition(RESTORE_OPERATION, BackupPhase::Failed);
                return RestoreReport::DownloadFailed {
                    message: "Download reported success without a file".to_string(),
                    kind: BackupErrorKind::Unknown,
                };
            }
            BackupOutcome::Error { message, kind } => {
                if message == NO_BACKUPS_FOUND {
                    info!("restore.no_backups_found");
                } else {
                    warn!(kind = %kind, error = %message, "restore.download.failed");
                }
                self.transition(RESTORE_OPERATION, BackupPhase::Failed);
                return RestoreReport::DownloadFailed { message, kind };
            }
        };

        self.transition(RESTORE_OPERATION, BackupPhase::Decoding);
        let result = self.replace_store_files(&archive).await;
        remove_scratch(&archive).await;

        match result {
            Ok(()) => {
                self.transition(RESTORE_OPERATION, BackupPhase::Completed);
                let name = archive
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                info!(archive = %name, "restore.completed");
                RestoreReport::Restored { archive: name }
            }
            Err(message) => {
                error!(error = %message, "restore.decode.failed");
                self.transition(RESTORE_OPERATION, BackupPhase::Failed);
                RestoreReport::RestoreFailed { message }
            }
        }
    }

    /// Close, overwrite, and reopen under one exclusive lease. The store is
    /// reopened even when the overwrite fails.
    async fn replace_store_files(&self, archive: &Path) -> Result<(), String> {
        let mut lease = self.store.exclusive().await;
        let files = lease.files();

        lease.close().map_err(|e| format!("Failed to close store: {e}"))?;
        let restored = self.codec.restore_from_encrypted_backup(archive, &files).await;
        let reopened = lease.reopen();

        restored.map_err(|e| format!("Failed to restore backup: {e}"))?;
        reopened.map_err(|e| format!("Failed to reopen store: {e}"))
    }

    fn check_account(&self) -> Option<BackupOutcome> {
        if !self.account.is_configured() {
            return Some(BackupOutcome::error(
                BackupErrorKind::Auth,
                "Cloud backup is not configured",
            ));
        }
        if !self.account.is_linked() {
            return Some(BackupOutcome::error(
                BackupErrorKind::Auth,
                "Cloud backup account is not linked",
            ));
        }
        None
    }

    fn finish(&self, operation: &'static str, outcome: BackupOutcome) -> BackupOutcome {
        match &outcome {
            BackupOutcome::Success { .. } => {
                self.transition(operation, BackupPhase::Completed);
            }
            BackupOutcome::Error { message, kind } => {
                warn!(operation, kind = %kind, error = %message, "backup.cycle.failed");
                self.transition(operation, BackupPhase::Failed);
            }
        }
        outcome
    }

    fn transition(&self, operation: &'static str, to: BackupPhase) {
        let from = self.phase.send_replace(to);
        debug!(operation, from = from.as_str(), to = to.as_str(), "backup.phase");
    }
}

async fn remove_scratch(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "backup.scratch.cleanup_failed"),
    }
}
