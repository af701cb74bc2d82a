//! Encrypted archive codec for the local store files.
//!
//! An archive is `gzip(tar(store files))` sealed with the segmented
//! AES-256-GCM stream cipher from `eventtracker-common`. The master key is
//! kept in the credential store and created on first use.
//!
//! Restore decrypts the whole archive into a scratch file before touching
//! the store, so a tampered or truncated archive never reaches the live
//! files. Members are staged next to their targets and renamed into place;
//! side files missing from the archive are deleted so a stale WAL is never
//! replayed over the restored database.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use eventtracker_common::crypto::SegmentedCipher;
use eventtracker_common::error::CommonError;
use eventtracker_common::security::{CredentialStore, KeychainError};
use eventtracker_core::backup::ports::{BackupArchiveCodec, StoreFiles};
use eventtracker_domain::constants::{APP_ID, ARCHIVE_KEY_ID, BACKUP_EXTENSION};
use eventtracker_domain::{EventTrackerError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::errors::InfraError;

const STAGING_SUFFIX: &str = ".restoring";

/// Archive codec failures.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Primary store file is missing: {0}")]
    MissingPrimary(PathBuf),

    #[error("Archive does not contain the primary store file")]
    MissingPrimaryMember,

    #[error("Archive key unavailable: {0}")]
    Key(#[from] KeychainError),

    #[error("Archive I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Crypto(#[from] CommonError),

    #[error("Archive task failed: {0}")]
    Task(String),
}

impl From<ArchiveError> for EventTrackerError {
    fn from(value: ArchiveError) -> Self {
        match value {
            ArchiveError::MissingPrimary(_) | ArchiveError::MissingPrimaryMember => {
                EventTrackerError::File(value.to_string())
            }
            ArchiveError::Key(err) => InfraError::from(err).into(),
            ArchiveError::Io(err) => InfraError::from(err).into(),
            ArchiveError::Crypto(err) => InfraError::from(err).into(),
            ArchiveError::Task(message) => EventTrackerError::Internal(message),
        }
    }
}

/// [`BackupArchiveCodec`] writing `eventtracker-<epochMillis>.etbak` files.
pub struct EncryptedArchiveCodec {
    scratch_dir: PathBuf,
    keys: Arc<dyn CredentialStore>,
    key_id: String,
    last_stamp: AtomicI64,
}

impl EncryptedArchiveCodec {
    pub fn new(scratch_dir: impl Into<PathBuf>, keys: Arc<dyn CredentialStore>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            keys,
            key_id: ARCHIVE_KEY_ID.to_string(),
            last_stamp: AtomicI64::new(0),
        }
    }

    /// Use a different credential-store entry for the master key.
    #[must_use]
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = key_id.into();
        self
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Epoch millis for the next archive name, strictly increasing so two
    /// archives created in the same millisecond never share a name.
    fn next_stamp(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let mut last = self.last_stamp.load(Ordering::SeqCst);
        loop {
            let stamp = now.max(last + 1);
            match self.last_stamp.compare_exchange(last, stamp, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return stamp,
                Err(current) => last = current,
            }
        }
    }

    fn cipher(&self) -> std::result::Result<SegmentedCipher, ArchiveError> {
        Ok(SegmentedCipher::new(self.keys.symmetric_key(&self.key_id)?))
    }
}

/// Name of a backup archive created at `epoch_millis`.
pub fn archive_file_name(epoch_millis: i64) -> String {
    format!("{APP_ID}-{epoch_millis}.{BACKUP_EXTENSION}")
}

#[async_trait]
impl BackupArchiveCodec for EncryptedArchiveCodec {
    #[instrument(skip_all)]
    async fn create_encrypted_backup(&self, files: &StoreFiles) -> Result<PathBuf> {
        let cipher = self.cipher()?;
        let target = self.scratch_dir.join(archive_file_name(self.next_stamp()));
        let scratch = self.scratch_dir.clone();
        let files = files.clone();

        let path = tokio::task::spawn_blocking(move || {
            create_archive(&cipher, &scratch, &files, &target).map(|()| target)
        })
        .await
        .map_err(|e| ArchiveError::Task(e.to_string()))??;

        info!(archive = %path.display(), "backup.archive.created");
        Ok(path)
    }

    #[instrument(skip_all, fields(archive = %archive.display()))]
    async fn restore_from_encrypted_backup(
        &self,
        archive: &Path,
        files: &StoreFiles,
    ) -> Result<()> {
        let cipher = self.cipher()?;
        let scratch = self.scratch_dir.clone();
        let archive = archive.to_path_buf();
        let files = files.clone();

        tokio::task::spawn_blocking(move || restore_archive(&cipher, &scratch, &archive, &files))
            .await
            .map_err(|e| ArchiveError::Task(e.to_string()))??;

        info!("backup.archive.restored");
        Ok(())
    }
}

fn create_archive(
    cipher: &SegmentedCipher,
    scratch: &Path,
    files: &StoreFiles,
    target: &Path,
) -> std::result::Result<(), ArchiveError> {
    if !files.primary.is_file() {
        return Err(ArchiveError::MissingPrimary(files.primary.clone()));
    }
    fs::create_dir_all(scratch)?;

    let mut plain = NamedTempFile::new_in(scratch)?;
    {
        let encoder = GzEncoder::new(plain.as_file_mut(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for path in files.all() {
            let Some(name) = path.file_name() else { continue };
            let file = match File::open(path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound && path != files.primary => {
                    debug!(path = %path.display(), "backup.archive.side_file_absent");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            // Snapshot the length up front; a WAL growing mid-read must not
            // overrun the tar header.
            let metadata = file.metadata()?;
            let mut header = tar::Header::new_gnu();
            header.set_size(metadata.len());
            header.set_mode(0o600);
            header.set_mtime(
                metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map_or(0, |d| d.as_secs()),
            );
            header.set_cksum();
            builder.append_data(&mut header, name, file.take(metadata.len()))?;
        }
        builder.into_inner()?.finish()?;
    }
    plain.as_file_mut().seek(SeekFrom::Start(0))?;

    let sealed = (|| -> std::result::Result<(), ArchiveError> {
        let mut out = BufWriter::new(File::create(target)?);
        cipher.encrypt(BufReader::new(plain.as_file_mut()), &mut out)?;
        out.into_inner().map_err(io::IntoInnerError::into_error)?.sync_all()?;
        Ok(())
    })();
    if sealed.is_err() {
        let _ = fs::remove_file(target);
    }
    sealed
}

fn restore_archive(
    cipher: &SegmentedCipher,
    scratch: &Path,
    archive: &Path,
    files: &StoreFiles,
) -> std::result::Result<(), ArchiveError> {
    fs::create_dir_all(scratch)?;

    let mut plain = NamedTempFile::new_in(scratch)?;
    cipher.decrypt(BufReader::new(File::open(archive)?), BufWriter::new(plain.as_file_mut()))?;
    plain.as_file_mut().seek(SeekFrom::Start(0))?;

    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
    let result = stage_members(plain.as_file_mut(), files, &mut staged);
    let result = result.and_then(|()| {
        if staged.iter().any(|(_, target)| *target == files.primary) {
            Ok(())
        } else {
            Err(ArchiveError::MissingPrimaryMember)
        }
    });
    if let Err(e) = result {
        for (staging, _) in &staged {
            let _ = fs::remove_file(staging);
        }
        return Err(e);
    }

    for (staging, target) in &staged {
        fs::rename(staging, target)?;
    }
    for side in &files.side_files {
        if staged.iter().any(|(_, target)| target == side) {
            continue;
        }
        match fs::remove_file(side) {
            Ok(()) => debug!(path = %side.display(), "backup.restore.stale_side_file_removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn stage_members(
    plain: &mut File,
    files: &StoreFiles,
    staged: &mut Vec<(PathBuf, PathBuf)>,
) -> std::result::Result<(), ArchiveError> {
    let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(plain)));
    for entry in tar.entries()? {
        let mut entry = entry?;
        let member = entry.path()?.into_owned();
        let Some(target) = canonical_target(&member, files) else {
            warn!(member = %member.display(), "backup.restore.unknown_member");
            continue;
        };
        if staged.iter().any(|(_, t)| *t == target) {
            continue;
        }

        let staging = staging_path(&target);
        let mut out = File::create(&staging)?;
        staged.push((staging, target));
        io::copy(&mut entry, &mut out)?;
        out.flush()?;
        out.sync_all()?;
    }
    Ok(())
}

/// Store file a member restores to; only bare file names are accepted.
fn canonical_target(member: &Path, files: &StoreFiles) -> Option<PathBuf> {
    let mut components = member.components();
    let name = match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => name,
        _ => return None,
    };
    files.all().find(|path| path.file_name() == Some(name)).map(Path::to_path_buf)
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(STAGING_SUFFIX);
    PathBuf::from(name)
}
