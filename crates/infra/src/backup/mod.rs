//! Backup adapters: the encrypted archive codec and the Dropbox remote store.

pub mod archive;
pub mod dropbox;

pub use archive::{archive_file_name, ArchiveError, EncryptedArchiveCodec};
pub use dropbox::DropboxBackupStore;
