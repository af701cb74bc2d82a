//! End-to-end backup and restore through the real adapters: SQLite store,
//! encrypted archive codec, Dropbox auth manager, and Dropbox remote store
//! against an in-process fake provider.

mod support;

use std::path::Path;
use std::sync::Arc;

use eventtracker_common::auth::{TokenSet, TokenStorage};
use eventtracker_common::testing::MockKeychainProvider;
use eventtracker_core::backup::ports::{AccountLink, UrlLauncher};
use eventtracker_core::{BackupOrchestrator, StoreHandle};
use eventtracker_domain::constants::NO_BACKUPS_FOUND;
use eventtracker_domain::{BackupErrorKind, BackupVerdict, Config, RestoreReport, Result};
use eventtracker_infra::auth::DROPBOX_ACCOUNT;
use eventtracker_infra::{
    DropboxAuthManager, DropboxBackupStore, EncryptedArchiveCodec, HttpClient, SqliteLocalStore,
};
use support::FakeDropbox;
use tempfile::TempDir;

struct NoBrowser;

impl UrlLauncher for NoBrowser {
    fn open_url(&self, _url: &str) -> Result<()> {
        Ok(())
    }
}

struct Stack {
    orchestrator: BackupOrchestrator<SqliteLocalStore>,
    dropbox: FakeDropbox,
    _dir: TempDir,
}

async fn stack(retention: usize) -> Stack {
    let dir = TempDir::new().unwrap();
    let dropbox = FakeDropbox::start("live-token").await;

    let mut config = Config::default();
    config.provider.app_key = "app-key".into();
    config.provider.api_endpoint = dropbox.uri();
    config.provider.content_endpoint = dropbox.uri();
    config.provider.token_endpoint = format!("{}/oauth2/token", dropbox.uri());
    config.backup.retention_count = retention;
    config.backup.scratch_dir = dir.path().join("scratch");
    config.store.path = dir.path().join("data").join("eventtracker.db");

    let keychain = Arc::new(MockKeychainProvider::new("end-to-end"));
    let now_ms = chrono::Utc::now().timestamp_millis();
    let tokens = TokenSet::new("live-token".into(), "refresh".into(), 14_400, now_ms);
    keychain.store_tokens(DROPBOX_ACCOUNT, &tokens).unwrap();
    let account: Arc<dyn AccountLink> = Arc::new(
        DropboxAuthManager::new(&config.provider, keychain.clone(), Arc::new(NoBrowser)).unwrap(),
    );

    let store = SqliteLocalStore::open(&config.store.path).unwrap();
    store
        .with_connection(|conn| {
            conn.execute_batch("CREATE TABLE events (id INTEGER PRIMARY KEY, title TEXT NOT NULL);")
        })
        .unwrap();

    let codec = EncryptedArchiveCodec::new(config.backup.scratch_dir.clone(), keychain);
    let http = HttpClient::for_provider(&config.provider).unwrap();
    let remote = DropboxBackupStore::new(http, account.clone(), &config);

    let orchestrator = BackupOrchestrator::new(
        Arc::new(StoreHandle::new(store)),
        Arc::new(codec),
        Arc::new(remote),
        account,
        config.backup.retention_count,
    );
    Stack { orchestrator, dropbox, _dir: dir }
}

async fn insert(stack: &Stack, title: &str) {
    let store = stack.orchestrator.store().shared().await;
    store
        .with_connection(|conn| conn.execute("INSERT INTO events (title) VALUES (?1)", [title]))
        .unwrap();
}

async fn titles(stack: &Stack) -> Vec<String> {
    let store = stack.orchestrator.store().shared().await;
    store
        .with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT title FROM events ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        })
        .unwrap()
}

fn scratch_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).map(|mut entries| entries.next().is_none()).unwrap_or(true)
}

/// Validates a full backup/restore cycle with retention.
///
/// Assertions:
/// - Confirms each backup cycle uploads a distinct archive.
/// - Ensures retention keeps only the most recent archives.
/// - Confirms restore brings back the state of the newest backup.
/// - Ensures scratch archives are cleaned up.
#[tokio::test]
async fn test_backup_retention_and_restore() {
    let stack = stack(2).await;

    for title in ["standup", "retro", "planning"] {
        insert(&stack, title).await;
        assert_eq!(stack.orchestrator.backup_cycle().await, BackupVerdict::Success);
    }

    let remote = stack.dropbox.file_paths();
    assert_eq!(remote.len(), 2, "{remote:?}");
    assert!(remote
        .iter()
        .all(|p| p.starts_with("/backups/eventtracker-") && p.ends_with(".etbak")));

    insert(&stack, "not backed up").await;
    let report = stack.orchestrator.restore_cycle().await;
    let RestoreReport::Restored { archive } = report else {
        panic!("expected a restore, got {report:?}");
    };
    assert_eq!(format!("/backups/{archive}"), remote[1]);
    assert_eq!(titles(&stack).await, ["standup", "retro", "planning"]);

    let scratch = stack._dir.path().join("scratch");
    assert!(scratch_is_empty(&scratch));
}

/// Validates restore against an empty remote directory.
#[tokio::test]
async fn test_restore_without_backups_leaves_store_untouched() {
    let stack = stack(30).await;
    insert(&stack, "local only").await;

    let report = stack.orchestrator.restore_cycle().await;
    assert_eq!(
        report,
        RestoreReport::DownloadFailed {
            message: NO_BACKUPS_FOUND.to_string(),
            kind: BackupErrorKind::File
        }
    );
    assert_eq!(titles(&stack).await, ["local only"]);
}
