//! SQLite store in WAL mode that can be closed for a restore and reopened.

use std::path::{Path, PathBuf};

use eventtracker_core::backup::ports::{LocalStore, StoreFiles};
use eventtracker_domain::{EventTrackerError, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crate::errors::InfraError;

/// The application's SQLite database.
///
/// The connection sits behind a mutex so the store can be shared read-only
/// through a [`StoreHandle`](eventtracker_core::StoreHandle) lease.
pub struct SqliteLocalStore {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl SqliteLocalStore {
    /// Open (creating if needed) the database at `path` in WAL mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| EventTrackerError::from(InfraError::from(e)))?;
        }
        let conn = open_connection(&path)?;
        info!(db_path = %path.display(), "sqlite store opened");
        Ok(Self { path, conn: Mutex::new(Some(conn)) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }

    /// Run `f` against the open connection.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| EventTrackerError::Database("store is closed".into()))?;
        f(conn).map_err(map_sql_error)
    }
}

impl LocalStore for SqliteLocalStore {
    fn primary_file_path(&self) -> PathBuf {
        self.path.clone()
    }

    fn side_file_paths(&self) -> Vec<PathBuf> {
        StoreFiles::sqlite(&self.path).side_files
    }

    fn checkpoint(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
            })
        })
        .map(|(busy, log, checkpointed)| {
            debug!(busy, log, checkpointed, "sqlite.checkpoint");
        })
    }

    fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.get_mut().take() else {
            return Ok(());
        };
        if let Err((conn, err)) = conn.close() {
            *self.conn.get_mut() = Some(conn);
            return Err(map_sql_error(err));
        }
        info!(db_path = %self.path.display(), "sqlite store closed");
        Ok(())
    }

    fn reopen(&mut self) -> Result<()> {
        if self.conn.get_mut().is_some() {
            return Ok(());
        }
        let conn = open_connection(&self.path)?;
        *self.conn.get_mut() = Some(conn);
        info!(db_path = %self.path.display(), "sqlite store reopened");
        Ok(())
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    )
    .map_err(map_sql_error)?;
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .map_err(map_sql_error)?;
    debug!(journal_mode = %mode, "sqlite.journal_mode");
    conn.busy_timeout(std::time::Duration::from_secs(5)).map_err(map_sql_error)?;
    Ok(conn)
}

fn map_sql_error(err: rusqlite::Error) -> EventTrackerError {
    EventTrackerError::from(InfraError::from(err))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn seeded(dir: &TempDir) -> SqliteLocalStore {
        let store =
            SqliteLocalStore::open(dir.path().join("data").join("eventtracker.db")).unwrap();
        store
            .with_connection(|conn| {
                conn.execute_batch(
                    "CREATE TABLE events (id INTEGER PRIMARY KEY, title TEXT NOT NULL);
                     INSERT INTO events (title) VALUES ('standup');",
                )
            })
            .unwrap();
        store
    }

    #[test]
    fn opens_in_wal_mode_with_sqlite_side_files() {
        let dir = TempDir::new().unwrap();
        let store = seeded(&dir);

        let mode: String = store
            .with_connection(|conn| conn.query_row("PRAGMA journal_mode", [], |row| row.get(0)))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        let files = store.files();
        assert_eq!(files.primary, store.path());
        assert!(files.side_files[0].to_string_lossy().ends_with("eventtracker.db-wal"));
        assert!(files.side_files[1].to_string_lossy().ends_with("eventtracker.db-shm"));
        store.checkpoint().unwrap();
    }

    #[test]
    fn close_releases_connection_and_reopen_restores_it() {
        let dir = TempDir::new().unwrap();
        let mut store = seeded(&dir);

        store.close().unwrap();
        assert!(!store.is_open());
        let closed =
            store.with_connection(|conn| conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)));
        assert!(matches!(closed, Err(EventTrackerError::Database(_))));
        store.close().unwrap();

        store.reopen().unwrap();
        let title: String = store
            .with_connection(|conn| {
                conn.query_row("SELECT title FROM events", [], |row| row.get(0))
            })
            .unwrap();
        assert_eq!(title, "standup");
    }

    #[test]
    fn reopen_on_replaced_file_sees_new_contents() {
        let dir = TempDir::new().unwrap();
        let mut store = seeded(&dir);
        let other = SqliteLocalStore::open(dir.path().join("other.db")).unwrap();
        other
            .with_connection(|conn| {
                conn.execute_batch(
                    "CREATE TABLE events (id INTEGER PRIMARY KEY, title TEXT NOT NULL);
                     INSERT INTO events (title) VALUES ('retro'), ('planning');",
                )
            })
            .unwrap();
        let mut other = other;
        other.close().unwrap();

        store.close().unwrap();
        for side in store.side_file_paths() {
            let _ = std::fs::remove_file(side);
        }
        std::fs::copy(other.path(), store.path()).unwrap();
        store.reopen().unwrap();

        let count: i64 = store
            .with_connection(|conn| {
                conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            })
            .unwrap();
        assert_eq!(count, 2);
    }
}
