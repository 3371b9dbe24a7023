//! Database Module
//!
//! Owns the single SQLite connection pool of the process and its
//! open/close/reopen lifecycle.

pub mod repository;

use crate::utils::{AppError, AppResult, ErrorCode};
use shared::models::SettingRow;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Database service — the one store handle shared by every component
///
/// Cloning is cheap; all clones see the same pool. While a restore swaps
/// the underlying file the pool slot is empty and [`DbService::pool`]
/// fails with [`ErrorCode::DatabaseClosed`].
#[derive(Clone)]
pub struct DbService {
    path: PathBuf,
    pool: Arc<RwLock<Option<SqlitePool>>>,
}

impl DbService {
    /// Open (creating if missing) the database at `path`, apply migrations
    /// and seed default settings
    pub async fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let pool = Self::connect(&path).await?;
        Ok(Self {
            path,
            pool: Arc::new(RwLock::new(Some(pool))),
        })
    }

    async fn connect(path: &Path) -> AppResult<SqlitePool> {
        // WAL, foreign keys, normal sync
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            // busy_timeout: 写冲突时等待 5s 而非立即失败
            .busy_timeout(Duration::from_millis(5000));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to apply migrations: {e}")))?;

        repository::setting::seed_defaults(&pool).await?;

        tracing::info!(path = %path.display(), "Database opened (SQLite WAL, busy_timeout=5000ms)");
        Ok(pool)
    }

    /// Path of the live database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Live pool, or `DatabaseClosed` while the store is closed
    pub async fn pool(&self) -> AppResult<SqlitePool> {
        self.pool
            .read()
            .await
            .clone()
            .ok_or_else(|| AppError::new(ErrorCode::DatabaseClosed))
    }

    pub async fn is_open(&self) -> bool {
        self.pool.read().await.is_some()
    }

    /// Write a consistent copy of the store to `dest`
    ///
    /// An open store is copied with `VACUUM INTO` inside SQLite, so writers
    /// on other connections cannot tear it. A closed store is quiescent and
    /// its file is copied as is. Returns whether the store was open.
    pub async fn snapshot_into(&self, dest: &Path) -> AppResult<bool> {
        remove_database_files(dest)?;
        let slot = self.pool.read().await;
        match slot.as_ref() {
            Some(pool) => {
                sqlx::query("VACUUM INTO ?")
                    .bind(dest.to_string_lossy().into_owned())
                    .execute(pool)
                    .await
                    .map_err(|e| {
                        AppError::with_message(
                            ErrorCode::BackupFailed,
                            format!("Database snapshot failed: {e}"),
                        )
                    })?;
                Ok(true)
            }
            None => {
                let (source, dest) = (self.path.clone(), dest.to_path_buf());
                tokio::task::spawn_blocking(move || std::fs::copy(&source, &dest))
                    .await
                    .map_err(|e| AppError::internal(format!("Snapshot task failed: {e}")))?
                    .map_err(|e| {
                        AppError::with_message(
                            ErrorCode::BackupFailed,
                            format!("Database snapshot failed: {e}"),
                        )
                    })?;
                Ok(false)
            }
        }
    }

    /// Checkpoint and close the pool. Closing an already closed store is a no-op.
    pub async fn close(&self) -> AppResult<()> {
        let mut slot = self.pool.write().await;
        if let Some(pool) = slot.take() {
            if let Err(e) = checkpoint(&pool).await {
                tracing::warn!(error = %e, "WAL checkpoint before close failed");
            }
            pool.close().await;
            tracing::info!(path = %self.path.display(), "Database closed");
        }
        Ok(())
    }

    /// Open a fresh pool against the same path (no-op when already open)
    pub async fn reopen(&self) -> AppResult<()> {
        let mut slot = self.pool.write().await;
        if slot.is_none() {
            *slot = Some(Self::connect(&self.path).await?);
        }
        Ok(())
    }

    /// Replace the database file with `source` while holding the store
    /// exclusively: close, swap, reopen.
    ///
    /// The live file is set aside as `<db>.pre-swap` during the swap. If the
    /// swapped-in file cannot be opened it is discarded, the previous file is
    /// put back and the store reopens on it, so a failed replace leaves the
    /// store as it was.
    pub async fn replace_file(&self, source: PathBuf) -> AppResult<()> {
        let mut slot = self.pool.write().await;
        if let Some(pool) = slot.take() {
            if let Err(e) = checkpoint(&pool).await {
                tracing::warn!(error = %e, "WAL checkpoint before restore failed");
            }
            pool.close().await;
        }

        let target = self.path.clone();
        let swapped = tokio::task::spawn_blocking(move || swap_file(&source, &target))
            .await
            .map_err(|e| AppError::internal(format!("Restore task failed: {e}")))
            .and_then(|r| r);

        let displaced = match swapped {
            Ok(displaced) => displaced,
            Err(e) => {
                // swap_file already put the previous file back
                *slot = Some(Self::connect(&self.path).await?);
                return Err(e);
            }
        };

        match Self::connect(&self.path).await {
            Ok(pool) => {
                *slot = Some(pool);
                if let Some(displaced) = displaced {
                    if let Err(e) = remove_database_files(&displaced) {
                        tracing::warn!(error = %e, "Failed to remove pre-swap database");
                    }
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Replaced database does not open, rolling back");
                let target = self.path.clone();
                tokio::task::spawn_blocking(move || undo_swap(displaced.as_deref(), &target))
                    .await
                    .map_err(|e| AppError::internal(format!("Restore task failed: {e}")))??;
                *slot = Some(Self::connect(&self.path).await?);
                Err(AppError::with_message(
                    ErrorCode::RestoreFailed,
                    format!("Restored database could not be opened: {}", e.message),
                ))
            }
        }
    }
}

/// Open an existing database file read-only on a single connection
async fn open_read_only(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .create_if_missing(false);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
}

/// `PRAGMA quick_check` over a database file that is not the live store
///
/// Fails with `BackupInvalid` when the file is not a readable SQLite
/// database or the check reports damage.
pub async fn check_database_file(path: &Path) -> AppResult<()> {
    let invalid = |detail: String| {
        AppError::with_message(
            ErrorCode::BackupInvalid,
            format!("{} is not a usable database: {detail}", path.display()),
        )
    };

    let pool = open_read_only(path)
        .await
        .map_err(|e| invalid(e.to_string()))?;
    let verdict: Result<String, sqlx::Error> = sqlx::query_scalar("PRAGMA quick_check")
        .fetch_one(&pool)
        .await;
    pool.close().await;

    match verdict {
        Ok(v) if v.eq_ignore_ascii_case("ok") => Ok(()),
        Ok(v) => Err(invalid(v)),
        Err(e) => Err(invalid(e.to_string())),
    }
}

/// Settings rows of a database file that is not the live store
pub async fn read_settings_file(path: &Path) -> AppResult<Vec<SettingRow>> {
    let pool = open_read_only(path)
        .await
        .map_err(|e| AppError::database(format!("Failed to open {}: {e}", path.display())))?;
    let rows = repository::setting::find_all(&pool).await;
    pool.close().await;
    Ok(rows?)
}

/// Remove a database file together with its `-wal`/`-shm` side files
pub fn remove_database_files(path: &Path) -> AppResult<()> {
    for file in [path.to_path_buf(), side_file(path, "-wal"), side_file(path, "-shm")] {
        match std::fs::remove_file(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(AppError::with_message(
                    ErrorCode::StorageIo,
                    format!("Cannot remove {}: {e}", file.display()),
                ));
            }
        }
    }
    Ok(())
}

async fn checkpoint(pool: &SqlitePool) -> AppResult<()> {
    sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
        .execute(pool)
        .await
        .map_err(|e| AppError::database(format!("WAL checkpoint failed: {e}")))?;
    Ok(())
}

fn restore_failed(context: &str, e: std::io::Error) -> AppError {
    AppError::with_message(ErrorCode::RestoreFailed, format!("{context}: {e}"))
}

fn remove_side_files(target: &Path) -> AppResult<()> {
    for suffix in ["-wal", "-shm"] {
        let side = side_file(target, suffix);
        match std::fs::remove_file(&side) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(restore_failed(&format!("Cannot remove {}", side.display()), e)),
        }
    }
    Ok(())
}

/// Set `target` aside as `<target>.pre-swap`, copy `source` next to it and
/// rename the copy over `target`.
///
/// Stale `-wal`/`-shm` side files of the old database are removed first so
/// SQLite does not replay them onto the restored file. On failure the
/// previous file is moved back. Returns the set-aside file, if there was one.
fn swap_file(source: &Path, target: &Path) -> AppResult<Option<PathBuf>> {
    remove_side_files(target)?;

    let displaced = side_file(target, ".pre-swap");
    let displaced = match std::fs::rename(target, &displaced) {
        Ok(()) => Some(displaced),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(restore_failed("Cannot set the live database aside", e)),
    };

    let tmp = side_file(target, ".restore-tmp");
    let copied = std::fs::copy(source, &tmp)
        .map_err(|e| restore_failed("Failed to copy restored database", e))
        .and_then(|_| {
            std::fs::rename(&tmp, target)
                .map_err(|e| restore_failed("Failed to move restored database into place", e))
        });

    if let Err(e) = copied {
        let _ = std::fs::remove_file(&tmp);
        undo_swap(displaced.as_deref(), target)?;
        return Err(e);
    }
    Ok(displaced)
}

/// Put the set-aside file back over `target`
fn undo_swap(displaced: Option<&Path>, target: &Path) -> AppResult<()> {
    remove_side_files(target)?;
    match displaced {
        Some(displaced) => std::fs::rename(displaced, target)
            .map_err(|e| restore_failed("Cannot move the previous database back", e)),
        None => {
            match std::fs::remove_file(target) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(restore_failed("Cannot remove the replaced database", e)),
            }
            Ok(())
        }
    }
}

/// `<file><suffix>` in the same directory
fn side_file(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_file_appends_suffix() {
        let path = Path::new("/data/pos/softwrap-pos.db");
        assert_eq!(
            side_file(path, "-wal"),
            PathBuf::from("/data/pos/softwrap-pos.db-wal")
        );
        assert_eq!(
            side_file(path, ".restore-tmp"),
            PathBuf::from("/data/pos/softwrap-pos.db.restore-tmp")
        );
    }

    #[tokio::test]
    async fn test_close_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db = DbService::open(dir.path().join("pos.db")).await.unwrap();
        assert!(db.is_open().await);

        db.close().await.unwrap();
        assert!(!db.is_open().await);
        let err = db.pool().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseClosed);

        // closing twice is fine
        db.close().await.unwrap();

        db.reopen().await.unwrap();
        let pool = db.pool().await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM setting")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(count > 0);
    }

    #[tokio::test]
    async fn test_swap_file_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.db");
        let target = dir.path().join("live.db");
        std::fs::write(&source, b"new").unwrap();
        std::fs::write(&target, b"old").unwrap();
        std::fs::write(side_file(&target, "-wal"), b"stale").unwrap();

        let displaced = swap_file(&source, &target).unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"new");
        assert!(!side_file(&target, "-wal").exists());
        assert!(!side_file(&target, ".restore-tmp").exists());
        assert!(source.exists());
        let displaced = displaced.unwrap();
        assert_eq!(std::fs::read(&displaced).unwrap(), b"old");

        undo_swap(Some(&displaced), &target).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"old");
        assert!(!displaced.exists());
    }

    #[tokio::test]
    async fn test_swap_file_missing_source_keeps_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("live.db");
        std::fs::write(&target, b"old").unwrap();

        let err = swap_file(&dir.path().join("absent.db"), &target).unwrap_err();
        assert_eq!(err.code, ErrorCode::RestoreFailed);
        assert_eq!(std::fs::read(&target).unwrap(), b"old");
        assert!(!side_file(&target, ".pre-swap").exists());
    }

    #[tokio::test]
    async fn test_replace_with_garbage_keeps_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = DbService::open(dir.path().join("pos.db")).await.unwrap();
        repository::setting::upsert(&db.pool().await.unwrap(), "store_name", "Kept")
            .await
            .unwrap();

        let garbage = dir.path().join("garbage.db");
        std::fs::write(&garbage, vec![0x42u8; 8192]).unwrap();
        let err = db.replace_file(garbage).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RestoreFailed);

        assert!(db.is_open().await);
        let pool = db.pool().await.unwrap();
        assert_eq!(
            repository::setting::get(&pool, "store_name").await.unwrap().as_deref(),
            Some("Kept")
        );
        assert!(!side_file(db.path(), ".pre-swap").exists());
    }

    #[tokio::test]
    async fn test_check_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("garbage.db");
        std::fs::write(&garbage, vec![0x42u8; 8192]).unwrap();
        let err = check_database_file(&garbage).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BackupInvalid);

        let missing = check_database_file(&dir.path().join("absent.db")).await;
        assert_eq!(missing.unwrap_err().code, ErrorCode::BackupInvalid);

        let db = DbService::open(dir.path().join("pos.db")).await.unwrap();
        let snapshot = dir.path().join("snapshot.db");
        assert!(db.snapshot_into(&snapshot).await.unwrap());
        check_database_file(&snapshot).await.unwrap();
        let rows = read_settings_file(&snapshot).await.unwrap();
        assert!(rows.iter().any(|r| r.key == "store_name"));
    }

    #[tokio::test]
    async fn test_snapshot_of_closed_store_copies_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = DbService::open(dir.path().join("pos.db")).await.unwrap();
        db.close().await.unwrap();

        let snapshot = dir.path().join("snapshot.db");
        assert!(!db.snapshot_into(&snapshot).await.unwrap());
        assert_eq!(
            std::fs::read(&snapshot).unwrap(),
            std::fs::read(db.path()).unwrap()
        );
    }
}
