//! Backup manager
//!
//! Lifecycle of one backup: `Requested → Archiving → Checksummed → Cataloged`,
//! or `Failed` with the partial archive removed. Create, restore, prune and
//! export are serialized by one async mutex.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SubsecRound, Utc};
use shared::models::{
    AuditAction, AuditCreate, BackupInfo, BackupKind, BackupOutcome, BackupRecord, CatalogEntry,
    Integrity, RestoreOutcome,
};
use tokio::sync::Mutex;

use super::catalog::{self, archive_path, metadata_path, partial_path};
use super::{BackupConfig, DATABASE_ENTRY, FORMAT_VERSION, archive};
use crate::db::repository::audit;
use crate::db::{DbService, check_database_file, read_settings_file, remove_database_files};
use crate::utils::{AppError, AppResult, ErrorCode};

/// Run blocking file work off the async runtime
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::internal(format!("Blocking task failed: {e}")))?
}

/// Accepts `stem`, `stem.zip` or `stem.json`
fn stem_of(name: &str) -> AppResult<&str> {
    let stem = name
        .strip_suffix(".zip")
        .or_else(|| name.strip_suffix(".json"))
        .unwrap_or(name);
    if stem.is_empty() || stem.contains(['/', '\\']) || stem == "." || stem == ".." {
        return Err(AppError::with_message(
            ErrorCode::BackupNotFound,
            format!("Invalid backup name: {name}"),
        ));
    }
    Ok(stem)
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove file"),
    }
}

/// Backup/Restore Manager
pub struct BackupManager {
    db: DbService,
    config: BackupConfig,
    op_lock: Mutex<()>,
}

impl BackupManager {
    pub fn new(db: DbService, config: BackupConfig) -> Self {
        Self {
            db,
            config,
            op_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    pub fn db(&self) -> &DbService {
        &self.db
    }

    /// Archive path of a cataloged backup name
    pub fn archive_path(&self, name: &str) -> AppResult<PathBuf> {
        Ok(archive_path(&self.config.backup_dir, stem_of(name)?))
    }

    /// Snapshot the database and settings into a new cataloged archive,
    /// then apply retention
    pub async fn create_backup(&self, kind: BackupKind) -> AppResult<BackupOutcome> {
        let _guard = self.op_lock.lock().await;
        self.create_locked(kind, None).await
    }

    async fn create_locked(
        &self,
        kind: BackupKind,
        protect: Option<PathBuf>,
    ) -> AppResult<BackupOutcome> {
        let dir = self.config.backup_dir.clone();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::with_message(
                ErrorCode::BackupFailed,
                format!("Cannot create backup directory {}: {e}", dir.display()),
            )
        })?;

        let db_path = self.db.path().to_path_buf();
        if !tokio::fs::try_exists(&db_path).await.unwrap_or(false) {
            return Err(AppError::with_message(
                ErrorCode::BackupSourceMissing,
                format!("Database file not found: {}", db_path.display()),
            ));
        }

        // Archiving
        let created_at = Utc::now().trunc_subsecs(3);
        let stem = catalog::unique_stem(&dir, kind, created_at);
        let snapshot = catalog::snapshot_path(&dir, &stem);
        let partial = partial_path(&dir, &stem);
        let archive_file = archive_path(&dir, &stem);

        let written = self
            .write_snapshot_archive(kind, created_at, &snapshot, &partial, &archive_file)
            .await;
        if let Err(e) = remove_database_files(&snapshot) {
            tracing::warn!(error = %e, "Failed to remove database snapshot");
        }
        let (size, checksum) = match written {
            Ok(v) => v,
            Err(e) => {
                remove_quietly(&partial);
                remove_quietly(&archive_file);
                tracing::error!(backup = %stem, error = %e, "Backup failed");
                return Err(e);
            }
        };

        // Cataloged
        let record = BackupRecord {
            name: stem.clone(),
            kind,
            timestamp: created_at,
            size,
            checksum,
        };
        let json =
            serde_json::to_vec_pretty(&record).map_err(|e| AppError::internal(e.to_string()))?;
        if let Err(e) = tokio::fs::write(metadata_path(&dir, &stem), json).await {
            remove_quietly(&archive_file);
            tracing::error!(backup = %stem, error = %e, "Backup failed writing metadata");
            return Err(AppError::with_message(
                ErrorCode::BackupFailed,
                format!("Cannot write backup metadata: {e}"),
            ));
        }

        tracing::info!(backup = %stem, kind = %kind, size, "Backup created");

        match self.prune_locked(protect).await {
            Ok(deleted) if !deleted.is_empty() => {
                tracing::info!(count = deleted.len(), "Old backups pruned");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Backup retention pruning failed"),
        }

        Ok(BackupOutcome {
            path: archive_file.display().to_string(),
            metadata: record,
        })
    }

    /// Snapshot the store, dump its settings from the snapshot and zip both
    ///
    /// Settings come from the snapshot file so the two always agree. A closed
    /// store whose file cannot be read as a database is still archived, with
    /// an empty settings dump.
    async fn write_snapshot_archive(
        &self,
        kind: BackupKind,
        created_at: DateTime<Utc>,
        snapshot: &Path,
        partial: &Path,
        archive_file: &Path,
    ) -> AppResult<(u64, String)> {
        let live = self.db.snapshot_into(snapshot).await?;
        let settings = match read_settings_file(snapshot).await {
            Ok(rows) => rows,
            Err(e) if !live => {
                tracing::warn!(error = %e, "Closed store has no readable settings, archiving without them");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        let info = BackupInfo {
            version: FORMAT_VERSION.to_string(),
            created_at,
            kind,
        };

        let (snapshot, partial, archive_file) = (
            snapshot.to_path_buf(),
            partial.to_path_buf(),
            archive_file.to_path_buf(),
        );
        blocking(move || {
            archive::write_archive(&partial, &snapshot, &settings, &info)?;
            std::fs::rename(&partial, &archive_file).map_err(|e| {
                AppError::with_message(
                    ErrorCode::BackupFailed,
                    format!("Cannot finalize archive: {e}"),
                )
            })?;
            // Checksummed
            let checksum = archive::sha256_file(&archive_file)?;
            let size = std::fs::metadata(&archive_file)?.len();
            Ok((size, checksum))
        })
        .await
    }

    /// Catalog entries, newest first, each with an integrity verdict
    pub async fn list_backups(&self) -> AppResult<Vec<CatalogEntry>> {
        let dir = self.config.backup_dir.clone();
        blocking(move || catalog::read_catalog(&dir).map_err(AppError::from)).await
    }

    /// Recompute one archive's checksum against its catalog entry
    pub async fn verify_backup(&self, name: &str) -> AppResult<Integrity> {
        let dir = self.config.backup_dir.clone();
        let stem = stem_of(name)?.to_string();
        blocking(move || {
            let meta = metadata_path(&dir, &stem);
            if !meta.exists() {
                return Err(AppError::with_message(
                    ErrorCode::BackupNotFound,
                    format!("Backup {stem} not found"),
                ));
            }
            Ok(match catalog::read_record(&meta) {
                Ok(record) => catalog::verify_record(&dir, &record),
                Err(reason) => Integrity::MalformedMetadata { reason },
            })
        })
        .await
    }

    /// Apply retention now; returns the deleted backup names
    pub async fn clean_old_backups(&self) -> AppResult<Vec<String>> {
        let _guard = self.op_lock.lock().await;
        self.prune_locked(None).await
    }

    async fn prune_locked(&self, protect: Option<PathBuf>) -> AppResult<Vec<String>> {
        let dir = self.config.backup_dir.clone();
        let keep = self.config.retention_count.max(1);
        blocking(move || catalog::prune(&dir, keep, protect.as_deref()).map_err(AppError::from))
            .await
    }

    /// Refuse an archive whose sibling metadata disagrees with its content
    async fn check_catalog_integrity(&self, path: &Path) -> AppResult<()> {
        let path = path.to_path_buf();
        blocking(move || {
            let meta = path.with_extension(catalog::METADATA_EXT);
            if !meta.exists() {
                tracing::warn!(path = %path.display(), "Restoring an archive without catalog metadata");
                return Ok(());
            }
            let record = catalog::read_record(&meta).map_err(|reason| {
                AppError::with_message(
                    ErrorCode::BackupCorrupted,
                    format!("Backup metadata unreadable: {reason}"),
                )
            })?;
            let actual = archive::sha256_file(&path)?;
            if !actual.eq_ignore_ascii_case(&record.checksum) {
                return Err(AppError::new(ErrorCode::BackupCorrupted)
                    .with_detail("expected", record.checksum)
                    .with_detail("actual", actual));
            }
            Ok(())
        })
        .await
    }

    /// Guarded restore
    ///
    /// Takes a `pre-restore` safety backup first, extracts `path` into the
    /// scratch directory and swaps the extracted database in under the
    /// store's exclusive lock. Restoring the returned safety backup undoes
    /// the restore.
    pub async fn restore_backup(&self, path: &Path) -> AppResult<RestoreOutcome> {
        let _guard = self.op_lock.lock().await;
        let path = path.to_path_buf();

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(AppError::with_message(
                ErrorCode::BackupNotFound,
                format!("Backup archive not found: {}", path.display()),
            ));
        }
        self.check_catalog_integrity(&path).await?;

        let safety = self
            .create_locked(BackupKind::PreRestore, Some(path.clone()))
            .await?;
        tracing::info!(safety_backup = %safety.metadata.name, "Pre-restore safety backup created");

        let scratch = self.config.scratch_dir.clone();
        let extracted = {
            let (path, scratch) = (path.clone(), scratch.clone());
            blocking(move || {
                if scratch.exists() {
                    std::fs::remove_dir_all(&scratch)?;
                }
                std::fs::create_dir_all(&scratch)?;
                archive::extract_archive(&path, &scratch)?;
                let db_file = scratch.join(DATABASE_ENTRY);
                if !db_file.is_file() {
                    return Err(AppError::with_message(
                        ErrorCode::BackupInvalid,
                        format!("Archive has no {DATABASE_ENTRY}"),
                    ));
                }
                Ok(db_file)
            })
            .await
        };

        let result = match extracted {
            Ok(db_file) => match check_database_file(&db_file).await {
                Ok(()) => self.db.replace_file(db_file).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match tokio::fs::remove_dir_all(&scratch).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(dir = %scratch.display(), error = %e, "Failed to remove restore scratch directory"),
        }

        match result {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Backup restored");
                if let Err(e) = self.record_restore(&path, &safety.metadata.name).await {
                    tracing::warn!(error = %e, "Failed to record restore in the audit log");
                }
                Ok(RestoreOutcome {
                    restored_from: path.display().to_string(),
                    safety_backup: safety.metadata,
                })
            }
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    safety_backup = %safety.metadata.name,
                    error = %e,
                    "Restore failed"
                );
                Err(e)
            }
        }
    }

    /// Audit entry written into the freshly restored store
    async fn record_restore(&self, path: &Path, safety_backup: &str) -> AppResult<()> {
        let pool = self.db.pool().await?;
        let name = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let entry = AuditCreate::new(AuditAction::BackupRestored)
            .entity("backup", name)
            .details(serde_json::json!({
                "restored_from": path.display().to_string(),
                "safety_backup": safety_backup,
            }));
        audit::record(&pool, entry).await?;
        Ok(())
    }

    /// Copy a cataloged archive to `destination` (a file path, or a
    /// directory to copy into). Returns the written path.
    pub async fn export_backup(&self, name: &str, destination: &Path) -> AppResult<PathBuf> {
        let _guard = self.op_lock.lock().await;
        let stem = stem_of(name)?;
        let archive = archive_path(&self.config.backup_dir, stem);
        let meta = metadata_path(&self.config.backup_dir, stem);

        let exists = tokio::fs::try_exists(&archive).await.unwrap_or(false)
            && tokio::fs::try_exists(&meta).await.unwrap_or(false);
        if !exists {
            return Err(AppError::with_message(
                ErrorCode::BackupNotFound,
                format!("Backup {stem} not found"),
            ));
        }

        let target = if tokio::fs::metadata(destination)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            destination.join(format!("{stem}.{}", catalog::ARCHIVE_EXT))
        } else {
            destination.to_path_buf()
        };

        tokio::fs::copy(&archive, &target).await?;
        tracing::info!(backup = %stem, destination = %target.display(), "Backup exported");
        Ok(target)
    }
}
