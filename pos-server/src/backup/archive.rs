//! Archive format
//!
//! Blocking helpers; callers run them on `spawn_blocking`.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use sha2::{Digest, Sha256};
use shared::models::{BackupInfo, SettingRow};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{DATABASE_ENTRY, INFO_ENTRY, SETTINGS_ENTRY};
use crate::utils::{AppError, AppResult, ErrorCode};

fn backup_failed(context: &str) -> impl FnOnce(io::Error) -> AppError + '_ {
    move |e| AppError::with_message(ErrorCode::BackupFailed, format!("{context}: {e}"))
}

fn zip_failed(e: zip::result::ZipError) -> AppError {
    AppError::with_message(ErrorCode::BackupFailed, format!("Archive write failed: {e}"))
}

/// Write `database.db`, `settings.json` and `backup-info.json` into a new
/// zip at `dest`, flushed and synced before returning
pub fn write_archive(
    dest: &Path,
    database: &Path,
    settings: &[SettingRow],
    info: &BackupInfo,
) -> AppResult<()> {
    let settings_json =
        serde_json::to_vec_pretty(settings).map_err(|e| AppError::internal(e.to_string()))?;
    let info_json =
        serde_json::to_vec_pretty(info).map_err(|e| AppError::internal(e.to_string()))?;

    let mut source = File::open(database).map_err(backup_failed("Cannot read database file"))?;
    let file = File::create(dest).map_err(backup_failed("Cannot create archive"))?;

    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);

    zip.start_file(DATABASE_ENTRY, options).map_err(zip_failed)?;
    io::copy(&mut source, &mut zip).map_err(backup_failed("Cannot copy database into archive"))?;

    zip.start_file(SETTINGS_ENTRY, options).map_err(zip_failed)?;
    zip.write_all(&settings_json)
        .map_err(backup_failed("Cannot write settings"))?;

    zip.start_file(INFO_ENTRY, options).map_err(zip_failed)?;
    zip.write_all(&info_json)
        .map_err(backup_failed("Cannot write backup info"))?;

    let mut writer = zip.finish().map_err(zip_failed)?;
    writer.flush().map_err(backup_failed("Cannot flush archive"))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(backup_failed("Cannot sync archive"))?;
    Ok(())
}

/// Extract every entry of `archive` under `dest_dir`
///
/// Entries whose path would escape `dest_dir` are skipped.
pub fn extract_archive(archive: &Path, dest_dir: &Path) -> AppResult<()> {
    let file = File::open(archive).map_err(|e| {
        AppError::with_message(ErrorCode::RestoreFailed, format!("Cannot open archive: {e}"))
    })?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|e| {
        AppError::with_message(ErrorCode::BackupInvalid, format!("Invalid archive: {e}"))
    })?;

    let io_err = |e: io::Error| {
        AppError::with_message(ErrorCode::RestoreFailed, format!("Extraction failed: {e}"))
    };

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| {
            AppError::with_message(ErrorCode::BackupInvalid, format!("Invalid archive entry: {e}"))
        })?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(entry = entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };
        let out = dest_dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out).map_err(io_err)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut target = File::create(&out).map_err(io_err)?;
        io::copy(&mut entry, &mut target).map_err(io_err)?;
    }
    Ok(())
}

/// Read one entry of `archive` into memory
pub fn read_entry(archive: &Path, name: &str) -> AppResult<Vec<u8>> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|e| {
        AppError::with_message(ErrorCode::BackupInvalid, format!("Invalid archive: {e}"))
    })?;
    let mut entry = zip.by_name(name).map_err(|_| {
        AppError::with_message(ErrorCode::BackupInvalid, format!("Archive has no {name}"))
    })?;
    let mut data = Vec::new();
    entry.read_to_end(&mut data)?;
    Ok(data)
}

/// SHA-256 of a file, lowercase hex
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::models::BackupKind;

    fn info() -> BackupInfo {
        BackupInfo {
            version: crate::backup::FORMAT_VERSION.to_string(),
            created_at: Utc::now(),
            kind: BackupKind::Manual,
        }
    }

    #[test]
    fn test_write_then_extract() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("live.db");
        std::fs::write(&db, b"sqlite bytes").unwrap();
        let settings = vec![SettingRow {
            key: "store_name".into(),
            value: "Corner Shop".into(),
        }];

        let zip_path = dir.path().join("b.zip");
        write_archive(&zip_path, &db, &settings, &info()).unwrap();

        let out = dir.path().join("out");
        extract_archive(&zip_path, &out).unwrap();
        assert_eq!(std::fs::read(out.join(DATABASE_ENTRY)).unwrap(), b"sqlite bytes");

        let rows: Vec<SettingRow> =
            serde_json::from_slice(&std::fs::read(out.join(SETTINGS_ENTRY)).unwrap()).unwrap();
        assert_eq!(rows, settings);

        let info: BackupInfo =
            serde_json::from_slice(&read_entry(&zip_path, INFO_ENTRY).unwrap()).unwrap();
        assert_eq!(info.version, "1.0.0");
        assert_eq!(info.kind, BackupKind::Manual);
    }

    #[test]
    fn test_missing_database_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_archive(
            &dir.path().join("b.zip"),
            &dir.path().join("nope.db"),
            &[],
            &info(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::BackupFailed);
    }

    #[test]
    fn test_not_a_zip_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.zip");
        std::fs::write(&bogus, b"definitely not a zip").unwrap();
        let err = extract_archive(&bogus, &dir.path().join("out")).unwrap_err();
        assert_eq!(err.code, ErrorCode::BackupInvalid);
    }

    #[test]
    fn test_sha256_known_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
