//! Backup catalog
//!
//! Naming, listing, verification and retention over the `.json` metadata
//! files of the backup directory.

use std::cmp::Ordering;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use shared::models::{BackupKind, BackupRecord, CatalogEntry, Integrity};

use super::archive::sha256_file;

pub const ARCHIVE_EXT: &str = "zip";
pub const METADATA_EXT: &str = "json";
const PARTIAL_SUFFIX: &str = ".zip.partial";
const SNAPSHOT_SUFFIX: &str = ".db.partial";

/// `backup_<type>_<ISO timestamp with ':' and '.' replaced by '-'>`
pub fn backup_stem(kind: BackupKind, at: DateTime<Utc>) -> String {
    let iso = at.to_rfc3339_opts(SecondsFormat::Millis, true);
    format!("backup_{}_{}", kind.as_str(), iso.replace([':', '.'], "-"))
}

/// [`backup_stem`], suffixed with `-<n>` until no file of that stem exists
pub fn unique_stem(dir: &Path, kind: BackupKind, at: DateTime<Utc>) -> String {
    let base = backup_stem(kind, at);
    let mut n = 0u32;
    loop {
        let candidate = if n == 0 {
            base.clone()
        } else {
            format!("{base}-{n}")
        };
        let taken = archive_path(dir, &candidate).exists()
            || metadata_path(dir, &candidate).exists()
            || partial_path(dir, &candidate).exists()
            || snapshot_path(dir, &candidate).exists();
        if !taken {
            return candidate;
        }
        n += 1;
    }
}

pub fn archive_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}.{ARCHIVE_EXT}"))
}

pub fn metadata_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}.{METADATA_EXT}"))
}

pub fn partial_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}{PARTIAL_SUFFIX}"))
}

/// Database snapshot taken for `stem` before it is zipped
pub fn snapshot_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}{SNAPSHOT_SUFFIX}"))
}

/// Ordering key encoded in a stem: (timestamp text, disambiguator)
///
/// The ISO timestamp sorts lexicographically; stems that don't follow the
/// naming scheme sort on their full text.
pub fn name_key(stem: &str) -> (String, u32) {
    let mut parts = stem.splitn(3, '_');
    let rest = match (parts.next(), parts.next(), parts.next()) {
        (Some("backup"), Some(_kind), Some(rest)) => rest,
        _ => return (stem.to_string(), 0),
    };
    match rest.rsplit_once("Z-") {
        Some((ts, n)) => match n.parse() {
            Ok(n) => (format!("{ts}Z"), n),
            Err(_) => (rest.to_string(), 0),
        },
        None => (rest.to_string(), 0),
    }
}

/// Accept only plain file-name stems
fn is_safe_stem(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}

/// Recompute the archive checksum of `record`
pub fn verify_record(dir: &Path, record: &BackupRecord) -> Integrity {
    let path = archive_path(dir, &record.name);
    match sha256_file(&path) {
        Ok(actual) if actual.eq_ignore_ascii_case(&record.checksum) => Integrity::Verified,
        Ok(actual) => Integrity::ChecksumMismatch {
            expected: record.checksum.clone(),
            actual,
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => Integrity::ArchiveMissing,
        Err(e) => Integrity::ChecksumMismatch {
            expected: record.checksum.clone(),
            actual: format!("unreadable: {e}"),
        },
    }
}

/// Parse one metadata file; the stem of the file must match the recorded name
pub fn read_record(path: &Path) -> Result<BackupRecord, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let record: BackupRecord = serde_json::from_str(&text).map_err(|e| e.to_string())?;
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    if !is_safe_stem(&record.name) || record.name != stem {
        return Err(format!(
            "recorded name '{}' does not match file '{stem}'",
            record.name
        ));
    }
    Ok(record)
}

fn is_metadata_file(name: &str) -> bool {
    name.ends_with(".json") && !name.starts_with("backup-info")
}

/// Every catalog entry with its integrity verdict
///
/// Parsed entries come first, newest timestamp first; malformed entries
/// follow, by file name.
pub fn read_catalog(dir: &Path) -> io::Result<Vec<CatalogEntry>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for item in std::fs::read_dir(dir)? {
        let item = item?;
        let Some(file_name) = item.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !is_metadata_file(&file_name) || !item.path().is_file() {
            continue;
        }

        let entry = match read_record(&item.path()) {
            Ok(record) => CatalogEntry {
                metadata_file: file_name,
                integrity: verify_record(dir, &record),
                record: Some(record),
            },
            Err(reason) => {
                tracing::warn!(file = %file_name, %reason, "Malformed backup metadata");
                CatalogEntry {
                    metadata_file: file_name,
                    record: None,
                    integrity: Integrity::MalformedMetadata { reason },
                }
            }
        };
        entries.push(entry);
    }

    entries.sort_by(compare_entries);
    Ok(entries)
}

fn compare_entries(a: &CatalogEntry, b: &CatalogEntry) -> Ordering {
    match (&a.record, &b.record) {
        (Some(ra), Some(rb)) => rb
            .timestamp
            .cmp(&ra.timestamp)
            .then_with(|| name_key(&rb.name).cmp(&name_key(&ra.name))),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.metadata_file.cmp(&b.metadata_file),
    }
}

/// Delete all but the newest `keep` archives (by modification time, then
/// by name key) together with their metadata. `protect` is never deleted.
///
/// Returns the deleted stems. Individual delete failures are logged and
/// skipped.
pub fn prune(dir: &Path, keep: usize, protect: Option<&Path>) -> io::Result<Vec<String>> {
    let mut archives: Vec<(SystemTime, (String, u32), String)> = Vec::new();
    for item in std::fs::read_dir(dir)? {
        let item = item?;
        let path = item.path();
        if path.extension().and_then(|e| e.to_str()) != Some(ARCHIVE_EXT) || !path.is_file() {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        let modified = item.metadata()?.modified()?;
        archives.push((modified, name_key(&stem), stem));
    }

    archives.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

    let protected = protect.and_then(|p| p.file_stem()).and_then(|s| s.to_str());
    let mut deleted = Vec::new();
    for (_, _, stem) in archives.into_iter().skip(keep) {
        if protected == Some(stem.as_str()) {
            continue;
        }
        if let Err(e) = std::fs::remove_file(archive_path(dir, &stem)) {
            tracing::warn!(backup = %stem, error = %e, "Failed to delete old backup");
            continue;
        }
        match std::fs::remove_file(metadata_path(dir, &stem)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(backup = %stem, error = %e, "Failed to delete backup metadata"),
        }
        deleted.push(stem);
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    // 2026-03-04T05:06:07.089Z
    const T: i64 = 1_772_600_767_089;

    #[test]
    fn test_stem_format() {
        assert_eq!(
            backup_stem(BackupKind::Manual, at(T)),
            "backup_manual_2026-03-04T05-06-07-089Z"
        );
        assert_eq!(
            backup_stem(BackupKind::PreRestore, at(T)),
            "backup_pre-restore_2026-03-04T05-06-07-089Z"
        );
    }

    #[test]
    fn test_unique_stem_appends_counter() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_stem(dir.path(), BackupKind::Auto, at(T));
        std::fs::write(archive_path(dir.path(), &first), b"x").unwrap();
        let second = unique_stem(dir.path(), BackupKind::Auto, at(T));
        assert_eq!(second, format!("{first}-1"));
        std::fs::write(partial_path(dir.path(), &second), b"x").unwrap();
        assert_eq!(
            unique_stem(dir.path(), BackupKind::Auto, at(T)),
            format!("{first}-2")
        );
    }

    #[test]
    fn test_name_key_orders_counter_after_base() {
        let base = backup_stem(BackupKind::Auto, at(T));
        let later = backup_stem(BackupKind::Manual, at(T + 1));
        let (ts, n) = name_key(&format!("{base}-3"));
        assert_eq!(ts, "2026-03-04T05-06-07-089Z");
        assert_eq!(n, 3);

        assert!(name_key(&base) < name_key(&format!("{base}-1")));
        assert!(name_key(&format!("{base}-12")) < name_key(&later));
        assert_eq!(name_key("random").0, "random");
    }

    #[test]
    fn test_metadata_filter() {
        assert!(is_metadata_file("backup_manual_2026-03-04T05-06-07-089Z.json"));
        assert!(!is_metadata_file("backup-info.json"));
        assert!(!is_metadata_file("backup_manual_x.zip"));
    }

    #[test]
    fn test_read_record_rejects_mismatched_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup_manual_a.json");
        std::fs::write(
            &path,
            r#"{"name":"../evil","type":"manual","timestamp":"2026-03-04T05:06:07.089Z","size":1,"checksum":"00"}"#,
        )
        .unwrap();
        assert!(read_record(&path).is_err());
    }
}
