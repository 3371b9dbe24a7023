//! Backup Model
//!
//! Catalog metadata written next to each archive, and the results of the
//! backup operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a backup was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupKind {
    Manual,
    Auto,
    /// Safety net taken right before a restore
    PreRestore,
}

impl BackupKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Auto => "auto",
            Self::PreRestore => "pre-restore",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(Self::Manual),
            "auto" => Some(Self::Auto),
            "pre-restore" => Some(Self::PreRestore),
            _ => None,
        }
    }
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sibling metadata file `<name>.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Archive stem, `backup_<type>_<timestamp>`
    pub name: String,
    #[serde(rename = "type")]
    pub kind: BackupKind,
    pub timestamp: DateTime<Utc>,
    /// Archive size in bytes
    pub size: u64,
    /// SHA-256 of the archive, lowercase hex
    pub checksum: String,
}

/// `backup-info.json` entry inside the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub version: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: BackupKind,
}

/// Integrity verdict for one catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Integrity {
    Verified,
    ChecksumMismatch { expected: String, actual: String },
    ArchiveMissing,
    MalformedMetadata { reason: String },
}

impl Integrity {
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// One catalog listing row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Metadata file name inside the backup directory
    pub metadata_file: String,
    /// Parsed metadata, absent when the file is malformed
    pub record: Option<BackupRecord>,
    pub integrity: Integrity,
}

/// Successful `create_backup`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupOutcome {
    pub path: String,
    pub metadata: BackupRecord,
}

/// Successful `restore_backup`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreOutcome {
    pub restored_from: String,
    /// Pre-restore safety backup; restoring it undoes this restore
    pub safety_backup: BackupRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serde_names() {
        assert_eq!(
            serde_json::to_string(&BackupKind::PreRestore).unwrap(),
            "\"pre-restore\""
        );
        let kind: BackupKind = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(kind, BackupKind::Auto);
        assert_eq!(BackupKind::parse("pre-restore"), Some(BackupKind::PreRestore));
        assert_eq!(BackupKind::parse("weekly"), None);
    }

    #[test]
    fn test_record_uses_type_field() {
        let json = r#"{
            "name": "backup_manual_2026-01-02T03-04-05-006Z",
            "type": "manual",
            "timestamp": "2026-01-02T03:04:05.006Z",
            "size": 1024,
            "checksum": "ab"
        }"#;
        let record: BackupRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, BackupKind::Manual);
        assert_eq!(record.size, 1024);

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["type"], "manual");
    }

    #[test]
    fn test_integrity_tagging() {
        let json = serde_json::to_value(Integrity::ArchiveMissing).unwrap();
        assert_eq!(json["status"], "archive_missing");
        assert!(Integrity::Verified.is_usable());
        assert!(
            !Integrity::MalformedMetadata {
                reason: "eof".into()
            }
            .is_usable()
        );
    }
}
