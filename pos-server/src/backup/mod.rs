//! Backup/Restore Manager
//!
//! Point-in-time snapshots of the store: a zip holding the database file,
//! a settings dump and a small info record, plus a sibling `.json` catalog
//! entry carrying the archive checksum.
//!
//! ```text
//! backups/
//! ├── backup_manual_2026-03-04T05-06-07-089Z.zip
//! ├── backup_manual_2026-03-04T05-06-07-089Z.json
//! └── ...
//! ```

pub mod archive;
pub mod catalog;
pub mod manager;
pub mod scheduler;

pub use manager::BackupManager;
pub use scheduler::AutoBackup;

use std::path::PathBuf;
use std::time::Duration;

/// Archive format version written into `backup-info.json`
pub const FORMAT_VERSION: &str = "1.0.0";

/// Archive entry names
pub const DATABASE_ENTRY: &str = "database.db";
pub const SETTINGS_ENTRY: &str = "settings.json";
pub const INFO_ENTRY: &str = "backup-info.json";

/// Backup manager configuration
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Where archives and their metadata live
    pub backup_dir: PathBuf,
    /// Extraction directory used during restore
    pub scratch_dir: PathBuf,
    /// Number of archives kept by retention pruning
    pub retention_count: usize,
    /// Auto backup period when the `backup_interval` setting is absent
    pub auto_interval: Duration,
}

impl BackupConfig {
    /// Defaults rooted at `work_dir`: keep 14 backups, back up hourly
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        Self {
            backup_dir: work_dir.join("backups"),
            scratch_dir: work_dir.join("temp-restore"),
            retention_count: 14,
            auto_interval: Duration::from_secs(60 * 60),
        }
    }
}
