use std::path::PathBuf;
use std::time::Duration;

use crate::backup::BackupConfig;
use crate::orders::OrderPolicy;
use shared::models::backup_period;

/// 服务配置 - 门店节点的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./pos-data | 工作目录 |
/// | DATABASE_FILE | softwrap-pos.db | 数据库文件名 (相对工作目录) |
/// | BACKUP_RETENTION | 14 | 保留的备份数量 |
/// | BACKUP_INTERVAL_MINUTES | 60 | 自动备份间隔 (settings 未配置时) |
/// | ALLOW_PARTIAL_PAYMENT | true | 允许支付总额小于订单总额 |
/// | ALLOW_NEGATIVE_STOCK | true | 允许库存扣减为负 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (未设置) | 日志目录，设置后按天滚动写文件 |
/// | ENVIRONMENT | development | 运行环境 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/pos BACKUP_RETENTION=30 pos-server backup create
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存放数据库、备份、日志
    pub work_dir: PathBuf,
    /// 数据库文件名
    pub database_file: String,
    /// 保留的备份数量
    pub backup_retention: usize,
    /// 自动备份间隔 (分钟)
    pub backup_interval_minutes: u64,
    pub allow_partial_payment: bool,
    pub allow_negative_stock: bool,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    /// 运行环境: development | staging | production
    pub environment: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR")
                .unwrap_or_else(|_| "./pos-data".into())
                .into(),
            database_file: std::env::var("DATABASE_FILE")
                .unwrap_or_else(|_| "softwrap-pos.db".into()),
            backup_retention: parse_retention(std::env::var("BACKUP_RETENTION").ok()),
            backup_interval_minutes: parse_interval_minutes(
                std::env::var("BACKUP_INTERVAL_MINUTES").ok(),
            ),
            allow_partial_payment: std::env::var("ALLOW_PARTIAL_PAYMENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            allow_negative_stock: std::env::var("ALLOW_NEGATIVE_STOCK")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok().map(PathBuf::from),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// 使用指定工作目录，其余取默认值
    ///
    /// 常用于测试场景，不读取环境变量
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            database_file: "softwrap-pos.db".into(),
            backup_retention: DEFAULT_RETENTION,
            backup_interval_minutes: DEFAULT_INTERVAL_MINUTES,
            allow_partial_payment: true,
            allow_negative_stock: true,
            log_level: "info".into(),
            log_dir: None,
            environment: "development".into(),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.work_dir.join(&self.database_file)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.work_dir.join("backups")
    }

    /// 恢复时的临时解压目录
    pub fn scratch_dir(&self) -> PathBuf {
        self.work_dir.join("temp-restore")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.work_dir.join("logs"))
    }

    pub fn backup_config(&self) -> BackupConfig {
        BackupConfig {
            backup_dir: self.backup_dir(),
            scratch_dir: self.scratch_dir(),
            retention_count: self.backup_retention.max(1),
            auto_interval: backup_period(self.backup_interval_minutes)
                .unwrap_or(Duration::from_secs(DEFAULT_INTERVAL_MINUTES * 60)),
        }
    }

    pub fn order_policy(&self) -> OrderPolicy {
        OrderPolicy {
            allow_partial_payment: self.allow_partial_payment,
            allow_negative_stock: self.allow_negative_stock,
        }
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

const DEFAULT_RETENTION: usize = 14;
const DEFAULT_INTERVAL_MINUTES: u64 = 60;

/// `BACKUP_RETENTION`: at least 1, else the default
fn parse_retention(value: Option<String>) -> usize {
    value
        .and_then(|v| v.trim().parse().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(DEFAULT_RETENTION)
}

/// `BACKUP_INTERVAL_MINUTES`: `1..=MAX_BACKUP_INTERVAL_MINUTES`, else the default
fn parse_interval_minutes(value: Option<String>) -> u64 {
    value
        .and_then(|v| v.trim().parse().ok())
        .filter(|m| backup_period(*m).is_some())
        .unwrap_or(DEFAULT_INTERVAL_MINUTES)
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
