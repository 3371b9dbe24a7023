use std::path::Path;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::backup::{AutoBackup, BackupManager};
use crate::core::Config;
use crate::db::DbService;
use crate::orders::OrderService;
use crate::utils::AppResult;

/// 服务状态 - 持有所有服务的共享引用
///
/// 使用 Arc / 可克隆句柄实现浅拷贝，所有权成本极低。
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | db | DbService | 唯一的数据库句柄 |
/// | orders | OrderService | 订单提交引擎 |
/// | auth | AuthService | 员工账号与登录 |
/// | backups | Arc<BackupManager> | 备份/恢复管理器 |
/// | auto_backup | Arc<AutoBackup> | 自动备份调度 |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: DbService,
    pub orders: OrderService,
    pub auth: AuthService,
    pub backups: Arc<BackupManager>,
    pub auto_backup: Arc<AutoBackup>,
}

impl ServerState {
    /// 初始化服务状态
    ///
    /// 创建工作目录，打开数据库 (执行迁移并写入默认设置)，组装各服务。
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        tokio::fs::create_dir_all(&config.work_dir).await?;

        let db = DbService::open(config.database_path()).await?;
        let orders = OrderService::new(db.clone(), config.order_policy());
        let auth = AuthService::new(db.clone());
        let backups = Arc::new(BackupManager::new(db.clone(), config.backup_config()));
        let auto_backup = Arc::new(AutoBackup::new(backups.clone()));

        tracing::info!(
            work_dir = %config.work_dir.display(),
            environment = %config.environment,
            "Server state initialized"
        );

        Ok(Self {
            config: config.clone(),
            db,
            orders,
            auth,
            backups,
            auto_backup,
        })
    }

    pub fn work_dir(&self) -> &Path {
        &self.config.work_dir
    }

    /// 停止后台任务并关闭数据库
    pub async fn shutdown(&self) -> AppResult<()> {
        self.auto_backup.stop().await;
        self.db.close().await
    }
}
