//! POS Server - 单机门店收银核心
//!
//! # 架构概述
//!
//! - **数据库** (`db`): SQLite 存储句柄与仓储函数
//! - **订单** (`orders`): 原子化的订单提交引擎
//! - **备份** (`backup`): 归档、校验、保留策略与带安全网的恢复
//! - **核心** (`core`): 配置与服务状态
//! - **账号** (`auth`): 员工账号与登录
//!
//! # 模块结构
//!
//! ```text
//! pos-server/src/
//! ├── auth/          # 员工账号、登录校验
//! ├── core/          # 配置、状态
//! ├── db/            # 数据库层 (DbService + repository)
//! ├── orders/        # 订单提交、单号生成、金额计算
//! ├── backup/        # 备份管理器、归档格式、目录、定时任务
//! └── utils/         # 日志、错误类型
//! ```

pub mod auth;
pub mod backup;
pub mod core;
pub mod db;
pub mod orders;
pub mod utils;

// Re-export 公共类型
pub use auth::AuthService;
pub use backup::{AutoBackup, BackupConfig, BackupManager};
pub use core::{Config, ServerState};
pub use db::DbService;
pub use orders::{OrderPolicy, OrderService};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
