//! 核心模块 - 服务配置和状态
//!
//! - [`Config`] - 服务配置
//! - [`ServerState`] - 服务状态 (数据库句柄 + 各服务)

pub mod config;
pub mod state;

pub use config::Config;
pub use state::ServerState;
