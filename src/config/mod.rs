// ==========================================
// 资产层级导入系统 - 配置层
// ==========================================
// 职责: 导入运行参数管理（通知阈值、历史条数、文件上限）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, defaults, ConfigManager};
pub use import_config_trait::{ConfigError, ImportConfigReader};
