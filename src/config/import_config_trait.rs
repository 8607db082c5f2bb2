// ==========================================
// 资产层级导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入流水线与任务跟踪所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

/// 配置读取错误（Send + Sync，可跨后台任务传递）
pub type ConfigError = Box<dyn Error + Send + Sync>;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 完成通知阈值（秒）：处理耗时超过该值才通知上传人
    ///
    /// # 默认值
    /// - 30
    async fn get_notify_threshold_secs(&self) -> Result<u64, ConfigError>;

    /// 导入历史默认返回条数
    ///
    /// # 默认值
    /// - 20
    async fn get_history_limit(&self) -> Result<usize, ConfigError>;

    /// 上传文件大小上限（字节）
    ///
    /// # 默认值
    /// - 10 MiB
    async fn get_max_file_bytes(&self) -> Result<usize, ConfigError>;

    /// 单个文件的数据行数上限
    ///
    /// # 默认值
    /// - 50000
    async fn get_max_rows(&self) -> Result<usize, ConfigError>;
}
