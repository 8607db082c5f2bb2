// ==========================================
// 资产层级导入系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::Arc;

use crate::api::{AssetApi, ImportApi};
use crate::config::config_manager::ConfigManager;
use crate::engine::{AssetLifecycleService, ImportJobTracker, ImportNotifier, LoggingNotifier};
use crate::importer::HierarchyImporterImpl;
use crate::repository::{AssetNodeRepositoryImpl, ImportJobRepository};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "ASSET_IMPORT_DB_PATH";

/// 应用状态
///
/// 所有仓储共享同一个 SQLite 连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 导入API
    pub import_api: Arc<ImportApi>,

    /// 资产API
    pub asset_api: Arc<AssetApi>,

    /// 配置管理器（运行时调整阈值/上限）
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例（默认通知器: LoggingNotifier）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_notifier(db_path, Arc::new(LoggingNotifier))
    }

    /// 使用指定通知器创建AppState
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享连接并建表
    /// 2. 初始化Repository与配置管理器
    /// 3. 组装导入流水线、任务跟踪器和API实例
    pub fn with_notifier(
        db_path: String,
        notifier: Arc<dyn ImportNotifier>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = crate::db::open_shared_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let job_repo = Arc::new(ImportJobRepository::new(conn.clone()));
        let asset_repo = Arc::new(AssetNodeRepositoryImpl::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化导入流水线与任务跟踪
        // ==========================================
        let importer = Arc::new(HierarchyImporterImpl::with_default_components(
            AssetNodeRepositoryImpl::new(conn),
            (*config_manager).clone(),
        ));

        let tracker = Arc::new(ImportJobTracker::new(
            job_repo.clone(),
            importer,
            notifier,
            config_manager.clone(),
        ));

        // ==========================================
        // 创建API实例
        // ==========================================
        let import_api = Arc::new(ImportApi::new(
            tracker,
            job_repo,
            config_manager.clone(),
        ));

        let lifecycle = Arc::new(AssetLifecycleService::new(asset_repo.clone()));
        let asset_api = Arc::new(AssetApi::new(asset_repo, lifecycle));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            import_api,
            asset_api,
            config_manager,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 ASSET_IMPORT_DB_PATH（非空时）
/// - 否则当前目录下的 asset_hierarchy.db
pub fn get_default_db_path() -> String {
    match std::env::var(DB_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => path.trim().to_string(),
        _ => "./asset_hierarchy.db".to_string(),
    }
}
