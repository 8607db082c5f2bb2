// ==========================================
// 资产层级导入系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite (rusqlite) + tokio
// 系统定位: 资产层级批量导入与对账（上传 → 校验 → 幂等落库）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 对账、任务状态机、通知
pub mod engine;

// 导入层 - 解码、映射、校验、流水线
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    CanonicalField, ChangeKind, FailureCategory, FileKind, JobStatus, RowErrorKind,
};

// 领域实体
pub use domain::{
    AssetAttributes, AssetNode, ImportJob, ImportRequest, ReconcileSummary, RowError,
    ValidationReport,
};

// 引擎
pub use engine::{
    AssetLifecycleService, ImportJobTracker, ImportNotification, ImportNotifier, ImportOutcome,
    LoggingNotifier, Reconciler,
};

// 导入
pub use importer::{HierarchyImporter, HierarchyImporterImpl, ImportError};

// API
pub use api::{ApiError, ApiResult, AssetApi, ImportApi, ImportStatusResponse};

// 应用
pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "资产层级导入系统";
