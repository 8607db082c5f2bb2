// ==========================================
// 资产层级导入系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod asset;
pub mod import_job;
pub mod types;

// 重导出核心类型
pub use asset::{
    AssetAttributes, AssetNode, ExistingNode, ExistingState, NodeChange, NormalizedRow,
    ReconcilePlan, ValidatedRow,
};
pub use import_job::{
    ImportJob, ImportRequest, ReconcileSummary, RowError, ValidationReport, ValidationSummary,
};
pub use types::{CanonicalField, ChangeKind, FailureCategory, FileKind, JobStatus, RowErrorKind};
