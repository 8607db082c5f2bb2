// ==========================================
// 资产层级导入系统 - API 层
// ==========================================
// 职责: 对外业务接口（导入提交/状态/历史，资产查询/删除）
// ==========================================

pub mod asset_api;
pub mod error;
pub mod import_api;

// 重导出核心类型
pub use asset_api::AssetApi;
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportStatusResponse, SubmittedImport};
