// ==========================================
// 资产层级导入系统 - 引擎层
// ==========================================
// 职责: 对账计算、任务状态机、通知、级联软删除
// 红线: Engine 不拼 SQL，数据读写全部经由 Repository
// ==========================================

pub mod asset_lifecycle;
pub mod job_tracker;
pub mod notifier;
pub mod reconciler;

// 重导出核心引擎
pub use asset_lifecycle::AssetLifecycleService;
pub use job_tracker::ImportJobTracker;
pub use notifier::{ImportNotification, ImportNotifier, ImportOutcome, LoggingNotifier};
pub use reconciler::{IdAllocator, ReconcileError, Reconciler, SequentialAllocator, UuidAllocator};
