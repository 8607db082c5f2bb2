// ==========================================
// 资产层级导入系统 - 资产节点 Repository Trait
// ==========================================
// 职责: 定义资产节点数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据读写
// ==========================================

use crate::domain::asset::{AssetNode, ExistingState, ReconcilePlan};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// AssetNodeRepository Trait
// ==========================================
// 用途: 现有层级读取 + 对账计划原子落库
// 实现者: AssetNodeRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait AssetNodeRepository: Send + Sync {
    /// 读取公司现有层级（含软删除记录，用于唯一性判断）
    ///
    /// # 参数
    /// - company_id: 公司 ID
    async fn load_existing_state(&self, company_id: &str) -> RepositoryResult<ExistingState>;

    /// 在单个事务内写入对账计划中的新增/更新/层级修正
    ///
    /// # 返回
    /// - Ok(usize): 写入的节点数（未变更节点不发出任何语句）
    /// - Err: 任一行失败则整个事务回滚，不留下任何部分写入
    async fn apply_plan(&self, company_id: &str, plan: &ReconcilePlan) -> RepositoryResult<usize>;

    /// 按外部编号查询活动节点
    async fn find_by_external_id(
        &self,
        company_id: &str,
        external_id: &str,
    ) -> RepositoryResult<Option<AssetNode>>;

    /// 查询公司全部活动节点（按层级、外部编号排序）
    async fn list_active_nodes(&self, company_id: &str) -> RepositoryResult<Vec<AssetNode>>;

    /// 软删除节点及其全部活动子孙（单事务）
    ///
    /// # 返回
    /// - Ok(usize): 被标记删除的节点数
    /// - Err(NotFound): 节点不存在、已删除或不属于该公司
    async fn soft_delete_subtree(&self, company_id: &str, internal_id: &str)
        -> RepositoryResult<usize>;
}
