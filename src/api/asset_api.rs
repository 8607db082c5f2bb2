// ==========================================
// 资产层级导入系统 - 资产API
// ==========================================
// 职责: 层级查询 + 显式级联软删除
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::asset::AssetNode;
use crate::engine::AssetLifecycleService;
use crate::repository::AssetNodeRepository;
use std::sync::Arc;

pub struct AssetApi {
    asset_repo: Arc<dyn AssetNodeRepository>,
    lifecycle: Arc<AssetLifecycleService>,
}

impl AssetApi {
    pub fn new(asset_repo: Arc<dyn AssetNodeRepository>, lifecycle: Arc<AssetLifecycleService>) -> Self {
        Self {
            asset_repo,
            lifecycle,
        }
    }

    /// 公司的活动资产树（按层级、外部编号排序）
    pub async fn list_assets(&self, company_id: &str) -> ApiResult<Vec<AssetNode>> {
        Ok(self.asset_repo.list_active_nodes(company_id).await?)
    }

    /// 按外部编号查询活动资产
    pub async fn get_asset(&self, company_id: &str, external_id: &str) -> ApiResult<AssetNode> {
        self.asset_repo
            .find_by_external_id(company_id, external_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("资产(external_id={})不存在", external_id)))
    }

    /// 删除资产（连同全部子孙）
    ///
    /// # 返回
    /// - Ok(usize): 被删除的节点数（含自身）
    pub async fn delete_asset(&self, company_id: &str, internal_id: &str) -> ApiResult<usize> {
        Ok(self
            .lifecycle
            .soft_delete_with_descendants(company_id, internal_id)
            .await?)
    }
}
