// ==========================================
// 资产层级导入系统 - 资产生命周期服务
// ==========================================
// 职责: 显式的级联软删除（调用方删除节点后主动调用）
// ==========================================

use crate::repository::{AssetNodeRepository, RepositoryResult};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct AssetLifecycleService {
    asset_repo: Arc<dyn AssetNodeRepository>,
}

impl AssetLifecycleService {
    pub fn new(asset_repo: Arc<dyn AssetNodeRepository>) -> Self {
        Self { asset_repo }
    }

    /// 软删除节点及其全部子孙
    ///
    /// # 返回
    /// - Ok(usize): 被删除的节点数（含自身）
    #[instrument(skip(self))]
    pub async fn soft_delete_with_descendants(
        &self,
        company_id: &str,
        internal_id: &str,
    ) -> RepositoryResult<usize> {
        let deleted = self
            .asset_repo
            .soft_delete_subtree(company_id, internal_id)
            .await?;
        info!(deleted = deleted, "资产及其子孙已软删除");
        Ok(deleted)
    }
}
