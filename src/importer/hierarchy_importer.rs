// ==========================================
// 资产层级导入系统 - 层级导入器实现
// ==========================================
// 职责: 整合导入流程，从上传字节到数据库
// 流程: 大小检查 → 映射结构检查 → 解码 → 表头映射校验 → 归一化
//       → 读取现有层级 → 校验 → 对账 → 单事务落库
// ==========================================

use crate::config::{ConfigError, ImportConfigReader};
use crate::domain::import_job::{ImportRequest, ReconcileSummary};
use crate::domain::types::{ChangeKind, FailureCategory};
use crate::engine::reconciler::Reconciler;
use crate::importer::error::{FileFormatError, ImportError, ImportResult};
use crate::importer::field_mapper::{ColumnMapping, FieldMapper as DefaultFieldMapper};
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::hierarchy_validator::HierarchyValidator as DefaultHierarchyValidator;
use crate::importer::importer_trait::{
    FieldMapper, FileDecoder, HierarchyImporter, HierarchyValidator,
};
use crate::repository::AssetNodeRepository;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

// ==========================================
// HierarchyImporterImpl - 层级导入器实现
// ==========================================
pub struct HierarchyImporterImpl<R, C>
where
    R: AssetNodeRepository,
    C: ImportConfigReader,
{
    // 数据访问层
    asset_repo: R,

    // 配置读取器
    config: C,

    // 导入组件
    file_decoder: Box<dyn FileDecoder>,
    field_mapper: Box<dyn FieldMapper>,
    validator: Box<dyn HierarchyValidator>,
    reconciler: Reconciler,
}

impl<R, C> HierarchyImporterImpl<R, C>
where
    R: AssetNodeRepository,
    C: ImportConfigReader,
{
    /// 创建新的 HierarchyImporter 实例
    ///
    /// # 参数
    /// - asset_repo: 资产节点仓储
    /// - config: 配置读取器
    /// - file_decoder: 文件解码器
    /// - field_mapper: 字段映射器
    /// - validator: 层级校验器
    /// - reconciler: 对账引擎
    pub fn new(
        asset_repo: R,
        config: C,
        file_decoder: Box<dyn FileDecoder>,
        field_mapper: Box<dyn FieldMapper>,
        validator: Box<dyn HierarchyValidator>,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            asset_repo,
            config,
            file_decoder,
            field_mapper,
            validator,
            reconciler,
        }
    }

    /// 使用默认组件创建
    pub fn with_default_components(asset_repo: R, config: C) -> Self {
        Self::new(
            asset_repo,
            config,
            Box::new(UniversalFileParser),
            Box::new(DefaultFieldMapper),
            Box::new(DefaultHierarchyValidator),
            Reconciler::default(),
        )
    }
}

fn config_error(err: ConfigError) -> ImportError {
    ImportError::system(FailureCategory::Unclassified, format!("配置读取失败: {}", err))
}

#[async_trait::async_trait]
impl<R, C> HierarchyImporter for HierarchyImporterImpl<R, C>
where
    R: AssetNodeRepository + Send + Sync,
    C: ImportConfigReader + Send + Sync,
{
    #[instrument(
        skip(self, request),
        fields(company_id = %request.company_id, file_name = %request.file_name)
    )]
    async fn import(&self, request: &ImportRequest) -> ImportResult<ReconcileSummary> {
        let start_time = Instant::now();
        let company_id = request.company_id.as_str();

        // === 步骤 1: 文件大小 ===
        let max_file_bytes = self.config.get_max_file_bytes().await.map_err(config_error)?;
        if request.payload.len() > max_file_bytes {
            return Err(FileFormatError::FileTooLarge {
                size: request.payload.len(),
                limit: max_file_bytes,
            }
            .into());
        }

        // === 步骤 2: 映射配置结构（不依赖文件内容） ===
        debug!("步骤 2: 映射配置结构检查");
        let mapping = ColumnMapping::from_json(&request.mapping).map_err(ImportError::Mapping)?;
        let structural = mapping.structural_errors();
        if !structural.is_empty() {
            return Err(ImportError::Mapping(structural));
        }

        // === 步骤 3: 解码 ===
        debug!("步骤 3: 解码文件");
        let decoded = self.file_decoder.decode(
            &request.payload,
            request.declared_media_type.as_deref(),
            &request.file_name,
        )?;

        let max_rows = self.config.get_max_rows().await.map_err(config_error)?;
        if decoded.rows.len() > max_rows {
            return Err(FileFormatError::TooManyRows {
                rows: decoded.rows.len(),
                limit: max_rows,
            }
            .into());
        }
        info!(total_rows = decoded.rows.len(), "文件解码完成");

        // === 步骤 4: 映射校验（表头存在性），通过后才处理行 ===
        self.field_mapper
            .validate_mapping(&mapping, &decoded.headers)
            .map_err(ImportError::Mapping)?;
        let rows = self.field_mapper.apply(decoded.rows, &mapping);

        // === 步骤 5: 现有层级 ===
        debug!("步骤 5: 读取现有层级");
        let existing = self.asset_repo.load_existing_state(company_id).await?;

        // === 步骤 6: 校验（全部行检查完再返回） ===
        let validated = self
            .validator
            .validate(&rows, &existing)
            .into_result()
            .map_err(|report| {
                warn!(
                    error_rows = report.summary.error_rows,
                    error_count = report.summary.error_count,
                    "数据校验未通过"
                );
                ImportError::Validation(report)
            })?;

        // === 步骤 7: 对账 ===
        let plan = self.reconciler.plan(&validated, &existing)?;

        // === 步骤 8: 落库（单事务） ===
        let written = self.asset_repo.apply_plan(company_id, &plan).await?;

        let summary = ReconcileSummary {
            created_count: plan.count(ChangeKind::Created),
            updated_count: plan.count(ChangeKind::Updated),
            unchanged_count: plan.count(ChangeKind::Unchanged),
            relevelled_count: plan.count(ChangeKind::Relevelled),
            total_processed: validated.len(),
            processing_time_ms: start_time.elapsed().as_millis() as u64,
        };

        info!(
            created = summary.created_count,
            updated = summary.updated_count,
            unchanged = summary.unchanged_count,
            relevelled = summary.relevelled_count,
            written = written,
            elapsed_ms = summary.processing_time_ms,
            "导入完成"
        );

        Ok(summary)
    }
}
