// ==========================================
// 资产层级导入系统 - 导入组件 Trait
// ==========================================
// 职责: 定义导入流水线各阶段接口（不包含实现）
// 流程: 解码 → 列映射 → 读取现有层级 → 校验 → 对账 → 落库
// ==========================================

use crate::domain::asset::{ExistingState, NormalizedRow};
use crate::domain::import_job::{ImportRequest, ReconcileSummary};
use crate::importer::error::{FileFormatError, ImportResult, MappingError};
use crate::importer::field_mapper::ColumnMapping;
use crate::importer::file_parser::{DecodedFile, RawRow};
use crate::importer::hierarchy_validator::ValidationOutcome;
use async_trait::async_trait;

// ==========================================
// HierarchyImporter Trait
// ==========================================
// 用途: 资产层级导入主接口（单个文件、单次执行）
// 实现者: HierarchyImporterImpl
#[async_trait]
pub trait HierarchyImporter: Send + Sync {
    /// 执行一次完整导入
    ///
    /// # 返回
    /// - Ok(ReconcileSummary): 新增/更新/未变更统计
    /// - Err(ImportError): 任一阶段失败；落库阶段失败时不提交任何数据
    async fn import(&self, request: &ImportRequest) -> ImportResult<ReconcileSummary>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 单一格式的字节解析
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 将文件内容解析为表头 + 行记录
    ///
    /// # 说明
    /// - 第一行为表头
    /// - 全空白行跳过，但行号照常计数
    fn parse_bytes(&self, buffer: &[u8]) -> Result<DecodedFile, FileFormatError>;
}

// ==========================================
// FileDecoder Trait
// ==========================================
// 用途: 识别文件类型并分派给具体解析器
// 实现者: UniversalFileParser
pub trait FileDecoder: Send + Sync {
    /// # 规则
    /// - 扩展名优先，声明的媒体类型仅作兜底
    /// - 无数据行 → EmptyFile
    fn decode(
        &self,
        buffer: &[u8],
        declared_media_type: Option<&str>,
        file_name: &str,
    ) -> Result<DecodedFile, FileFormatError>;
}

// ==========================================
// FieldMapper Trait
// ==========================================
// 用途: 列映射校验与行归一化
// 实现者: field_mapper::FieldMapper
pub trait FieldMapper: Send + Sync {
    /// 校验映射配置本身（在处理任何行之前）
    ///
    /// # 返回
    /// - Ok(()): 映射可用
    /// - Err(Vec<MappingError>): 全部映射问题
    fn validate_mapping(
        &self,
        mapping: &ColumnMapping,
        file_headers: &[String],
    ) -> Result<(), Vec<MappingError>>;

    /// 将原始行转换为标准字段记录
    fn apply(&self, rows: Vec<RawRow>, mapping: &ColumnMapping) -> Vec<NormalizedRow>;
}

// ==========================================
// HierarchyValidator Trait
// ==========================================
// 用途: 纯函数校验（无写入）
// 实现者: hierarchy_validator::HierarchyValidator
pub trait HierarchyValidator: Send + Sync {
    /// 检查全部行后一次性返回结果
    fn validate(&self, rows: &[NormalizedRow], existing: &ExistingState) -> ValidationOutcome;
}
