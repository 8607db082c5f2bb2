// ==========================================
// 资产层级导入系统 - 导入层
// ==========================================
// 职责: 上传文件 → 校验通过的层级行 → 对账落库
// 支持: CSV, Excel (.xlsx/.xlsm/.xls)
// ==========================================

// 模块声明
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod hierarchy_importer;
pub mod hierarchy_validator;
pub mod importer_trait;

// 重导出核心类型
pub use error::{FileFormatError, ImportError, ImportResult, MappingError};
pub use field_mapper::{ColumnMapping, FieldMapper as FieldMapperImpl};
pub use file_parser::{detect_file_kind, CsvParser, DecodedFile, ExcelParser, RawRow, UniversalFileParser};
pub use hierarchy_importer::HierarchyImporterImpl;
pub use hierarchy_validator::{HierarchyValidator as HierarchyValidatorImpl, ValidationOutcome};

// 重导出 Trait 接口
pub use importer_trait::{FieldMapper, FileDecoder, FileParser, HierarchyImporter, HierarchyValidator};
