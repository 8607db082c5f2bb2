// ==========================================
// 资产层级导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类: 文件格式 / 列映射 / 数据校验 / 存储约束 / 系统错误
// ==========================================

use crate::domain::import_job::{RowError, ValidationReport};
use crate::domain::types::{CanonicalField, FailureCategory};
use crate::engine::reconciler::ReconcileError;
use crate::repository::error::RepositoryError;
use serde::Serialize;
use thiserror::Error;

// ==========================================
// 文件格式错误（读取任何行之前失败）
// ==========================================
#[derive(Error, Debug)]
pub enum FileFormatError {
    #[error("文件类型不支持: {file_name}（声明类型: {media_type}，仅支持 .csv/.xlsx/.xls）")]
    UnsupportedFileType { file_name: String, media_type: String },

    #[error("文件内容损坏或无法解析: {0}")]
    CorruptFile(String),

    #[error("文件中没有数据行")]
    EmptyFile,

    #[error("文件大小 {size} 字节超过上限 {limit} 字节")]
    FileTooLarge { size: usize, limit: usize },

    #[error("数据行数 {rows} 超过上限 {limit}")]
    TooManyRows { rows: usize, limit: usize },
}

// 实现 From<csv::Error>
impl From<csv::Error> for FileFormatError {
    fn from(err: csv::Error) -> Self {
        FileFormatError::CorruptFile(format!("CSV 解析失败: {}", err))
    }
}

// ==========================================
// 列映射错误（行归一化之前失败）
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MappingError {
    #[error("必填字段 '{0}' 未配置列映射")]
    MissingRequiredField(CanonicalField),

    #[error("字段 '{field}' 映射的列 '{header}' 在文件表头中不存在")]
    HeaderNotFound {
        field: CanonicalField,
        header: String,
    },

    #[error("无法识别的字段名: '{0}'")]
    UnknownField(String),

    #[error("列映射配置格式错误: {0}")]
    InvalidConfig(String),
}

fn render_mapping_errors(errors: &[MappingError]) -> String {
    let mut lines = vec![format!("列映射配置有误（{} 处）：", errors.len())];
    lines.extend(errors.iter().map(|e| format!("- {}", e)));
    lines.join("\n")
}

// ==========================================
// ImportError - 导入流水线错误
// ==========================================
#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    FileFormat(#[from] FileFormatError),

    #[error("{}", render_mapping_errors(.0))]
    Mapping(Vec<MappingError>),

    #[error("{}", .0.render())]
    Validation(ValidationReport),

    #[error("存储约束冲突: {0}")]
    StorageConstraint(String),

    #[error("系统错误 ({category}): {detail}")]
    System {
        category: FailureCategory,
        detail: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    pub fn system(category: FailureCategory, detail: impl Into<String>) -> Self {
        ImportError::System {
            category,
            detail: detail.into(),
        }
    }

    /// 失败分类（固定分类表）
    pub fn failure_category(&self) -> FailureCategory {
        match self {
            ImportError::FileFormat(_) => FailureCategory::FileFormat,
            ImportError::Mapping(_) => FailureCategory::Mapping,
            ImportError::Validation(_) => FailureCategory::Validation,
            ImportError::StorageConstraint(_) => FailureCategory::StorageConstraint,
            ImportError::System { category, .. } => *category,
            ImportError::Other(_) => FailureCategory::Unclassified,
        }
    }

    /// 写入任务记录的用户提示
    ///
    /// # 规则
    /// - 校验失败: 原样使用逐行报告
    /// - 映射失败: 列出每一处映射问题（只涉及用户自己的配置）
    /// - 文件格式: 固定提示 + 具体原因（原因只描述文件本身）
    /// - 其他: 固定分类提示，不暴露内部异常文本
    pub fn user_message(&self) -> String {
        match self {
            ImportError::Validation(report) => report.render(),
            ImportError::Mapping(errors) => render_mapping_errors(errors),
            ImportError::FileFormat(e) => match e {
                FileFormatError::CorruptFile(_) => {
                    FailureCategory::FileFormat.user_message().to_string()
                }
                other => format!("{}（{}）", FailureCategory::FileFormat.user_message(), other),
            },
            other => other.failure_category().user_message().to_string(),
        }
    }

    /// 结构化的逐行错误（仅校验失败时存在）
    pub fn row_errors(&self) -> Option<&[RowError]> {
        match self {
            ImportError::Validation(report) => Some(&report.errors),
            _ => None,
        }
    }
}

// 实现 From<RepositoryError>
impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueConstraintViolation(msg)
            | RepositoryError::ForeignKeyViolation(msg)
            | RepositoryError::ConstraintViolation(msg) => ImportError::StorageConstraint(msg),
            RepositoryError::Busy(msg) | RepositoryError::LockError(msg) => {
                ImportError::system(FailureCategory::Timeout, msg)
            }
            RepositoryError::ResourceExhausted(msg) => {
                ImportError::system(FailureCategory::ResourceExhausted, msg)
            }
            RepositoryError::PermissionDenied(msg) => {
                ImportError::system(FailureCategory::PermissionDenied, msg)
            }
            other => ImportError::system(FailureCategory::Unclassified, other.to_string()),
        }
    }
}

// 实现 From<ReconcileError>（校验后的内部不一致）
impl From<ReconcileError> for ImportError {
    fn from(err: ReconcileError) -> Self {
        ImportError::system(FailureCategory::Unclassified, err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
