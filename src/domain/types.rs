// ==========================================
// 资产层级导入系统 - 领域类型定义
// ==========================================
// 职责: 导入任务状态、文件类型、标准字段、行错误分类等枚举
// 序列化格式: 与数据库/接口保持一致
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 导入任务状态 (Job Status)
// ==========================================
// 状态机: uploading → processing → {completed | error}
// 终态之后不允许任何转换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Uploading,  // 已受理，尚未读取文件
    Processing, // 流水线执行中
    Completed,  // 成功完成
    Error,      // 失败
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Uploading => "uploading",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// 从数据库字符串解析（未知值返回 None）
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploading" => Some(JobStatus::Uploading),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "error" => Some(JobStatus::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// 是否允许 self → next 的状态转换
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Uploading, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Error)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 文件类型 (File Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Csv,
    Xlsx,
    Xls,
}

impl FileKind {
    /// 按扩展名识别（大小写不敏感）
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(FileKind::Csv),
            "xlsx" | "xlsm" => Some(FileKind::Xlsx),
            "xls" => Some(FileKind::Xls),
            _ => None,
        }
    }

    /// 按声明的媒体类型识别（仅作为扩展名的兜底）
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        // 忽略 "; charset=utf-8" 之类的参数
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "text/csv" | "application/csv" => Some(FileKind::Csv),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Some(FileKind::Xlsx)
            }
            "application/vnd.ms-excel" => Some(FileKind::Xls),
            _ => None,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Csv => write!(f, "CSV"),
            FileKind::Xlsx => write!(f, "XLSX"),
            FileKind::Xls => write!(f, "XLS"),
        }
    }
}

// ==========================================
// 标准字段 (Canonical Field)
// ==========================================
// 列映射配置的键: 标准字段名 → 文件表头
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Id,           // → external_id（必填）
    Name,         // 名称（必填）
    ParentId,     // → parent_external_id
    Description,
    Category,
    Location,
    Manufacturer,
    SerialNumber,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 8] = [
        CanonicalField::Id,
        CanonicalField::Name,
        CanonicalField::ParentId,
        CanonicalField::Description,
        CanonicalField::Category,
        CanonicalField::Location,
        CanonicalField::Manufacturer,
        CanonicalField::SerialNumber,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Id => "id",
            CanonicalField::Name => "name",
            CanonicalField::ParentId => "parent_id",
            CanonicalField::Description => "description",
            CanonicalField::Category => "category",
            CanonicalField::Location => "location",
            CanonicalField::Manufacturer => "manufacturer",
            CanonicalField::SerialNumber => "serial_number",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == s)
    }

    pub fn is_required(&self) -> bool {
        matches!(self, CanonicalField::Id | CanonicalField::Name)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 行错误类型 (Row Error Kind)
// ==========================================
// 声明顺序即同一行内的报告顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RowErrorKind {
    MissingRequiredField,
    DuplicateInRequest,
    DeletedIdConflict,
    UnresolvedParent,
    CycleDetected,
}

impl fmt::Display for RowErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowErrorKind::MissingRequiredField => write!(f, "MissingRequiredField"),
            RowErrorKind::DuplicateInRequest => write!(f, "DuplicateInRequest"),
            RowErrorKind::DeletedIdConflict => write!(f, "DeletedIdConflict"),
            RowErrorKind::UnresolvedParent => write!(f, "UnresolvedParent"),
            RowErrorKind::CycleDetected => write!(f, "CycleDetected"),
        }
    }
}

// ==========================================
// 对账分类 (Change Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Unchanged,
    Relevelled, // 批次外的已有节点，仅层级随祖先移动而变化
}

// ==========================================
// 失败分类 (Failure Category)
// ==========================================
// 固定分类表: 每一类对应一句面向用户的提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCategory {
    FileFormat,
    Mapping,
    Validation,
    StorageConstraint,
    Timeout,
    ResourceExhausted,
    PermissionDenied,
    Unclassified,
}

impl FailureCategory {
    /// 面向用户的固定提示语（校验/映射类错误由调用方使用结构化报告）
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureCategory::FileFormat => {
                "文件无法读取：请上传包含表头和至少一行数据的 .csv、.xlsx 或 .xls 文件。"
            }
            FailureCategory::Mapping => "列映射配置有误：请确认 id 与 name 已映射且列名与文件表头一致。",
            FailureCategory::Validation => "数据校验未通过：请根据逐行错误修正文件后重新上传。",
            FailureCategory::StorageConstraint => {
                "保存时与现有数据冲突（可能有其他导入同时进行）：请稍后重新上传。"
            }
            FailureCategory::Timeout => "数据库繁忙导致导入超时：请稍后重试。",
            FailureCategory::ResourceExhausted => "系统资源不足，导入未能完成：请缩小文件后重试或联系管理员。",
            FailureCategory::PermissionDenied => "系统没有写入资产数据的权限：请联系管理员。",
            FailureCategory::Unclassified => "导入过程中发生未知错误：请稍后重试，如持续失败请联系管理员。",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureCategory::FileFormat => "FileFormatError",
            FailureCategory::Mapping => "MappingError",
            FailureCategory::Validation => "ValidationError",
            FailureCategory::StorageConstraint => "StorageConstraintError",
            FailureCategory::Timeout => "Timeout",
            FailureCategory::ResourceExhausted => "ResourceExhausted",
            FailureCategory::PermissionDenied => "PermissionDenied",
            FailureCategory::Unclassified => "Unclassified",
        };
        write!(f, "{}", name)
    }
}
