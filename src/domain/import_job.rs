// ==========================================
// 资产层级导入系统 - 导入任务领域模型
// ==========================================
// 职责: 导入任务、行错误、校验报告、对账汇总
// 生命周期: ImportJob 持久化；RowError 仅随任务以 JSON 形式保存
// ==========================================

use crate::domain::types::{JobStatus, RowErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ImportJob - 导入任务（import_job 表）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub job_id: String,
    pub company_id: String,
    pub uploaded_by: String,
    pub file_name: String,
    pub status: JobStatus,
    pub error_message: Option<String>,        // 面向用户的失败说明
    pub row_errors: Option<Vec<RowError>>,    // 校验失败时的逐行错误
    pub result_summary: Option<ReconcileSummary>, // 完成后才有值
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    /// 创建处于 uploading 状态的新任务
    pub fn new_uploading(company_id: &str, uploaded_by: &str, file_name: &str) -> Self {
        let now = Utc::now();
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            uploaded_by: uploaded_by.to_string(),
            file_name: file_name.to_string(),
            status: JobStatus::Uploading,
            error_message: None,
            row_errors: None,
            result_summary: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// ImportRequest - 一次导入的完整输入
// ==========================================
// company_id / uploaded_by 由鉴权边界提供，流水线不再复核
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub company_id: String,
    pub uploaded_by: String,
    pub file_name: String,
    pub declared_media_type: Option<String>,
    pub payload: Vec<u8>,
    pub mapping: serde_json::Value, // 标准字段 → 文件表头
}

// ==========================================
// RowError - 行级错误
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub row: usize,
    pub kind: RowErrorKind,
    pub field: Option<String>,
    pub value: Option<String>,
    pub message: String,
}

impl RowError {
    pub fn new(row: usize, kind: RowErrorKind, message: impl Into<String>) -> Self {
        Self {
            row,
            kind,
            field: None,
            value: None,
            message: message.into(),
        }
    }

    pub fn with_field(mut self, field: &str, value: Option<&str>) -> Self {
        self.field = Some(field.to_string());
        self.value = value.map(|v| v.to_string());
        self
    }

    /// 报告中的单行文本: "- 第 N 行 [field=value]: message"
    pub fn to_bullet(&self) -> String {
        match (&self.field, &self.value) {
            (Some(field), Some(value)) => {
                format!("- 第 {} 行 [{}={}]: {}", self.row, field, value, self.message)
            }
            (Some(field), None) => format!("- 第 {} 行 [{}]: {}", self.row, field, self.message),
            _ => format!("- 第 {} 行: {}", self.row, self.message),
        }
    }
}

// ==========================================
// ValidationSummary / ValidationReport
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub error_rows: usize,
    pub error_count: usize,
}

/// 校验失败报告（全部行检查完毕后一次性给出）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<RowError>,
    pub summary: ValidationSummary,
}

impl ValidationReport {
    /// 渲染为一份可读报告（标题 + 逐行列表）
    pub fn render(&self) -> String {
        let mut lines = Vec::with_capacity(self.errors.len() + 1);
        lines.push(format!(
            "数据校验未通过：共 {} 行数据，其中 {} 行存在 {} 个错误，未写入任何数据。",
            self.summary.total_rows, self.summary.error_rows, self.summary.error_count
        ));
        lines.extend(self.errors.iter().map(RowError::to_bullet));
        lines.join("\n")
    }
}

// ==========================================
// ReconcileSummary - 对账结果汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub created_count: usize,
    pub updated_count: usize,
    pub unchanged_count: usize,
    pub relevelled_count: usize, // 批次外节点的层级修正
    pub total_processed: usize,
    pub processing_time_ms: u64,
}
