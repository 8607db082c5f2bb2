// ==========================================
// 资产层级导入系统 - 导入API
// ==========================================
// 职责: 提交导入 / 查询任务状态 / 导入历史
// 说明: company_id 与 uploaded_by 由鉴权边界提供，这里不再复核权限
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{defaults, ImportConfigReader};
use crate::domain::import_job::{ImportJob, ImportRequest, ReconcileSummary, RowError};
use crate::domain::types::JobStatus;
use crate::engine::ImportJobTracker;
use crate::repository::ImportJobRepository;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// 历史查询条数上限
pub const MAX_HISTORY_LIMIT: usize = 100;

/// 任务状态响应（前端轮询）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStatusResponse {
    pub id: String,
    pub file_name: String,
    pub status: JobStatus,
    /// 失败时的用户提示
    pub error_summary: Option<String>,
    /// 校验失败时的逐行错误
    pub errors: Option<Vec<RowError>>,
    pub result_summary: Option<ReconcileSummary>,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ImportJob> for ImportStatusResponse {
    fn from(job: ImportJob) -> Self {
        Self {
            id: job.job_id,
            file_name: job.file_name,
            status: job.status,
            error_summary: job.error_message,
            errors: job.row_errors,
            result_summary: job.result_summary,
            uploaded_by: job.uploaded_by,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// 提交结果：任务ID + 后台任务句柄
///
/// 调用方可以忽略句柄，改为轮询 get_import_status
#[derive(Debug)]
pub struct SubmittedImport {
    pub job_id: String,
    pub task: JoinHandle<JobStatus>,
}

/// 导入API
pub struct ImportApi {
    tracker: Arc<ImportJobTracker>,
    job_repo: Arc<ImportJobRepository>,
    config: Arc<dyn ImportConfigReader>,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(
        tracker: Arc<ImportJobTracker>,
        job_repo: Arc<ImportJobRepository>,
        config: Arc<dyn ImportConfigReader>,
    ) -> Self {
        Self {
            tracker,
            job_repo,
            config,
        }
    }

    /// 提交导入
    ///
    /// # 参数
    /// - company_id: 调用方所属公司
    /// - uploaded_by: 上传人
    /// - file_name: 原始文件名（用于类型识别与展示）
    /// - media_type: 声明的 MIME 类型（可选）
    /// - payload: 文件内容
    /// - mapping: 列映射配置 {"标准字段": "文件表头"}
    ///
    /// # 返回
    /// - Ok(SubmittedImport): 已创建 uploading 任务并排入后台
    /// - Err(ApiError): 请求本身不完整（不会创建任务）
    ///
    /// # 说明
    /// 文件大小、映射配置、文件格式等问题都在后台流水线中发现，
    /// 记录在任务上，通过 get_import_status 查看
    #[instrument(skip(self, payload, mapping), fields(payload_bytes = payload.len()))]
    pub fn submit_import(
        &self,
        company_id: &str,
        uploaded_by: &str,
        file_name: &str,
        media_type: Option<String>,
        payload: Vec<u8>,
        mapping: serde_json::Value,
    ) -> ApiResult<SubmittedImport> {
        require_non_empty("company_id", company_id)?;
        require_non_empty("uploaded_by", uploaded_by)?;
        require_non_empty("file_name", file_name)?;

        let job = self.tracker.create_job(company_id, uploaded_by, file_name)?;

        let request = ImportRequest {
            company_id: company_id.to_string(),
            uploaded_by: uploaded_by.to_string(),
            file_name: file_name.to_string(),
            declared_media_type: media_type,
            payload,
            mapping,
        };
        let task = self.tracker.spawn(job.job_id.clone(), request);

        info!(job_id = %job.job_id, "导入任务已提交");
        Ok(SubmittedImport {
            job_id: job.job_id,
            task,
        })
    }

    /// 查询任务状态
    ///
    /// 其他公司的任务视为不存在
    pub fn get_import_status(&self, company_id: &str, job_id: &str) -> ApiResult<ImportStatusResponse> {
        self.job_repo
            .find_job(company_id, job_id)?
            .map(ImportStatusResponse::from)
            .ok_or_else(|| ApiError::NotFound(format!("导入任务(id={})不存在", job_id)))
    }

    /// 导入历史（最新在前）
    ///
    /// # 参数
    /// - limit: 返回条数；None 时使用配置 import/history_limit，限制在 1-100 之间
    pub async fn list_import_history(
        &self,
        company_id: &str,
        limit: Option<usize>,
    ) -> ApiResult<Vec<ImportStatusResponse>> {
        let limit = match limit {
            Some(n) => n,
            None => self.config.get_history_limit().await.unwrap_or_else(|e| {
                warn!(error = %e, "历史条数配置读取失败，使用默认值");
                defaults::HISTORY_LIMIT
            }),
        };
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);

        let jobs = self.job_repo.list_recent_jobs(company_id, limit)?;
        Ok(jobs.into_iter().map(ImportStatusResponse::from).collect())
    }
}

fn require_non_empty(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{} 不能为空", field)));
    }
    Ok(())
}
