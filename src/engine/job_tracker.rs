// ==========================================
// 资产层级导入系统 - 导入任务跟踪器
// ==========================================
// 职责: 驱动任务状态机并在终态时决定是否通知上传人
// 状态: uploading → processing → {completed | error}
// 通知: error 总是通知；completed 仅在耗时超过阈值时通知
// ==========================================

use crate::config::{defaults, ImportConfigReader};
use crate::domain::import_job::{ImportJob, ImportRequest, ReconcileSummary};
use crate::domain::types::{FailureCategory, JobStatus};
use crate::engine::notifier::{ImportNotification, ImportNotifier, ImportOutcome};
use crate::importer::{ImportError, HierarchyImporter};
use crate::repository::{ImportJobRepository, RepositoryResult};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

pub struct ImportJobTracker {
    job_repo: Arc<ImportJobRepository>,
    importer: Arc<dyn HierarchyImporter>,
    notifier: Arc<dyn ImportNotifier>,
    config: Arc<dyn ImportConfigReader>,
}

impl ImportJobTracker {
    pub fn new(
        job_repo: Arc<ImportJobRepository>,
        importer: Arc<dyn HierarchyImporter>,
        notifier: Arc<dyn ImportNotifier>,
        config: Arc<dyn ImportConfigReader>,
    ) -> Self {
        Self {
            job_repo,
            importer,
            notifier,
            config,
        }
    }

    /// 同步创建 uploading 任务（读取文件之前）
    pub fn create_job(
        &self,
        company_id: &str,
        uploaded_by: &str,
        file_name: &str,
    ) -> RepositoryResult<ImportJob> {
        let job = ImportJob::new_uploading(company_id, uploaded_by, file_name);
        self.job_repo.create_job(&job)?;
        info!(job_id = %job.job_id, company_id = %company_id, file_name = %file_name, "导入任务已创建");
        Ok(job)
    }

    /// 在后台任务中执行导入，返回任务句柄
    pub fn spawn(self: &Arc<Self>, job_id: String, request: ImportRequest) -> JoinHandle<JobStatus> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move { tracker.run(&job_id, request).await })
    }

    /// 执行一次导入直到终态
    ///
    /// # 返回
    /// - 任务最终状态；任务无法进入 processing 时返回 Uploading
    #[instrument(skip(self, request), fields(company_id = %request.company_id))]
    pub async fn run(&self, job_id: &str, request: ImportRequest) -> JobStatus {
        if let Err(e) = self
            .job_repo
            .transition(job_id, JobStatus::Uploading, JobStatus::Processing)
        {
            error!(error = %e, "任务无法进入 processing 状态");
            return JobStatus::Uploading;
        }

        let started = Instant::now();
        let result = match AssertUnwindSafe(self.importer.import(&request))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                error!(panic = %panic_message(payload.as_ref()), "导入过程异常中止");
                return self
                    .fail(
                        job_id,
                        &request,
                        ImportError::system(FailureCategory::Unclassified, "导入过程异常中止"),
                    )
                    .await;
            }
        };
        let elapsed = started.elapsed();

        match result {
            Ok(summary) => match self.job_repo.mark_completed(job_id, &summary) {
                Ok(()) => {
                    info!(elapsed_ms = elapsed.as_millis() as u64, "导入任务完成");
                    self.notify_completed(job_id, &request, &summary, elapsed).await;
                    JobStatus::Completed
                }
                Err(e) => {
                    // 数据已提交但结果无法记录
                    let failure = ImportError::from(e);
                    self.fail(job_id, &request, failure).await
                }
            },
            Err(e) => self.fail(job_id, &request, e).await,
        }
    }

    async fn fail(&self, job_id: &str, request: &ImportRequest, failure: ImportError) -> JobStatus {
        let category = failure.failure_category();
        let message = failure.user_message();

        match category {
            FailureCategory::Validation | FailureCategory::Mapping | FailureCategory::FileFormat => {
                warn!(category = %category, "导入任务失败: {}", failure)
            }
            _ => error!(category = %category, detail = %failure, "导入任务失败"),
        }

        if let Err(e) = self
            .job_repo
            .mark_failed(job_id, &message, failure.row_errors())
        {
            error!(error = %e, "任务失败状态写入失败，仅更新状态");
            // 不带提示与逐行错误再写一次，任务不能停留在 processing
            if let Err(e) = self
                .job_repo
                .transition(job_id, JobStatus::Processing, JobStatus::Error)
            {
                error!(error = %e, "任务状态无法置为 error");
            }
        }

        self.send(ImportNotification {
            job_id: job_id.to_string(),
            user_id: request.uploaded_by.clone(),
            outcome: ImportOutcome::Error,
            file_name: request.file_name.clone(),
            details: message,
        })
        .await;

        JobStatus::Error
    }

    async fn notify_completed(
        &self,
        job_id: &str,
        request: &ImportRequest,
        summary: &ReconcileSummary,
        elapsed: Duration,
    ) {
        let threshold_secs = self
            .config
            .get_notify_threshold_secs()
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "通知阈值读取失败，使用默认值");
                defaults::NOTIFY_THRESHOLD_SECS
            });

        if elapsed <= Duration::from_secs(threshold_secs) {
            return;
        }

        self.send(ImportNotification {
            job_id: job_id.to_string(),
            user_id: request.uploaded_by.clone(),
            outcome: ImportOutcome::Completed,
            file_name: request.file_name.clone(),
            details: format!(
                "导入完成：新增 {} 个，更新 {} 个，未变更 {} 个，耗时 {} 毫秒",
                summary.created_count,
                summary.updated_count,
                summary.unchanged_count,
                elapsed.as_millis()
            ),
        })
        .await;
    }

    // 通知失败只记录日志，不影响任务状态
    async fn send(&self, notification: ImportNotification) {
        let job_id = notification.job_id.clone();
        if let Err(e) = self.notifier.notify(notification).await {
            warn!(job_id = %job_id, error = %e, "导入结果通知发送失败");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "未知异常".to_string()
    }
}
