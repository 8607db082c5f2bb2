// ==========================================
// 资产层级导入系统 - 导入任务 Repository
// ==========================================
// 职责: import_job 表读写 + 状态机转换（比较并交换）
// 状态: uploading → processing → {completed | error}
// ==========================================

use crate::domain::import_job::{ImportJob, ReconcileSummary, RowError};
use crate::domain::types::JobStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const JOB_COLUMNS: &str = "job_id, company_id, uploaded_by, file_name, status, error_message, \
     row_errors_json, result_summary_json, created_at, updated_at";

pub struct ImportJobRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ImportJobRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建任务记录（必须处于 uploading）
    pub fn create_job(&self, job: &ImportJob) -> RepositoryResult<()> {
        if job.status != JobStatus::Uploading {
            return Err(RepositoryError::InvalidStateTransition {
                from: "<new>".to_string(),
                to: job.status.to_string(),
            });
        }

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO import_job (
                job_id, company_id, uploaded_by, file_name, status,
                error_message, row_errors_json, result_summary_json,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, NULL, ?6, ?7)
            "#,
            params![
                job.job_id,
                job.company_id,
                job.uploaded_by,
                job.file_name,
                job.status.as_str(),
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 状态转换（比较并交换）
    ///
    /// # 返回
    /// - Err(InvalidStateTransition): 转换不合法，或当前状态已不是 from
    /// - Err(NotFound): 任务不存在
    pub fn transition(&self, job_id: &str, from: JobStatus, to: JobStatus) -> RepositoryResult<()> {
        self.transition_with(job_id, from, to, None, None, None)
    }

    /// processing → completed，保存对账汇总
    pub fn mark_completed(&self, job_id: &str, summary: &ReconcileSummary) -> RepositoryResult<()> {
        let summary_json = serde_json::to_string(summary)?;
        self.transition_with(
            job_id,
            JobStatus::Processing,
            JobStatus::Completed,
            None,
            None,
            Some(summary_json),
        )
    }

    /// processing → error，保存用户提示与逐行错误
    pub fn mark_failed(
        &self,
        job_id: &str,
        error_message: &str,
        row_errors: Option<&[RowError]>,
    ) -> RepositoryResult<()> {
        let row_errors_json = row_errors.map(|e| serde_json::to_string(e)).transpose()?;
        self.transition_with(
            job_id,
            JobStatus::Processing,
            JobStatus::Error,
            Some(error_message.to_string()),
            row_errors_json,
            None,
        )
    }

    fn transition_with(
        &self,
        job_id: &str,
        from: JobStatus,
        to: JobStatus,
        error_message: Option<String>,
        row_errors_json: Option<String>,
        result_summary_json: Option<String>,
    ) -> RepositoryResult<()> {
        if !from.can_transition_to(to) {
            return Err(RepositoryError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE import_job SET
                status = ?3,
                error_message = COALESCE(?4, error_message),
                row_errors_json = COALESCE(?5, row_errors_json),
                result_summary_json = COALESCE(?6, result_summary_json),
                updated_at = ?7
            WHERE job_id = ?1 AND status = ?2
            "#,
            params![
                job_id,
                from.as_str(),
                to.as_str(),
                error_message,
                row_errors_json,
                result_summary_json,
                Utc::now(),
            ],
        )?;

        if affected == 1 {
            return Ok(());
        }

        // 区分「任务不存在」与「状态已变化」
        let current: Option<String> = conn
            .query_row(
                "SELECT status FROM import_job WHERE job_id = ?1",
                params![job_id],
                |row| row.get(0),
            )
            .optional()?;

        match current {
            None => Err(RepositoryError::NotFound {
                entity: "ImportJob".to_string(),
                id: job_id.to_string(),
            }),
            Some(actual) => Err(RepositoryError::InvalidStateTransition {
                from: actual,
                to: to.to_string(),
            }),
        }
    }

    /// 查询任务（按公司隔离：其他公司的任务视为不存在）
    pub fn find_job(&self, company_id: &str, job_id: &str) -> RepositoryResult<Option<ImportJob>> {
        let conn = self.get_conn()?;
        let job = conn
            .query_row(
                &format!(
                    "SELECT {} FROM import_job WHERE job_id = ?1 AND company_id = ?2",
                    JOB_COLUMNS
                ),
                params![job_id, company_id],
                map_job_row,
            )
            .optional()?;

        job.map(JobRow::into_job).transpose()
    }

    /// 最近的 N 个任务，最新在前
    pub fn list_recent_jobs(&self, company_id: &str, limit: usize) -> RepositoryResult<Vec<ImportJob>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM import_job WHERE company_id = ?1 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            JOB_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![company_id, limit as i64], map_job_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        rows.into_iter().map(JobRow::into_job).collect()
    }
}

// 行映射只读取原始列；JSON 列与状态的解析在 into_job 中完成
struct JobRow {
    job_id: String,
    company_id: String,
    uploaded_by: String,
    file_name: String,
    status: String,
    error_message: Option<String>,
    row_errors_json: Option<String>,
    result_summary_json: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobRow {
    fn into_job(self) -> RepositoryResult<ImportJob> {
        let status = JobStatus::parse(&self.status).ok_or_else(|| RepositoryError::FieldValueError {
            field: "status".to_string(),
            message: format!("未知任务状态: {}", self.status),
        })?;

        let row_errors = match self.row_errors_json.as_deref() {
            Some(raw) => Some(serde_json::from_str::<Vec<RowError>>(raw)?),
            None => None,
        };
        let result_summary = match self.result_summary_json.as_deref() {
            Some(raw) => Some(serde_json::from_str::<ReconcileSummary>(raw)?),
            None => None,
        };

        Ok(ImportJob {
            job_id: self.job_id,
            company_id: self.company_id,
            uploaded_by: self.uploaded_by,
            file_name: self.file_name,
            status,
            error_message: self.error_message,
            row_errors,
            result_summary,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn map_job_row(row: &Row) -> SqliteResult<JobRow> {
    Ok(JobRow {
        job_id: row.get(0)?,
        company_id: row.get(1)?,
        uploaded_by: row.get(2)?,
        file_name: row.get(3)?,
        status: row.get(4)?,
        error_message: row.get(5)?,
        row_errors_json: row.get(6)?,
        result_summary_json: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::RowErrorKind;

    fn create_repo() -> ImportJobRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ImportJobRepository::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_full_lifecycle_completed() {
        let repo = create_repo();
        let job = ImportJob::new_uploading("c1", "u1", "assets.csv");
        repo.create_job(&job).unwrap();

        repo.transition(&job.job_id, JobStatus::Uploading, JobStatus::Processing)
            .unwrap();
        let summary = ReconcileSummary {
            created_count: 2,
            total_processed: 2,
            ..Default::default()
        };
        repo.mark_completed(&job.job_id, &summary).unwrap();

        let stored = repo.find_job("c1", &job.job_id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.result_summary, Some(summary));
        assert!(stored.error_message.is_none());
    }

    #[test]
    fn test_mark_failed_stores_row_errors() {
        let repo = create_repo();
        let job = ImportJob::new_uploading("c1", "u1", "assets.csv");
        repo.create_job(&job).unwrap();
        repo.transition(&job.job_id, JobStatus::Uploading, JobStatus::Processing)
            .unwrap();

        let errors = vec![RowError::new(3, RowErrorKind::UnresolvedParent, "上级不存在")
            .with_field("parent_id", Some("A99"))];
        repo.mark_failed(&job.job_id, "数据校验未通过", Some(&errors))
            .unwrap();

        let stored = repo.find_job("c1", &job.job_id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Error);
        assert_eq!(stored.row_errors, Some(errors));
        assert!(stored.result_summary.is_none());
    }

    #[test]
    fn test_terminal_state_is_final() {
        let repo = create_repo();
        let job = ImportJob::new_uploading("c1", "u1", "assets.csv");
        repo.create_job(&job).unwrap();
        repo.transition(&job.job_id, JobStatus::Uploading, JobStatus::Processing)
            .unwrap();
        repo.mark_failed(&job.job_id, "失败", None).unwrap();

        // 终态后任何转换都失败，记录保持不变
        let result = repo.mark_completed(&job.job_id, &ReconcileSummary::default());
        assert!(matches!(
            result,
            Err(RepositoryError::InvalidStateTransition { .. })
        ));
        let result = repo.transition(&job.job_id, JobStatus::Error, JobStatus::Processing);
        assert!(matches!(
            result,
            Err(RepositoryError::InvalidStateTransition { .. })
        ));
        let stored = repo.find_job("c1", &job.job_id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Error);
    }

    #[test]
    fn test_skipping_processing_is_rejected() {
        let repo = create_repo();
        let job = ImportJob::new_uploading("c1", "u1", "assets.csv");
        repo.create_job(&job).unwrap();

        let result = repo.mark_completed(&job.job_id, &ReconcileSummary::default());

        assert!(matches!(
            result,
            Err(RepositoryError::InvalidStateTransition { ref from, .. }) if from == "uploading"
        ));
    }

    #[test]
    fn test_unknown_job_is_not_found() {
        let repo = create_repo();
        let result = repo.transition("nope", JobStatus::Uploading, JobStatus::Processing);
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[test]
    fn test_find_job_is_company_scoped() {
        let repo = create_repo();
        let job = ImportJob::new_uploading("c1", "u1", "assets.csv");
        repo.create_job(&job).unwrap();

        assert!(repo.find_job("c2", &job.job_id).unwrap().is_none());
        assert!(repo.find_job("c1", &job.job_id).unwrap().is_some());
    }

    #[test]
    fn test_list_recent_jobs_newest_first() {
        let repo = create_repo();
        let mut ids = Vec::new();
        for i in 0..3 {
            let job = ImportJob::new_uploading("c1", "u1", &format!("f{}.csv", i));
            repo.create_job(&job).unwrap();
            ids.push(job.job_id);
        }
        repo.create_job(&ImportJob::new_uploading("c2", "u2", "other.csv"))
            .unwrap();

        let jobs = repo.list_recent_jobs("c1", 2).unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job_id, ids[2]);
        assert_eq!(jobs[1].job_id, ids[1]);
    }
}
