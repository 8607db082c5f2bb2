// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、应用状态组装、CSV 构造、通知记录
// ==========================================
#![allow(dead_code)]

use asset_hierarchy_import::app::AppState;
use asset_hierarchy_import::domain::types::JobStatus;
use asset_hierarchy_import::engine::{ImportNotification, ImportNotifier};
use asset_hierarchy_import::api::ImportStatusResponse;
use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是合法 UTF-8")?
        .to_string();

    let conn = asset_hierarchy_import::db::open_sqlite_connection(&db_path)?;
    asset_hierarchy_import::db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 在测试数据库上直接执行 SQL（触发器、查询校验等）
pub fn open_raw_conn(db_path: &str) -> Connection {
    asset_hierarchy_import::db::open_sqlite_connection(db_path).unwrap()
}

/// 通知记录器
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<ImportNotification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<ImportNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImportNotifier for RecordingNotifier {
    async fn notify(&self, notification: ImportNotification) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

/// 测试环境：临时库 + 应用状态 + 通知记录器
pub struct TestEnv {
    pub _temp_file: NamedTempFile,
    pub db_path: String,
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn setup_env() -> TestEnv {
    let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let notifier = Arc::new(RecordingNotifier::default());
    let state = AppState::with_notifier(db_path.clone(), notifier.clone()).expect("初始化AppState失败");
    TestEnv {
        _temp_file: temp_file,
        db_path,
        state,
        notifier,
    }
}

/// 标准列映射: Asset ID / Asset Name / Parent ID
pub fn default_mapping() -> Value {
    json!({
        "id": "Asset ID",
        "name": "Asset Name",
        "parent_id": "Parent ID"
    })
}

/// 构造 CSV 内容（每行为 "id,name,parent"）
pub fn csv_payload(rows: &[&str]) -> Vec<u8> {
    let mut content = String::from("Asset ID,Asset Name,Parent ID\n");
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    content.into_bytes()
}

impl TestEnv {
    /// 提交 CSV 并等待后台任务结束，返回任务状态
    pub async fn import_csv(&self, company_id: &str, rows: &[&str]) -> ImportStatusResponse {
        self.import_with(company_id, "assets.csv", csv_payload(rows), default_mapping())
            .await
    }

    pub async fn import_with(
        &self,
        company_id: &str,
        file_name: &str,
        payload: Vec<u8>,
        mapping: Value,
    ) -> ImportStatusResponse {
        let submitted = self
            .state
            .import_api
            .submit_import(company_id, "u1", file_name, None, payload, mapping)
            .expect("提交导入失败");
        let final_status = submitted.task.await.expect("后台任务异常退出");
        assert!(final_status.is_terminal(), "任务未进入终态: {:?}", final_status);

        self.state
            .import_api
            .get_import_status(company_id, &submitted.job_id)
            .expect("查询任务状态失败")
    }

    /// 公司内活动节点数
    pub fn count_active(&self, company_id: &str) -> i64 {
        open_raw_conn(&self.db_path)
            .query_row(
                "SELECT COUNT(*) FROM asset_node WHERE company_id = ?1 AND deleted_at IS NULL",
                [company_id],
                |row| row.get(0),
            )
            .unwrap()
    }
}

pub fn assert_completed(status: &ImportStatusResponse) {
    assert_eq!(
        status.status,
        JobStatus::Completed,
        "导入失败: {:?}",
        status.error_summary
    );
}
