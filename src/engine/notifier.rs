// ==========================================
// 资产层级导入系统 - 导入结果通知
// ==========================================
// 职责: 定义通知接口（投递方式由外部实现：邮件/站内信）
// 说明: 引擎只发出通知请求，不关心投递细节
// ==========================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

/// 通知结果类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportOutcome {
    Completed,
    Error,
}

impl fmt::Display for ImportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportOutcome::Completed => write!(f, "completed"),
            ImportOutcome::Error => write!(f, "error"),
        }
    }
}

/// 一次通知请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportNotification {
    pub job_id: String,
    pub user_id: String, // 上传人
    pub outcome: ImportOutcome,
    pub file_name: String,
    pub details: String, // 成功时为汇总，失败时为用户提示
}

// ==========================================
// ImportNotifier Trait
// ==========================================
// 实现者: LoggingNotifier（默认）；外部投递适配器
#[async_trait]
pub trait ImportNotifier: Send + Sync {
    /// 发送通知
    ///
    /// # 返回
    /// - Err: 投递失败（调用方只记录日志，不影响任务状态）
    async fn notify(&self, notification: ImportNotification)
        -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 默认通知器：只写一条日志
#[derive(Debug, Clone, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl ImportNotifier for LoggingNotifier {
    async fn notify(
        &self,
        notification: ImportNotification,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::info!(
            job_id = %notification.job_id,
            user_id = %notification.user_id,
            outcome = %notification.outcome,
            file_name = %notification.file_name,
            "导入结果通知: {}",
            notification.details
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_notifier_never_fails() {
        let notification = ImportNotification {
            job_id: "J1".to_string(),
            user_id: "u1".to_string(),
            outcome: ImportOutcome::Error,
            file_name: "assets.csv".to_string(),
            details: "数据校验未通过".to_string(),
        };

        assert!(LoggingNotifier.notify(notification).await.is_ok());
    }

    #[test]
    fn test_outcome_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ImportOutcome::Completed).unwrap(),
            "\"completed\""
        );
    }
}
