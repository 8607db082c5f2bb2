// ==========================================
// 资产层级导入系统 - API层错误类型
// ==========================================
// 职责: 把仓储层技术错误转换为调用方可理解的错误
// 说明: 导入流水线自身的失败记录在任务上，不经过 ApiError
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 请求错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("数据冲突: {0}")]
    Conflict(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库暂时不可用: {0}")]
    Unavailable(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::Conflict(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::Conflict(format!("外键约束违反: {}", msg))
            }
            RepositoryError::ConstraintViolation(msg) => ApiError::Conflict(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::Busy(msg) | RepositoryError::LockError(msg) => {
                ApiError::Unavailable(msg)
            }
            RepositoryError::ResourceExhausted(msg)
            | RepositoryError::PermissionDenied(msg)
            | RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_conversion() {
        let repo_err = RepositoryError::NotFound {
            entity: "ImportJob".to_string(),
            id: "J001".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("ImportJob"));
                assert!(msg.contains("J001"));
            }
            _ => panic!("Expected NotFound"),
        }

        let api_err: ApiError = RepositoryError::Busy("database is locked".into()).into();
        assert!(matches!(api_err, ApiError::Unavailable(_)));

        let api_err: ApiError =
            RepositoryError::UniqueConstraintViolation("asset_node.external_id".into()).into();
        assert!(matches!(api_err, ApiError::Conflict(ref m) if m.contains("唯一约束")));
    }

    #[test]
    fn test_state_transition_is_preserved() {
        let api_err: ApiError = RepositoryError::InvalidStateTransition {
            from: "completed".into(),
            to: "processing".into(),
        }
        .into();
        assert_eq!(
            api_err.to_string(),
            "无效的状态转换: from=completed to=processing"
        );
    }
}
