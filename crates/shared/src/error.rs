//! 统一错误处理模块
//!
//! 定义系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。

use axum::http::StatusCode;
use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum CineError {
    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    #[error("记录已存在: {entity} {field}={value}")]
    AlreadyExists {
        entity: String,
        field: String,
        value: String,
    },

    // ==================== 事件总线错误 ====================
    #[error("事件队列已满: {kind}")]
    QueueFull { kind: String },

    #[error("事件总线已关闭")]
    BusClosed,

    #[error("事件处理失败: handler={handler}, {message}")]
    Handler {
        handler: String,
        message: String,
        retryable: bool,
    },

    // ==================== 验证错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("无效的参数: {field} - {message}")]
    InvalidArgument { field: String, message: String },

    // ==================== 外部服务错误 ====================
    #[error("外部服务错误: {service} - {message}")]
    ExternalService { service: String, message: String },

    // ==================== 通用错误 ====================
    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, CineError>;

impl CineError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::QueueFull { .. } => "QUEUE_FULL",
            Self::BusClosed => "BUS_CLOSED",
            Self::Handler { .. } => "HANDLER_FAILED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(_) | Self::QueueFull { .. } | Self::ExternalService { .. } => true,
            Self::Handler { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// 转换为 HTTP 状态码
    ///
    /// 冲突类错误统一映射为 409，与参数校验失败（400）区分
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::AlreadyExists { .. } => StatusCode::CONFLICT,
            Self::Validation(_) | Self::InvalidArgument { .. } | Self::Serialization(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::QueueFull { .. } | Self::BusClosed => StatusCode::SERVICE_UNAVAILABLE,
            Self::ExternalService { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = CineError::NotFound {
            entity: "Movie".to_string(),
            id: "m-1".to_string(),
        };
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(CineError::BusClosed.code(), "BUS_CLOSED");
    }

    #[test]
    fn test_is_retryable() {
        let db_err = CineError::Database(sqlx::Error::PoolTimedOut);
        assert!(db_err.is_retryable());

        let conflict = CineError::AlreadyExists {
            entity: "WatchlistItem".to_string(),
            field: "item_id".to_string(),
            value: "m-1".to_string(),
        };
        assert!(!conflict.is_retryable());

        let handler_err = CineError::Handler {
            handler: "review-notifier".to_string(),
            message: "lookup failed".to_string(),
            retryable: true,
        };
        assert!(handler_err.is_retryable());
    }

    #[test]
    fn test_status_code_mapping() {
        let conflict = CineError::AlreadyExists {
            entity: "WatchlistItem".to_string(),
            field: "item_id".to_string(),
            value: "m-1".to_string(),
        };
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            CineError::Validation("user_id 不能为空".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            CineError::QueueFull {
                kind: "USER_ACTIVITY".to_string()
            }
            .status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
