//! 通知服务错误类型
//!
//! 区分受众查询、成就评估和投递几类故障，事件总线据 `is_retryable`
//! 决定重试还是写入死信。

use achievement_service::AchievementError;
use cinetrack_shared::error::CineError;
use library_service::LibraryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("受众查询失败: item_id={item_id}, 原因={reason}")]
    AudienceLookup {
        item_id: String,
        reason: String,
        retryable: bool,
    },

    #[error("通知投递失败: notification_id={notification_id}, 原因={reason}")]
    DispatchFailed {
        notification_id: String,
        reason: String,
    },

    #[error("通知投递队列已关闭")]
    DispatchClosed,

    #[error("通知投递过载: 队列与溢出等待均已满 (上限 {limit})")]
    DispatchOverloaded { limit: usize },

    #[error(transparent)]
    Achievement(#[from] AchievementError),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Shared(#[from] CineError),
}

pub type Result<T> = std::result::Result<T, NotificationError>;

impl NotificationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AudienceLookup { .. } => "AUDIENCE_LOOKUP_FAILED",
            Self::DispatchFailed { .. } => "DISPATCH_FAILED",
            Self::DispatchClosed => "DISPATCH_CLOSED",
            Self::DispatchOverloaded { .. } => "DISPATCH_OVERLOADED",
            Self::Achievement(e) => e.error_code(),
            Self::Database(_) => "DATABASE_ERROR",
            Self::Shared(e) => e.code(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AudienceLookup { retryable, .. } => *retryable,
            Self::DispatchFailed { .. } | Self::DispatchOverloaded { .. } | Self::Database(_) => true,
            Self::DispatchClosed => false,
            Self::Achievement(e) => e.is_retryable(),
            Self::Shared(e) => e.is_retryable(),
        }
    }

    /// 转换为总线处理器错误，保留可重试标记
    pub fn into_handler_error(self, handler: &str) -> CineError {
        CineError::Handler {
            handler: handler.to_string(),
            retryable: self.is_retryable(),
            message: self.to_string(),
        }
    }

    pub(crate) fn audience(item_id: &str, err: LibraryError) -> Self {
        Self::AudienceLookup {
            item_id: item_id.to_string(),
            retryable: err.is_retryable(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NotificationError::DispatchFailed {
            notification_id: "n-1".to_string(),
            reason: "连接断开".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "通知投递失败: notification_id=n-1, 原因=连接断开"
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_audience_retryability_follows_library_error() {
        let transient =
            NotificationError::audience("m-1", LibraryError::Database(sqlx::Error::PoolTimedOut));
        assert!(transient.is_retryable());

        let permanent = NotificationError::audience("m-1", LibraryError::Internal("坏数据".into()));
        assert!(!permanent.is_retryable());
    }

    #[test]
    fn test_into_handler_error_keeps_retryable_flag() {
        let err = NotificationError::Achievement(AchievementError::Validation("空用户".into()))
            .into_handler_error("milestone-notifier");

        match err {
            CineError::Handler {
                handler, retryable, ..
            } => {
                assert_eq!(handler, "milestone-notifier");
                assert!(!retryable);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
