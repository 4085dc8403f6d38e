//! 片库服务错误类型

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use cinetrack_shared::error::CineError;

#[derive(Debug, Error)]
pub enum LibraryError {
    // === 冲突 ===
    #[error("条目已在待看清单中: user_id={user_id}, item_id={item_id}")]
    AlreadyInWatchlist { user_id: String, item_id: String },

    #[error("条目已收藏: user_id={user_id}, item_id={item_id}")]
    AlreadyFavorited { user_id: String, item_id: String },

    #[error("已发表过影评: user_id={user_id}, item_id={item_id}")]
    AlreadyReviewed { user_id: String, item_id: String },

    // === 不存在 ===
    #[error("条目不在待看清单中: user_id={user_id}, item_id={item_id}")]
    NotInWatchlist { user_id: String, item_id: String },

    #[error("条目未收藏: user_id={user_id}, item_id={item_id}")]
    NotFavorited { user_id: String, item_id: String },

    // === 系统错误 ===
    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LibraryError>;

impl LibraryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AlreadyInWatchlist { .. }
            | Self::AlreadyFavorited { .. }
            | Self::AlreadyReviewed { .. } => StatusCode::CONFLICT,
            Self::NotInWatchlist { .. } | Self::NotFavorited { .. } => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyInWatchlist { .. } => "ALREADY_IN_WATCHLIST",
            Self::AlreadyFavorited { .. } => "ALREADY_FAVORITED",
            Self::AlreadyReviewed { .. } => "ALREADY_REVIEWED",
            Self::NotInWatchlist { .. } => "NOT_IN_WATCHLIST",
            Self::NotFavorited { .. } => "NOT_FAVORITED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 冲突和参数错误不可重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl IntoResponse for LibraryError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for LibraryError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<LibraryError> for CineError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::AlreadyInWatchlist { user_id, item_id } => CineError::AlreadyExists {
                entity: "WatchlistItem".to_string(),
                field: "user_id/item_id".to_string(),
                value: format!("{user_id}/{item_id}"),
            },
            LibraryError::AlreadyFavorited { user_id, item_id } => CineError::AlreadyExists {
                entity: "FavoriteItem".to_string(),
                field: "user_id/item_id".to_string(),
                value: format!("{user_id}/{item_id}"),
            },
            LibraryError::AlreadyReviewed { user_id, item_id } => CineError::AlreadyExists {
                entity: "Review".to_string(),
                field: "user_id/item_id".to_string(),
                value: format!("{user_id}/{item_id}"),
            },
            LibraryError::NotInWatchlist { user_id, item_id } => CineError::NotFound {
                entity: "WatchlistItem".to_string(),
                id: format!("{user_id}/{item_id}"),
            },
            LibraryError::NotFavorited { user_id, item_id } => CineError::NotFound {
                entity: "FavoriteItem".to_string(),
                id: format!("{user_id}/{item_id}"),
            },
            LibraryError::Validation(msg) => CineError::Validation(msg),
            LibraryError::Database(e) => CineError::Database(e),
            LibraryError::Internal(msg) => CineError::Internal(msg),
        }
    }
}
