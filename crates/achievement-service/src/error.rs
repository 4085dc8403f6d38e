//! 成就服务错误类型

use cinetrack_shared::error::CineError;
use thiserror::Error;

use crate::models::AchievementType;

#[derive(Debug, Error)]
pub enum AchievementError {
    // === 成就相关错误 ===
    #[error("成就定义不存在: {0}")]
    DefinitionNotFound(i64),

    #[error("用户成就记录不存在: user_id={user_id}, achievement_id={achievement_id}")]
    RecordNotFound {
        user_id: String,
        achievement_id: i64,
    },

    #[error("成就尚未解锁，不能展示: user_id={user_id}, achievement_id={achievement_id}")]
    NotUnlocked {
        user_id: String,
        achievement_id: i64,
    },

    #[error("用户进度查询失败: type={achievement_type}, {message}")]
    Progress {
        achievement_type: AchievementType,
        message: String,
    },

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AchievementError>;

impl AchievementError {
    /// 进度来源和数据库故障视为瞬时错误
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Progress { .. })
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DefinitionNotFound(_) => "ACHIEVEMENT_NOT_FOUND",
            Self::RecordNotFound { .. } => "USER_ACHIEVEMENT_NOT_FOUND",
            Self::NotUnlocked { .. } => "ACHIEVEMENT_NOT_UNLOCKED",
            Self::Progress { .. } => "PROGRESS_UNAVAILABLE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<AchievementError> for CineError {
    fn from(err: AchievementError) -> Self {
        match err {
            AchievementError::DefinitionNotFound(id) => CineError::NotFound {
                entity: "Achievement".to_string(),
                id: id.to_string(),
            },
            AchievementError::RecordNotFound {
                user_id,
                achievement_id,
            } => CineError::NotFound {
                entity: "UserAchievement".to_string(),
                id: format!("{user_id}/{achievement_id}"),
            },
            AchievementError::Database(e) => CineError::Database(e),
            AchievementError::Validation(msg) => CineError::Validation(msg),
            e @ AchievementError::NotUnlocked { .. } => CineError::Validation(e.to_string()),
            e @ AchievementError::Progress { .. } => CineError::ExternalService {
                service: "progress".to_string(),
                message: e.to_string(),
            },
            AchievementError::Internal(msg) => CineError::Internal(msg),
        }
    }
}
