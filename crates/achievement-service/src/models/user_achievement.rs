//! 用户成就记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::achievement::AchievementDefinition;

/// 用户成就记录
///
/// 以 (user_id, achievement_id) 为唯一标识，首次追踪进度时惰性创建。
/// `unlocked_at` 为空表示已追踪但未解锁，一旦写入不再改变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserAchievementRecord {
    pub user_id: String,
    pub achievement_id: i64,
    #[sqlx(default)]
    pub unlocked_at: Option<DateTime<Utc>>,
    /// 用户是否选择在个人主页展示
    pub is_displayed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAchievementRecord {
    /// 未解锁的追踪记录
    pub fn tracked(user_id: impl Into<String>, achievement_id: i64) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            achievement_id,
            unlocked_at: None,
            is_displayed: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked_at.is_some()
    }
}

/// 单个成就的进度概览
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementProgress {
    pub definition: AchievementDefinition,
    /// 当前计数
    pub progress: i64,
    pub unlocked_at: Option<DateTime<Utc>>,
    pub is_displayed: bool,
}

impl AchievementProgress {
    /// 完成百分比，封顶 100
    pub fn percent(&self) -> u8 {
        if self.unlocked_at.is_some() {
            return 100;
        }
        let threshold = self.definition.threshold.max(1);
        ((self.progress.max(0) * 100) / threshold).min(100) as u8
    }
}
