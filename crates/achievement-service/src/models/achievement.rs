//! 成就定义
//!
//! 成就定义是运营侧维护的参考数据，规则引擎只读

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 成就类型
///
/// 每种类型对应用户的一项可计数行为，声明顺序即评估顺序
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AchievementType {
    /// 累计观看数
    WatchCount,
    /// 累计影评数
    ReviewCount,
    /// 待看清单条目数
    WatchlistCount,
    /// 收藏数
    FavoriteCount,
}

impl AchievementType {
    pub const ALL: [AchievementType; 4] = [
        AchievementType::WatchCount,
        AchievementType::ReviewCount,
        AchievementType::WatchlistCount,
        AchievementType::FavoriteCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WatchCount => "WATCH_COUNT",
            Self::ReviewCount => "REVIEW_COUNT",
            Self::WatchlistCount => "WATCHLIST_COUNT",
            Self::FavoriteCount => "FAVORITE_COUNT",
        }
    }
}

impl std::fmt::Display for AchievementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 成就定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AchievementDefinition {
    pub id: i64,
    /// 稳定的业务编码，如 "FIRST_REVIEW"
    pub code: String,
    pub name: String,
    pub description: String,
    pub achievement_type: AchievementType,
    /// 解锁阈值，始终大于 0
    pub threshold: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl AchievementDefinition {
    pub fn new(
        id: i64,
        code: impl Into<String>,
        name: impl Into<String>,
        achievement_type: AchievementType,
        threshold: i64,
    ) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
            description: String::new(),
            achievement_type,
            threshold,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn is_reached_by(&self, progress: i64) -> bool {
        progress >= self.threshold
    }

    /// 评估顺序：类型按声明顺序，类型内阈值升序
    ///
    /// 数据库中类型以 varchar 存储，按字母排序与声明顺序不同，各存储实现统一用此键排序
    pub fn evaluation_key(&self) -> (AchievementType, i64, i64) {
        (self.achievement_type, self.threshold, self.id)
    }
}
