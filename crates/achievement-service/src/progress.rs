//! 用户进度来源
//!
//! 进度是外部聚合值（观看数、影评数等），由库服务等协作方提供。
//! 规则引擎每次评估对每个类型只查询一次。

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::models::AchievementType;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressProvider: Send + Sync {
    /// 用户在某成就类型上的当前计数
    async fn progress(&self, user_id: &str, achievement_type: AchievementType) -> Result<i64>;
}

/// 固定进度表，开发环境和测试使用
#[derive(Default)]
pub struct StaticProgress {
    values: DashMap<(String, AchievementType), i64>,
}

impl StaticProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user_id: &str, achievement_type: AchievementType, value: i64) {
        self.values
            .insert((user_id.to_string(), achievement_type), value);
    }

    pub fn increment(&self, user_id: &str, achievement_type: AchievementType) -> i64 {
        let mut entry = self
            .values
            .entry((user_id.to_string(), achievement_type))
            .or_insert(0);
        *entry += 1;
        *entry
    }

    /// 用户所有类型的进度快照
    pub fn snapshot(&self, user_id: &str) -> HashMap<AchievementType, i64> {
        self.values
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| (entry.key().1, *entry.value()))
            .collect()
    }
}

#[async_trait]
impl ProgressProvider for StaticProgress {
    async fn progress(&self, user_id: &str, achievement_type: AchievementType) -> Result<i64> {
        Ok(self
            .values
            .get(&(user_id.to_string(), achievement_type))
            .map(|v| *v)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_progress_defaults_to_zero() {
        let progress = StaticProgress::new();
        assert_eq!(
            progress.progress("u-1", AchievementType::WatchCount).await.unwrap(),
            0
        );

        progress.set("u-1", AchievementType::WatchCount, 4);
        assert_eq!(progress.increment("u-1", AchievementType::WatchCount), 5);
        assert_eq!(
            progress.progress("u-1", AchievementType::WatchCount).await.unwrap(),
            5
        );
        assert_eq!(progress.snapshot("u-1").len(), 1);
    }
}
