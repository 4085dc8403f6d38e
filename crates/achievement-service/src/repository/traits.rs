//! 仓储 Trait 定义
//!
//! 规则引擎与查询服务只依赖这些接口，PostgreSQL 与内存实现可互换

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{AchievementDefinition, AchievementType, UserAchievementRecord};

/// 成就定义仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AchievementRepositoryTrait: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<AchievementDefinition>>;

    /// 所有启用的定义，按类型、阈值升序
    async fn find_all_active(&self) -> Result<Vec<AchievementDefinition>>;

    /// 某类型下启用的定义，按阈值升序
    async fn find_active_by_type(
        &self,
        achievement_type: AchievementType,
    ) -> Result<Vec<AchievementDefinition>>;

    /// 某类型下阈值不超过 `threshold` 的启用定义，按阈值升序
    async fn find_active_with_threshold_at_most(
        &self,
        threshold: i64,
        achievement_type: AchievementType,
    ) -> Result<Vec<AchievementDefinition>>;
}

/// 用户成就记录仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserAchievementRepositoryTrait: Send + Sync {
    /// 用户全部记录：已解锁的按解锁时间倒序在前，未解锁的在后
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<UserAchievementRecord>>;

    async fn find_unlocked_by_user(&self, user_id: &str) -> Result<Vec<UserAchievementRecord>>;

    async fn find_locked_by_user(&self, user_id: &str) -> Result<Vec<UserAchievementRecord>>;

    async fn find_one(
        &self,
        user_id: &str,
        achievement_id: i64,
    ) -> Result<Option<UserAchievementRecord>>;

    async fn find_displayed_by_user(&self, user_id: &str) -> Result<Vec<UserAchievementRecord>>;

    async fn count_unlocked_by_user(&self, user_id: &str) -> Result<i64>;

    /// 为尚不存在的 (user, achievement) 创建未解锁记录，已存在的保持不变
    async fn ensure_tracked(&self, user_id: &str, achievement_ids: &[i64]) -> Result<()>;

    /// 解锁（compare-and-set）
    ///
    /// 记录不存在时创建并解锁；已存在且未解锁时写入 `unlocked_at`；
    /// 已解锁时不做任何修改并返回 `None`。只有真正完成解锁的调用返回 `Some`。
    async fn unlock(
        &self,
        user_id: &str,
        achievement_id: i64,
        unlocked_at: DateTime<Utc>,
    ) -> Result<Option<UserAchievementRecord>>;

    /// 设置展示标记，记录不存在时返回 `None`
    async fn set_displayed(
        &self,
        user_id: &str,
        achievement_id: i64,
        displayed: bool,
    ) -> Result<Option<UserAchievementRecord>>;
}
