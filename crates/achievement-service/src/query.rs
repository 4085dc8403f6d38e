//! 用户成就查询服务
//!
//! 只读查询与展示开关。展示开关只允许作用于已解锁的成就。

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::error::{AchievementError, Result};
use crate::models::{AchievementProgress, AchievementType, UserAchievementRecord};
use crate::progress::ProgressProvider;
use crate::repository::{AchievementRepositoryTrait, UserAchievementRepositoryTrait};

pub struct AchievementQueryService<AR, UAR, P>
where
    AR: AchievementRepositoryTrait,
    UAR: UserAchievementRepositoryTrait,
    P: ProgressProvider + ?Sized,
{
    achievement_repo: Arc<AR>,
    user_achievement_repo: Arc<UAR>,
    progress: Arc<P>,
}

impl<AR, UAR, P> AchievementQueryService<AR, UAR, P>
where
    AR: AchievementRepositoryTrait,
    UAR: UserAchievementRepositoryTrait,
    P: ProgressProvider + ?Sized,
{
    pub fn new(achievement_repo: Arc<AR>, user_achievement_repo: Arc<UAR>, progress: Arc<P>) -> Self {
        Self {
            achievement_repo,
            user_achievement_repo,
            progress,
        }
    }

    /// 全部记录，已解锁按时间倒序在前
    pub async fn list_user_achievements(&self, user_id: &str) -> Result<Vec<UserAchievementRecord>> {
        self.user_achievement_repo.find_by_user(user_id).await
    }

    pub async fn list_unlocked(&self, user_id: &str) -> Result<Vec<UserAchievementRecord>> {
        self.user_achievement_repo.find_unlocked_by_user(user_id).await
    }

    pub async fn list_locked(&self, user_id: &str) -> Result<Vec<UserAchievementRecord>> {
        self.user_achievement_repo.find_locked_by_user(user_id).await
    }

    pub async fn list_displayed(&self, user_id: &str) -> Result<Vec<UserAchievementRecord>> {
        self.user_achievement_repo.find_displayed_by_user(user_id).await
    }

    pub async fn count_unlocked(&self, user_id: &str) -> Result<i64> {
        self.user_achievement_repo.count_unlocked_by_user(user_id).await
    }

    pub async fn get_user_achievement(
        &self,
        user_id: &str,
        achievement_id: i64,
    ) -> Result<UserAchievementRecord> {
        self.user_achievement_repo
            .find_one(user_id, achievement_id)
            .await?
            .ok_or_else(|| AchievementError::RecordNotFound {
                user_id: user_id.to_string(),
                achievement_id,
            })
    }

    /// 设置展示标记
    ///
    /// 未解锁的成就不能设为展示，取消展示不受限制
    #[instrument(skip(self))]
    pub async fn set_displayed(
        &self,
        user_id: &str,
        achievement_id: i64,
        displayed: bool,
    ) -> Result<UserAchievementRecord> {
        let record = self.get_user_achievement(user_id, achievement_id).await?;
        if displayed && !record.is_unlocked() {
            return Err(AchievementError::NotUnlocked {
                user_id: user_id.to_string(),
                achievement_id,
            });
        }

        let updated = self
            .user_achievement_repo
            .set_displayed(user_id, achievement_id, displayed)
            .await?
            .ok_or_else(|| AchievementError::RecordNotFound {
                user_id: user_id.to_string(),
                achievement_id,
            })?;

        info!(user_id = %user_id, achievement_id, displayed, "成就展示状态已更新");
        Ok(updated)
    }

    /// 所有启用成就的进度概览
    ///
    /// 每个类型只查询一次进度；顺序与定义仓储一致
    #[instrument(skip(self))]
    pub async fn progress_overview(&self, user_id: &str) -> Result<Vec<AchievementProgress>> {
        let definitions = self.achievement_repo.find_all_active().await?;
        let records: HashMap<i64, UserAchievementRecord> = self
            .user_achievement_repo
            .find_by_user(user_id)
            .await?
            .into_iter()
            .map(|r| (r.achievement_id, r))
            .collect();

        let mut progress_by_type: HashMap<AchievementType, i64> = HashMap::new();
        let mut overview = Vec::with_capacity(definitions.len());

        for definition in definitions {
            let progress = match progress_by_type.get(&definition.achievement_type) {
                Some(p) => *p,
                None => {
                    let p = self
                        .progress
                        .progress(user_id, definition.achievement_type)
                        .await?;
                    progress_by_type.insert(definition.achievement_type, p);
                    p
                }
            };

            let record = records.get(&definition.id);
            overview.push(AchievementProgress {
                progress,
                unlocked_at: record.and_then(|r| r.unlocked_at),
                is_displayed: record.is_some_and(|r| r.is_displayed),
                definition,
            });
        }

        Ok(overview)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AchievementDefinition;
    use crate::progress::StaticProgress;
    use crate::repository::{MemoryAchievementRepository, MemoryUserAchievementRepository};
    use chrono::Utc;

    fn setup() -> (
        AchievementQueryService<
            MemoryAchievementRepository,
            MemoryUserAchievementRepository,
            StaticProgress,
        >,
        Arc<MemoryUserAchievementRepository>,
        Arc<StaticProgress>,
    ) {
        let achievements = Arc::new(MemoryAchievementRepository::new());
        achievements.insert_many([
            AchievementDefinition::new(1, "WATCH_1", "第一部", AchievementType::WatchCount, 1),
            AchievementDefinition::new(2, "WATCH_10", "十部片", AchievementType::WatchCount, 10),
            AchievementDefinition::new(3, "FAV_3", "心头好", AchievementType::FavoriteCount, 3),
        ]);
        let records = Arc::new(MemoryUserAchievementRepository::new());
        let progress = Arc::new(StaticProgress::new());
        let service = AchievementQueryService::new(achievements, records.clone(), progress.clone());
        (service, records, progress)
    }

    #[tokio::test]
    async fn test_display_requires_unlock() {
        let (service, records, _) = setup();
        records.ensure_tracked("u-1", &[2]).await.unwrap();
        records.unlock("u-1", 1, Utc::now()).await.unwrap();

        let err = service.set_displayed("u-1", 2, true).await.unwrap_err();
        assert!(matches!(err, AchievementError::NotUnlocked { .. }));

        let shown = service.set_displayed("u-1", 1, true).await.unwrap();
        assert!(shown.is_displayed);
        assert_eq!(service.list_displayed("u-1").await.unwrap().len(), 1);

        // 取消展示未解锁记录是允许的
        let hidden = service.set_displayed("u-1", 2, false).await.unwrap();
        assert!(!hidden.is_displayed);
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let (service, _, _) = setup();
        let err = service.get_user_achievement("u-1", 99).await.unwrap_err();
        assert_eq!(err.error_code(), "USER_ACHIEVEMENT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_progress_overview() {
        let (service, records, progress) = setup();
        progress.set("u-1", AchievementType::WatchCount, 4);
        records.unlock("u-1", 1, Utc::now()).await.unwrap();

        let overview = service.progress_overview("u-1").await.unwrap();
        assert_eq!(overview.len(), 3);

        let watch_10 = overview.iter().find(|p| p.definition.id == 2).unwrap();
        assert_eq!(watch_10.progress, 4);
        assert_eq!(watch_10.percent(), 40);
        assert!(watch_10.unlocked_at.is_none());

        let watch_1 = overview.iter().find(|p| p.definition.id == 1).unwrap();
        assert!(watch_1.unlocked_at.is_some());

        let fav = overview.iter().find(|p| p.definition.id == 3).unwrap();
        assert_eq!(fav.progress, 0);
    }

    #[tokio::test]
    async fn test_counts_and_lists() {
        let (service, records, _) = setup();
        records.ensure_tracked("u-1", &[2, 3]).await.unwrap();
        records.unlock("u-1", 1, Utc::now()).await.unwrap();

        assert_eq!(service.count_unlocked("u-1").await.unwrap(), 1);
        assert_eq!(service.list_unlocked("u-1").await.unwrap().len(), 1);
        assert_eq!(service.list_locked("u-1").await.unwrap().len(), 2);
        let all = service.list_user_achievements("u-1").await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].achievement_id, 1);
    }
}
