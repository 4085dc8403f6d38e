//! 成就规则引擎
//!
//! 输入 `(user_id, trigger)`，输出本次新解锁的成就定义。
//!
//! ## 评估流程
//!
//! 1. 通过 `TriggerMapping` 确定需要评估的成就类型（声明顺序）
//! 2. 每个类型查询一次用户进度
//! 3. 取出阈值不超过进度的启用定义（阈值升序），逐个以 compare-and-set 方式解锁
//! 4. 阈值高于进度的定义惰性创建未解锁的追踪记录
//!
//! 单个定义的解锁失败只记录在 `UnlockReport` 中，不影响其他定义。
//! 已解锁的记录再次评估时是空操作，因此重复触发不会产生重复解锁。

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use cinetrack_shared::observability::metrics;

use crate::error::{AchievementError, Result};
use crate::models::{AchievementDefinition, AchievementType};
use crate::progress::ProgressProvider;
use crate::repository::{AchievementRepositoryTrait, UserAchievementRepositoryTrait};
use crate::trigger::TriggerMapping;

/// 评估过程中的单项失败
#[derive(Debug)]
pub struct UnlockFailure {
    pub achievement_type: AchievementType,
    /// 为空表示整个类型评估失败（进度或定义查询失败）
    pub achievement_id: Option<i64>,
    pub error: AchievementError,
}

/// 一次评估的完整结果
#[derive(Debug)]
pub struct UnlockReport {
    pub user_id: String,
    pub trigger: String,
    /// 新解锁的定义，类型按声明顺序、类型内阈值升序
    pub unlocked: Vec<AchievementDefinition>,
    pub failures: Vec<UnlockFailure>,
}

impl UnlockReport {
    fn new(user_id: &str, trigger: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            trigger: trigger.to_string(),
            unlocked: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn has_retryable_failures(&self) -> bool {
        self.failures.iter().any(|f| f.error.is_retryable())
    }

    /// 取出第一个可重试失败的错误
    ///
    /// 已解锁的定义重跑时是空操作，调用方可以先处理 `unlocked` 再整体重试
    pub fn take_retryable_failure(&mut self) -> Option<AchievementError> {
        let pos = self.failures.iter().position(|f| f.error.is_retryable())?;
        Some(self.failures.swap_remove(pos).error)
    }

    /// 没有任何新解锁且存在可重试失败时，把第一个可重试错误交给调用方重试
    pub fn into_result(mut self) -> Result<Vec<AchievementDefinition>> {
        if self.unlocked.is_empty()
            && let Some(error) = self.take_retryable_failure()
        {
            return Err(error);
        }
        Ok(self.unlocked)
    }
}

/// 成就检查接口
///
/// 通知组件只依赖此 trait，不关心引擎的仓储实现
#[async_trait]
pub trait AchievementChecker: Send + Sync {
    /// 评估并返回完整报告，包含新解锁的定义和单项失败
    async fn evaluate(&self, user_id: &str, trigger: &str) -> Result<UnlockReport>;

    /// 只返回新解锁的定义，规则见 `UnlockReport::into_result`
    async fn check_and_unlock(
        &self,
        user_id: &str,
        trigger: &str,
    ) -> Result<Vec<AchievementDefinition>> {
        self.evaluate(user_id, trigger).await?.into_result()
    }
}

/// 成就规则引擎
pub struct AchievementEngine<AR, UAR, P>
where
    AR: AchievementRepositoryTrait,
    UAR: UserAchievementRepositoryTrait,
    P: ProgressProvider + ?Sized,
{
    achievement_repo: Arc<AR>,
    user_achievement_repo: Arc<UAR>,
    progress: Arc<P>,
    mapping: Arc<TriggerMapping>,
}

impl<AR, UAR, P> AchievementEngine<AR, UAR, P>
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
            mapping: Arc::new(TriggerMapping::with_defaults()),
        }
    }

    pub fn with_mapping(mut self, mapping: Arc<TriggerMapping>) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn mapping(&self) -> &TriggerMapping {
        &self.mapping
    }

    async fn evaluate_type(
        &self,
        user_id: &str,
        achievement_type: AchievementType,
        report: &mut UnlockReport,
    ) -> Result<()> {
        let progress = self.progress.progress(user_id, achievement_type).await?;

        let eligible = self
            .achievement_repo
            .find_active_with_threshold_at_most(progress, achievement_type)
            .await?;

        debug!(
            achievement_type = %achievement_type,
            progress,
            eligible = eligible.len(),
            "成就类型进度"
        );

        for definition in eligible {
            match self
                .user_achievement_repo
                .unlock(user_id, definition.id, Utc::now())
                .await
            {
                Ok(Some(_)) => {
                    info!(
                        achievement_id = definition.id,
                        code = %definition.code,
                        threshold = definition.threshold,
                        progress,
                        "成就已解锁"
                    );
                    report.unlocked.push(definition);
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        achievement_id = definition.id,
                        error = %error,
                        "成就解锁失败"
                    );
                    report.failures.push(UnlockFailure {
                        achievement_type,
                        achievement_id: Some(definition.id),
                        error,
                    });
                }
            }
        }

        self.track_pending(user_id, achievement_type, progress).await;
        Ok(())
    }

    /// 为尚未达到阈值的定义建立追踪记录，失败只记日志
    async fn track_pending(&self, user_id: &str, achievement_type: AchievementType, progress: i64) {
        let pending: Vec<i64> = match self
            .achievement_repo
            .find_active_by_type(achievement_type)
            .await
        {
            Ok(defs) => defs
                .into_iter()
                .filter(|d| !d.is_reached_by(progress))
                .map(|d| d.id)
                .collect(),
            Err(e) => {
                warn!(achievement_type = %achievement_type, error = %e, "查询待追踪成就失败");
                return;
            }
        };

        if pending.is_empty() {
            return;
        }
        if let Err(e) = self
            .user_achievement_repo
            .ensure_tracked(user_id, &pending)
            .await
        {
            warn!(
                achievement_type = %achievement_type,
                pending = pending.len(),
                error = %e,
                "成就追踪记录写入失败"
            );
        }
    }
}

#[async_trait]
impl<AR, UAR, P> AchievementChecker for AchievementEngine<AR, UAR, P>
where
    AR: AchievementRepositoryTrait,
    UAR: UserAchievementRepositoryTrait,
    P: ProgressProvider + ?Sized,
{
    #[instrument(skip(self), fields(user_id = %user_id, trigger = %trigger))]
    async fn evaluate(&self, user_id: &str, trigger: &str) -> Result<UnlockReport> {
        if user_id.trim().is_empty() {
            return Err(AchievementError::Validation("user_id 不能为空".to_string()));
        }

        let start = Instant::now();
        let mut report = UnlockReport::new(user_id, trigger);

        for achievement_type in self.mapping.types_for(trigger) {
            if let Err(error) = self
                .evaluate_type(user_id, achievement_type, &mut report)
                .await
            {
                warn!(
                    achievement_type = %achievement_type,
                    error = %error,
                    "成就类型评估失败"
                );
                report.failures.push(UnlockFailure {
                    achievement_type,
                    achievement_id: None,
                    error,
                });
            }
        }

        metrics::record_achievement_evaluation(
            trigger,
            report.unlocked.len(),
            start.elapsed().as_secs_f64(),
        );

        if !report.unlocked.is_empty() {
            info!(
                unlocked = report.unlocked.len(),
                failures = report.failures.len(),
                "成就解锁完成"
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserAchievementRecord;
    use crate::progress::MockProgressProvider;
    use crate::repository::{MockAchievementRepositoryTrait, MockUserAchievementRepositoryTrait};
    use cinetrack_shared::events::triggers;
    use mockall::predicate::*;

    fn review_defs() -> Vec<AchievementDefinition> {
        vec![
            AchievementDefinition::new(1, "REVIEW_1", "初试啼声", AchievementType::ReviewCount, 1),
            AchievementDefinition::new(2, "REVIEW_5", "影评新秀", AchievementType::ReviewCount, 5),
            AchievementDefinition::new(3, "REVIEW_20", "资深影评人", AchievementType::ReviewCount, 20),
        ]
    }

    fn unlocked(user_id: &str, achievement_id: i64) -> UserAchievementRecord {
        UserAchievementRecord {
            unlocked_at: Some(Utc::now()),
            ..UserAchievementRecord::tracked(user_id, achievement_id)
        }
    }

    fn engine(
        achievements: MockAchievementRepositoryTrait,
        user_achievements: MockUserAchievementRepositoryTrait,
        progress: MockProgressProvider,
    ) -> AchievementEngine<
        MockAchievementRepositoryTrait,
        MockUserAchievementRepositoryTrait,
        MockProgressProvider,
    > {
        AchievementEngine::new(
            Arc::new(achievements),
            Arc::new(user_achievements),
            Arc::new(progress),
        )
    }

    #[tokio::test]
    async fn test_unlocks_eligible_and_tracks_the_rest() {
        let mut progress = MockProgressProvider::new();
        progress
            .expect_progress()
            .with(eq("u-1"), eq(AchievementType::ReviewCount))
            .times(1)
            .returning(|_, _| Ok(6));

        let mut achievements = MockAchievementRepositoryTrait::new();
        achievements
            .expect_find_active_with_threshold_at_most()
            .with(eq(6i64), eq(AchievementType::ReviewCount))
            .returning(|_, _| Ok(review_defs().into_iter().take(2).collect()));
        achievements
            .expect_find_active_by_type()
            .returning(|_| Ok(review_defs()));

        let mut user_achievements = MockUserAchievementRepositoryTrait::new();
        user_achievements
            .expect_unlock()
            .withf(|_, id, _| *id == 1)
            .returning(|u, id, _| Ok(Some(unlocked(u, id))));
        // 2 号之前已经解锁
        user_achievements
            .expect_unlock()
            .withf(|_, id, _| *id == 2)
            .returning(|_, _, _| Ok(None));
        user_achievements
            .expect_ensure_tracked()
            .withf(|user, ids| user.to_string() == "u-1" && ids.len() == 1 && ids[0] == 3)
            .times(1)
            .returning(|_, _| Ok(()));

        let engine = engine(achievements, user_achievements, progress);
        let unlocked = engine
            .check_and_unlock("u-1", triggers::REVIEW_SUBMITTED)
            .await
            .unwrap();

        assert_eq!(unlocked.len(), 1);
        assert_eq!(unlocked[0].code, "REVIEW_1");
    }

    #[tokio::test]
    async fn test_single_unlock_failure_does_not_block_others() {
        let mut progress = MockProgressProvider::new();
        progress.expect_progress().returning(|_, _| Ok(30));

        let mut achievements = MockAchievementRepositoryTrait::new();
        achievements
            .expect_find_active_with_threshold_at_most()
            .returning(|_, _| Ok(review_defs()));
        achievements
            .expect_find_active_by_type()
            .returning(|_| Ok(review_defs()));

        let mut user_achievements = MockUserAchievementRepositoryTrait::new();
        user_achievements
            .expect_unlock()
            .withf(|_, id, _| *id == 2)
            .returning(|_, _, _| Err(AchievementError::Database(sqlx::Error::PoolTimedOut)));
        user_achievements
            .expect_unlock()
            .withf(|_, id, _| *id != 2)
            .returning(|u, id, _| Ok(Some(unlocked(u, id))));

        let engine = engine(achievements, user_achievements, progress);
        let report = engine
            .evaluate("u-1", triggers::REVIEW_SUBMITTED)
            .await
            .unwrap();

        let codes: Vec<_> = report.unlocked.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["REVIEW_1", "REVIEW_20"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].achievement_id, Some(2));
        assert!(report.has_retryable_failures());

        // 有新解锁时失败不向上传播
        assert_eq!(report.into_result().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_partial_unlock_keeps_retryable_type_failure() {
        let mut progress = MockProgressProvider::new();
        progress
            .expect_progress()
            .withf(|_, t| *t == AchievementType::ReviewCount)
            .returning(|_, t| {
                Err(AchievementError::Progress {
                    achievement_type: t,
                    message: "连接池超时".to_string(),
                })
            });
        progress
            .expect_progress()
            .withf(|_, t| *t != AchievementType::ReviewCount)
            .returning(|_, _| Ok(1));

        let mut achievements = MockAchievementRepositoryTrait::new();
        achievements
            .expect_find_active_with_threshold_at_most()
            .returning(|_, t| {
                Ok(if t == AchievementType::WatchCount {
                    vec![AchievementDefinition::new(
                        9,
                        "FIRST_WATCH",
                        "初次观影",
                        AchievementType::WatchCount,
                        1,
                    )]
                } else {
                    vec![]
                })
            });
        achievements
            .expect_find_active_by_type()
            .returning(|_| Ok(vec![]));

        let mut user_achievements = MockUserAchievementRepositoryTrait::new();
        user_achievements
            .expect_unlock()
            .returning(|u, id, _| Ok(Some(unlocked(u, id))));

        let engine = engine(achievements, user_achievements, progress);
        let mut report = engine
            .evaluate("u-1", triggers::MILESTONE_CHECK)
            .await
            .unwrap();

        assert_eq!(report.unlocked.len(), 1);
        assert_eq!(report.failures[0].achievement_type, AchievementType::ReviewCount);
        assert_eq!(report.failures[0].achievement_id, None);

        let error = report.take_retryable_failure().unwrap();
        assert_eq!(error.error_code(), "PROGRESS_UNAVAILABLE");
        assert!(!report.has_retryable_failures());
    }

    #[tokio::test]
    async fn test_progress_failure_surfaces_as_retryable_error() {
        let mut progress = MockProgressProvider::new();
        progress.expect_progress().returning(|_, t| {
            Err(AchievementError::Progress {
                achievement_type: t,
                message: "library unavailable".to_string(),
            })
        });

        let achievements = MockAchievementRepositoryTrait::new();
        let user_achievements = MockUserAchievementRepositoryTrait::new();

        let engine = engine(achievements, user_achievements, progress);
        let err = engine
            .check_and_unlock("u-1", triggers::ITEM_WATCHED)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(err.error_code(), "PROGRESS_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_milestone_check_evaluates_every_type() {
        let mut progress = MockProgressProvider::new();
        progress.expect_progress().times(4).returning(|_, _| Ok(0));

        let mut achievements = MockAchievementRepositoryTrait::new();
        achievements
            .expect_find_active_with_threshold_at_most()
            .times(4)
            .returning(|_, _| Ok(vec![]));
        achievements
            .expect_find_active_by_type()
            .times(4)
            .returning(|_| Ok(vec![]));

        let user_achievements = MockUserAchievementRepositoryTrait::new();

        let engine = engine(achievements, user_achievements, progress);
        let unlocked = engine
            .check_and_unlock("u-1", triggers::MILESTONE_CHECK)
            .await
            .unwrap();
        assert!(unlocked.is_empty());
    }

    #[tokio::test]
    async fn test_empty_user_id_rejected() {
        let engine = engine(
            MockAchievementRepositoryTrait::new(),
            MockUserAchievementRepositoryTrait::new(),
            MockProgressProvider::new(),
        );

        let err = engine
            .check_and_unlock("  ", triggers::REVIEW_SUBMITTED)
            .await
            .unwrap_err();
        assert!(matches!(err, AchievementError::Validation(_)));
    }
}
