//! 事件总线处理器
//!
//! 每类事件注册一个独立命名的处理器，幂等标记和死信记录按处理器名称区分。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use cinetrack_shared::bus::{EventBusBuilder, EventHandler};
use cinetrack_shared::error::Result;
use cinetrack_shared::events::{EventEnvelope, EventKind};

use crate::composer::NotificationComposer;

pub const CATALOG_NOTIFIER: &str = "catalog-notifier";
pub const REVIEW_NOTIFIER: &str = "review-notifier";
pub const MILESTONE_NOTIFIER: &str = "milestone-notifier";

/// 把信封交给编排器处理
pub struct ComposerHandler {
    name: &'static str,
    composer: Arc<NotificationComposer>,
}

impl ComposerHandler {
    pub fn new(name: &'static str, composer: Arc<NotificationComposer>) -> Self {
        Self { name, composer }
    }
}

#[async_trait]
impl EventHandler for ComposerHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        let requests = self
            .composer
            .handle_event(&envelope.event)
            .await
            .map_err(|e| e.into_handler_error(self.name))?;

        debug!(
            handler = self.name,
            event_id = %envelope.event_id,
            notifications = requests.len(),
            "事件处理完成"
        );
        Ok(())
    }
}

/// 注册通知相关的全部订阅
///
/// - 电影上映、剧集更新 -> `catalog-notifier`
/// - 新影评 -> `review-notifier`
/// - 用户行为 -> `milestone-notifier`
pub fn register(builder: EventBusBuilder, composer: Arc<NotificationComposer>) -> EventBusBuilder {
    builder
        .subscribe_all(
            &[EventKind::MovieReleased, EventKind::SeriesUpdated],
            Arc::new(ComposerHandler::new(CATALOG_NOTIFIER, composer.clone())),
        )
        .subscribe(
            EventKind::ReviewCreated,
            Arc::new(ComposerHandler::new(REVIEW_NOTIFIER, composer.clone())),
        )
        .subscribe(
            EventKind::UserActivity,
            Arc::new(ComposerHandler::new(MILESTONE_NOTIFIER, composer)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use achievement_service::{
        AchievementChecker, AchievementDefinition, AchievementError, AchievementType,
        UnlockFailure, UnlockReport,
    };
    use cinetrack_shared::bus::{EventBus, EventPublisher};
    use cinetrack_shared::config::EventBusConfig;
    use cinetrack_shared::events::{
        DomainEvent, ItemType, NotificationCategory, ReviewRef, triggers,
    };
    use cinetrack_shared::retry::RetryPolicy;

    use crate::composer::AudienceLookup;
    use crate::dispatch::MemoryDispatch;
    use crate::error::NotificationError;

    /// 收藏受众首次查询超时，之后正常
    #[derive(Default)]
    struct FlakyFavorites {
        favorite_calls: AtomicU32,
    }

    #[async_trait]
    impl AudienceLookup for FlakyFavorites {
        async fn watchlist_holders(&self, _item_id: &str) -> crate::error::Result<Vec<String>> {
            Ok(vec!["u-a".to_string()])
        }

        async fn favorite_holders(&self, item_id: &str) -> crate::error::Result<Vec<String>> {
            if self.favorite_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(NotificationError::AudienceLookup {
                    item_id: item_id.to_string(),
                    reason: "连接池超时".to_string(),
                    retryable: true,
                });
            }
            Ok(vec!["u-b".to_string()])
        }
    }

    /// 首次评估：观看类解锁、影评类进度超时；之后：影评类解锁
    #[derive(Default)]
    struct RecoveringChecker {
        calls: AtomicU32,
    }

    #[async_trait]
    impl AchievementChecker for RecoveringChecker {
        async fn evaluate(
            &self,
            user_id: &str,
            trigger: &str,
        ) -> achievement_service::Result<UnlockReport> {
            let first = self.calls.fetch_add(1, Ordering::SeqCst) == 0;
            let (unlocked, failures) = if first {
                (
                    vec![AchievementDefinition::new(
                        1,
                        "FIRST_WATCH",
                        "初次观影",
                        AchievementType::WatchCount,
                        1,
                    )],
                    vec![UnlockFailure {
                        achievement_type: AchievementType::ReviewCount,
                        achievement_id: None,
                        error: AchievementError::Progress {
                            achievement_type: AchievementType::ReviewCount,
                            message: "连接池超时".to_string(),
                        },
                    }],
                )
            } else {
                (
                    vec![AchievementDefinition::new(
                        4,
                        "FIRST_REVIEW",
                        "初试啼声",
                        AchievementType::ReviewCount,
                        1,
                    )],
                    Vec::new(),
                )
            };
            Ok(UnlockReport {
                user_id: user_id.to_string(),
                trigger: trigger.to_string(),
                unlocked,
                failures,
            })
        }
    }

    fn bus_with(
        audience: Arc<dyn AudienceLookup>,
        checker: Arc<dyn AchievementChecker>,
        dispatch: Arc<MemoryDispatch>,
    ) -> EventBus {
        let composer = Arc::new(NotificationComposer::new(audience, checker, dispatch));
        let builder = EventBus::builder(EventBusConfig {
            queue_capacity: 16,
            workers_per_kind: 1,
            ..Default::default()
        })
        .retry_policy(RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            multiplier: 2.0,
        });
        register(builder, composer).build()
    }

    #[tokio::test]
    async fn test_review_retry_does_not_duplicate_watchlist_notification() {
        let dispatch = Arc::new(MemoryDispatch::new());
        let bus = bus_with(
            Arc::new(FlakyFavorites::default()),
            Arc::new(RecoveringChecker::default()),
            dispatch.clone(),
        );

        bus.publish(DomainEvent::ReviewCreated {
            review: ReviewRef {
                id: "r-1".to_string(),
                user_id: "u-r".to_string(),
                item_id: "m-1".to_string(),
                item_type: ItemType::Movie,
                rating: Some(9),
            },
            item_title: "沙丘".to_string(),
            item_type: ItemType::Movie,
        })
        .await
        .unwrap();
        bus.wait_idle().await;

        let to_a = dispatch.sent_to("u-a");
        assert_eq!(to_a.len(), 1);
        assert_eq!(to_a[0].category, NotificationCategory::WatchlistReview);
        let to_b = dispatch.sent_to("u-b");
        assert_eq!(to_b.len(), 1);
        assert_eq!(to_b[0].category, NotificationCategory::FavoriteReview);
        assert!(bus.dead_letters().is_empty());
        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_partial_milestone_failure_is_retried_until_complete() {
        let dispatch = Arc::new(MemoryDispatch::new());
        let checker = Arc::new(RecoveringChecker::default());
        let bus = bus_with(
            Arc::new(FlakyFavorites::default()),
            checker.clone(),
            dispatch.clone(),
        );

        bus.publish(DomainEvent::user_activity("u-1", triggers::MILESTONE_CHECK))
            .await
            .unwrap();
        bus.wait_idle().await;

        assert_eq!(checker.calls.load(Ordering::SeqCst), 2);
        let codes: Vec<_> = dispatch
            .sent_to("u-1")
            .iter()
            .map(|r| r.metadata["code"].clone())
            .collect();
        assert_eq!(
            codes,
            vec![serde_json::json!("FIRST_WATCH"), serde_json::json!("FIRST_REVIEW")]
        );
        assert!(bus.dead_letters().is_empty());
        bus.shutdown().await;
    }
}
