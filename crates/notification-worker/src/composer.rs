//! 通知编排器
//!
//! 根据领域事件确定受众并生成 `NotificationRequest`，交给投递层后立即返回。
//!
//! - 电影上映、剧集更新：通知想看清单中有该条目的用户
//! - 新影评：通知想看 / 收藏该条目的用户，评论作者本人除外
//! - 用户行为：调用成就引擎，每个新解锁成就通知一次
//!
//! 受众查询失败作为错误返回给事件总线重试；单条投递失败只记录日志。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, instrument, warn};

use achievement_service::AchievementChecker;
use cinetrack_shared::events::{
    DomainEvent, ItemType, MovieRef, NotificationCategory, NotificationRequest, ReviewRef,
    SeriesChange, SeriesRef, SeriesStatus, triggers,
};

use crate::dispatch::NotificationDispatch;
use crate::error::Result;
use crate::templates::{self, Rendered};

/// 受众查询
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudienceLookup: Send + Sync {
    /// 想看清单中包含该条目的用户
    async fn watchlist_holders(&self, item_id: &str) -> Result<Vec<String>>;

    /// 收藏了该条目的用户
    async fn favorite_holders(&self, item_id: &str) -> Result<Vec<String>>;
}

pub struct NotificationComposer {
    audience: Arc<dyn AudienceLookup>,
    achievements: Arc<dyn AchievementChecker>,
    dispatch: Arc<dyn NotificationDispatch>,
}

impl NotificationComposer {
    pub fn new(
        audience: Arc<dyn AudienceLookup>,
        achievements: Arc<dyn AchievementChecker>,
        dispatch: Arc<dyn NotificationDispatch>,
    ) -> Self {
        Self {
            audience,
            achievements,
            dispatch,
        }
    }

    /// 按事件类型分派到具体的编排方法
    pub async fn handle_event(&self, event: &DomainEvent) -> Result<Vec<NotificationRequest>> {
        match event {
            DomainEvent::MovieReleased { movie } => self.notify_movie_watchlist_released(movie).await,
            DomainEvent::SeriesUpdated { series, change } => match change {
                SeriesChange::NewSeason { season } => {
                    self.notify_series_new_season(series, *season).await
                }
                SeriesChange::NewEpisode { season, episode } => {
                    self.notify_series_new_episode(series, *season, *episode)
                        .await
                }
                SeriesChange::StatusChanged { old_status } => {
                    self.notify_series_status_changed(series, *old_status)
                        .await
                }
            },
            DomainEvent::ReviewCreated {
                review,
                item_title,
                item_type,
            } => self.notify_item_reviewed(review, item_title, *item_type).await,
            DomainEvent::UserActivity { user_id, trigger } => {
                self.check_and_notify_milestones_for(user_id, trigger)
                    .await
            }
        }
    }

    // ==================== 目录事件 ====================

    #[instrument(skip(self, movie), fields(movie_id = %movie.id))]
    pub async fn notify_movie_watchlist_released(
        &self,
        movie: &MovieRef,
    ) -> Result<Vec<NotificationRequest>> {
        let rendered = templates::movie_released(movie);
        self.fan_out_watchlist(
            &movie.id,
            ItemType::Movie,
            NotificationCategory::Release,
            rendered,
            None,
        )
        .await
    }

    #[instrument(skip(self, series), fields(series_id = %series.id))]
    pub async fn notify_series_new_season(
        &self,
        series: &SeriesRef,
        season: i32,
    ) -> Result<Vec<NotificationRequest>> {
        let rendered = templates::new_season(series, season);
        self.fan_out_watchlist(
            &series.id,
            ItemType::Series,
            NotificationCategory::NewSeason,
            rendered,
            Some(json!({ "season": season })),
        )
        .await
    }

    #[instrument(skip(self, series), fields(series_id = %series.id))]
    pub async fn notify_series_new_episode(
        &self,
        series: &SeriesRef,
        season: i32,
        episode: i32,
    ) -> Result<Vec<NotificationRequest>> {
        let rendered = templates::new_episode(series, season, episode);
        self.fan_out_watchlist(
            &series.id,
            ItemType::Series,
            NotificationCategory::NewEpisode,
            rendered,
            Some(json!({ "season": season, "episode": episode })),
        )
        .await
    }

    #[instrument(skip(self, series), fields(series_id = %series.id))]
    pub async fn notify_series_status_changed(
        &self,
        series: &SeriesRef,
        old_status: SeriesStatus,
    ) -> Result<Vec<NotificationRequest>> {
        let rendered = templates::status_changed(series, old_status);
        self.fan_out_watchlist(
            &series.id,
            ItemType::Series,
            NotificationCategory::SeriesStatus,
            rendered,
            Some(json!({ "oldStatus": old_status, "newStatus": series.status })),
        )
        .await
    }

    // ==================== 影评 ====================

    /// 想看清单和收藏两类受众都查到后才开始投递，
    /// 任一查询失败时整个事件重试，不会出现一半受众已收到通知的情况
    #[instrument(skip(self, review), fields(review_id = %review.id, item_id = %review.item_id))]
    pub async fn notify_item_reviewed(
        &self,
        review: &ReviewRef,
        item_title: &str,
        item_type: ItemType,
    ) -> Result<Vec<NotificationRequest>> {
        let mut requests = self
            .review_requests_for(review, item_title, item_type, NotificationCategory::WatchlistReview)
            .await?;
        requests.extend(
            self.review_requests_for(review, item_title, item_type, NotificationCategory::FavoriteReview)
                .await?,
        );

        self.send_all(&requests).await;
        Ok(requests)
    }

    #[instrument(skip(self, review), fields(review_id = %review.id, item_id = %review.item_id))]
    pub async fn notify_watchlist_item_reviewed(
        &self,
        review: &ReviewRef,
        item_title: &str,
        item_type: ItemType,
    ) -> Result<Vec<NotificationRequest>> {
        let requests = self
            .review_requests_for(review, item_title, item_type, NotificationCategory::WatchlistReview)
            .await?;
        self.send_all(&requests).await;
        Ok(requests)
    }

    #[instrument(skip(self, review), fields(review_id = %review.id, item_id = %review.item_id))]
    pub async fn notify_favorite_item_reviewed(
        &self,
        review: &ReviewRef,
        item_title: &str,
        item_type: ItemType,
    ) -> Result<Vec<NotificationRequest>> {
        let requests = self
            .review_requests_for(review, item_title, item_type, NotificationCategory::FavoriteReview)
            .await?;
        self.send_all(&requests).await;
        Ok(requests)
    }

    // ==================== 成就 ====================

    /// 全量里程碑检查
    pub async fn check_and_notify_milestones(
        &self,
        user_id: &str,
    ) -> Result<Vec<NotificationRequest>> {
        self.check_and_notify_milestones_for(user_id, triggers::MILESTONE_CHECK)
            .await
    }

    /// 以指定触发标签评估成就，每个新解锁成就生成一条通知
    #[instrument(skip(self))]
    pub async fn check_and_notify_milestones_for(
        &self,
        user_id: &str,
        trigger: &str,
    ) -> Result<Vec<NotificationRequest>> {
        let mut report = self.achievements.evaluate(user_id, trigger).await?;
        let pending = report.take_retryable_failure();

        let requests: Vec<_> = report
            .unlocked
            .iter()
            .map(|definition| {
                let rendered =
                    templates::achievement_unlocked(&definition.name, &definition.description);
                NotificationRequest::new(
                    user_id,
                    NotificationCategory::Achievement,
                    rendered.title,
                    rendered.message,
                )
                .with_metadata("achievementId", json!(definition.id))
                .with_metadata("code", json!(definition.code))
                .with_metadata("threshold", json!(definition.threshold))
            })
            .collect();

        if !requests.is_empty() {
            info!(count = requests.len(), "生成成就通知");
        }
        self.send_all(&requests).await;

        // 已解锁的定义重跑时是空操作，重试只会补上失败的部分
        if let Some(error) = pending {
            warn!(
                notified = requests.len(),
                error = %error,
                "部分成就评估失败，交由事件总线重试"
            );
            return Err(error.into());
        }
        Ok(requests)
    }

    // ==================== 内部方法 ====================

    /// 查询受众并生成影评通知，不投递
    async fn review_requests_for(
        &self,
        review: &ReviewRef,
        item_title: &str,
        item_type: ItemType,
        category: NotificationCategory,
    ) -> Result<Vec<NotificationRequest>> {
        let favorite = category == NotificationCategory::FavoriteReview;
        let holders = if favorite {
            self.audience.favorite_holders(&review.item_id).await?
        } else {
            self.audience.watchlist_holders(&review.item_id).await?
        };
        let rendered = templates::item_reviewed(item_title, item_type, review.rating, favorite);
        Ok(review_requests(holders, review, item_type, category, &rendered))
    }

    async fn fan_out_watchlist(
        &self,
        item_id: &str,
        item_type: ItemType,
        category: NotificationCategory,
        rendered: Rendered,
        extra: Option<serde_json::Value>,
    ) -> Result<Vec<NotificationRequest>> {
        let holders = self.audience.watchlist_holders(item_id).await?;

        let requests: Vec<_> = holders
            .into_iter()
            .map(|user_id| {
                let request = NotificationRequest::new(
                    user_id,
                    category,
                    rendered.title.clone(),
                    rendered.message.clone(),
                )
                .with_item(item_id, item_type);
                match &extra {
                    Some(value) => request.with_metadata("change", value.clone()),
                    None => request,
                }
            })
            .collect();

        info!(
            item_id,
            category = category.as_str(),
            recipients = requests.len(),
            "生成条目通知"
        );
        self.send_all(&requests).await;
        Ok(requests)
    }

    /// 逐条投递，单条失败不影响其他请求
    async fn send_all(&self, requests: &[NotificationRequest]) {
        for request in requests {
            if let Err(e) = self.dispatch.dispatch(request.clone()).await {
                warn!(
                    notification_id = %request.notification_id,
                    user_id = %request.user_id,
                    error = %e,
                    "通知投递失败"
                );
            }
        }
    }
}

/// 影评通知排除作者本人
fn review_requests(
    holders: Vec<String>,
    review: &ReviewRef,
    item_type: ItemType,
    category: NotificationCategory,
    rendered: &Rendered,
) -> Vec<NotificationRequest> {
    holders
        .into_iter()
        .filter(|user_id| *user_id != review.user_id)
        .map(|user_id| {
            NotificationRequest::new(
                user_id,
                category,
                rendered.title.clone(),
                rendered.message.clone(),
            )
            .with_item(&review.item_id, item_type)
            .with_metadata("reviewId", json!(review.id))
            .with_metadata("reviewerId", json!(review.user_id))
        })
        .collect()
}
