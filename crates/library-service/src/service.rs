//! 片库服务
//!
//! 处理待看清单、收藏、影评和观看记录的写入与查询。
//!
//! ## 事件发布
//!
//! 写操作成功后发布 `UserActivity`，影评额外发布 `ReviewCreated`。
//! 发布失败只记录日志，不影响已经完成的写入：成就和通知属于下游副作用，
//! 可通过 `MILESTONE_CHECK` 补偿。

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use cinetrack_shared::bus::EventPublisher;
use cinetrack_shared::events::{DomainEvent, ReviewRef, triggers};

use crate::dto::{AddLibraryItemRequest, RecordWatchRequest, SubmitReviewRequest};
use crate::error::{LibraryError, Result};
use crate::models::{FavoriteItem, Review, WatchRecord, WatchlistItem};
use crate::repository::{
    FavoriteRepositoryTrait, ReviewRepositoryTrait, WatchHistoryRepositoryTrait,
    WatchlistRepositoryTrait,
};

pub struct LibraryService<W, F, R, H>
where
    W: WatchlistRepositoryTrait,
    F: FavoriteRepositoryTrait,
    R: ReviewRepositoryTrait,
    H: WatchHistoryRepositoryTrait,
{
    watchlist_repo: Arc<W>,
    favorite_repo: Arc<F>,
    review_repo: Arc<R>,
    history_repo: Arc<H>,
    publisher: Arc<dyn EventPublisher>,
}

impl<W, F, R, H> LibraryService<W, F, R, H>
where
    W: WatchlistRepositoryTrait,
    F: FavoriteRepositoryTrait,
    R: ReviewRepositoryTrait,
    H: WatchHistoryRepositoryTrait,
{
    pub fn new(
        watchlist_repo: Arc<W>,
        favorite_repo: Arc<F>,
        review_repo: Arc<R>,
        history_repo: Arc<H>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            watchlist_repo,
            favorite_repo,
            review_repo,
            history_repo,
            publisher,
        }
    }

    // ==================== 待看清单 ====================

    #[instrument(skip(self, request), fields(user_id = %request.user_id, item_id = %request.item_id))]
    pub async fn add_to_watchlist(&self, request: AddLibraryItemRequest) -> Result<WatchlistItem> {
        request.validate()?;

        let item = WatchlistItem {
            user_id: request.user_id,
            item_id: request.item_id,
            item_type: request.item_type,
            item_title: request.item_title,
            added_at: Utc::now(),
        };

        if !self.watchlist_repo.add(&item).await? {
            return Err(LibraryError::AlreadyInWatchlist {
                user_id: item.user_id,
                item_id: item.item_id,
            });
        }

        info!("已加入待看清单");
        self.emit(DomainEvent::user_activity(
            &item.user_id,
            triggers::WATCHLIST_ADDED,
        ))
        .await;

        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn remove_from_watchlist(&self, user_id: &str, item_id: &str) -> Result<()> {
        if !self.watchlist_repo.remove(user_id, item_id).await? {
            return Err(LibraryError::NotInWatchlist {
                user_id: user_id.to_string(),
                item_id: item_id.to_string(),
            });
        }
        info!("已移出待看清单");
        Ok(())
    }

    pub async fn list_watchlist(&self, user_id: &str) -> Result<Vec<WatchlistItem>> {
        self.watchlist_repo.list_by_user(user_id).await
    }

    /// 把该条目放进待看清单的用户
    pub async fn watchlist_holders(&self, item_id: &str) -> Result<Vec<String>> {
        self.watchlist_repo.find_user_ids_by_item(item_id).await
    }

    pub async fn count_watchlist(&self, user_id: &str) -> Result<i64> {
        self.watchlist_repo.count_by_user(user_id).await
    }

    // ==================== 收藏 ====================

    #[instrument(skip(self, request), fields(user_id = %request.user_id, item_id = %request.item_id))]
    pub async fn add_favorite(&self, request: AddLibraryItemRequest) -> Result<FavoriteItem> {
        request.validate()?;

        let item = FavoriteItem {
            user_id: request.user_id,
            item_id: request.item_id,
            item_type: request.item_type,
            item_title: request.item_title,
            added_at: Utc::now(),
        };

        if !self.favorite_repo.add(&item).await? {
            return Err(LibraryError::AlreadyFavorited {
                user_id: item.user_id,
                item_id: item.item_id,
            });
        }

        info!("已收藏");
        self.emit(DomainEvent::user_activity(
            &item.user_id,
            triggers::FAVORITE_ADDED,
        ))
        .await;

        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn remove_favorite(&self, user_id: &str, item_id: &str) -> Result<()> {
        if !self.favorite_repo.remove(user_id, item_id).await? {
            return Err(LibraryError::NotFavorited {
                user_id: user_id.to_string(),
                item_id: item_id.to_string(),
            });
        }
        info!("已取消收藏");
        Ok(())
    }

    pub async fn list_favorites(&self, user_id: &str) -> Result<Vec<FavoriteItem>> {
        self.favorite_repo.list_by_user(user_id).await
    }

    pub async fn favorite_holders(&self, item_id: &str) -> Result<Vec<String>> {
        self.favorite_repo.find_user_ids_by_item(item_id).await
    }

    pub async fn count_favorites(&self, user_id: &str) -> Result<i64> {
        self.favorite_repo.count_by_user(user_id).await
    }

    // ==================== 影评 ====================

    /// 发表影评
    ///
    /// 同一用户对同一条目只能发表一篇，重复提交返回 `AlreadyReviewed`。
    #[instrument(skip(self, request), fields(user_id = %request.user_id, item_id = %request.item_id))]
    pub async fn submit_review(&self, request: SubmitReviewRequest) -> Result<Review> {
        request.validate()?;

        let review = Review {
            id: Uuid::now_v7().to_string(),
            user_id: request.user_id,
            item_id: request.item_id,
            item_type: request.item_type,
            item_title: request.item_title,
            rating: request.rating,
            content: request.content,
            created_at: Utc::now(),
        };

        if !self.review_repo.create(&review).await? {
            return Err(LibraryError::AlreadyReviewed {
                user_id: review.user_id,
                item_id: review.item_id,
            });
        }

        info!(review_id = %review.id, rating = review.rating, "影评已发表");

        self.emit(DomainEvent::ReviewCreated {
            review: ReviewRef {
                id: review.id.clone(),
                user_id: review.user_id.clone(),
                item_id: review.item_id.clone(),
                item_type: review.item_type,
                rating: Some(review.rating),
            },
            item_title: review.item_title.clone(),
            item_type: review.item_type,
        })
        .await;
        self.emit(DomainEvent::user_activity(
            &review.user_id,
            triggers::REVIEW_SUBMITTED,
        ))
        .await;

        Ok(review)
    }

    pub async fn list_reviews_for_item(&self, item_id: &str) -> Result<Vec<Review>> {
        self.review_repo.list_by_item(item_id).await
    }

    pub async fn count_reviews(&self, user_id: &str) -> Result<i64> {
        self.review_repo.count_by_user(user_id).await
    }

    // ==================== 观看记录 ====================

    /// 记录一次观看，同一条目可重复记录
    #[instrument(skip(self, request), fields(user_id = %request.user_id, item_id = %request.item_id))]
    pub async fn record_watch(&self, request: RecordWatchRequest) -> Result<WatchRecord> {
        request.validate()?;

        let record = WatchRecord {
            user_id: request.user_id,
            item_id: request.item_id,
            item_type: request.item_type,
            watched_at: Utc::now(),
        };
        self.history_repo.record(&record).await?;

        info!("观看已记录");
        self.emit(DomainEvent::user_activity(
            &record.user_id,
            triggers::ITEM_WATCHED,
        ))
        .await;

        Ok(record)
    }

    pub async fn list_watch_history(&self, user_id: &str) -> Result<Vec<WatchRecord>> {
        self.history_repo.list_by_user(user_id).await
    }

    /// 看过的不同条目数
    pub async fn count_watched_items(&self, user_id: &str) -> Result<i64> {
        self.history_repo.count_distinct_items(user_id).await
    }

    async fn emit(&self, event: DomainEvent) {
        let kind = event.kind();
        if let Err(e) = self.publisher.publish(event).await {
            warn!(kind = %kind, error = %e, "事件发布失败，写入已生效");
        }
    }
}
