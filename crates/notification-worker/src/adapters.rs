//! 片库仓储适配器
//!
//! 把片库仓储接到编排器的受众查询和成就引擎的进度来源上，
//! 成就服务与片库服务之间不直接依赖。

use std::sync::Arc;

use async_trait::async_trait;

use achievement_service::{AchievementError, AchievementType, ProgressProvider};
use library_service::repository::{
    FavoriteRepositoryTrait, ReviewRepositoryTrait, WatchHistoryRepositoryTrait,
    WatchlistRepositoryTrait,
};

use crate::composer::AudienceLookup;
use crate::error::{NotificationError, Result};

/// 以想看清单 / 收藏作为通知受众
pub struct LibraryAudience<W, F>
where
    W: WatchlistRepositoryTrait,
    F: FavoriteRepositoryTrait,
{
    watchlist: Arc<W>,
    favorites: Arc<F>,
}

impl<W, F> LibraryAudience<W, F>
where
    W: WatchlistRepositoryTrait,
    F: FavoriteRepositoryTrait,
{
    pub fn new(watchlist: Arc<W>, favorites: Arc<F>) -> Self {
        Self {
            watchlist,
            favorites,
        }
    }
}

#[async_trait]
impl<W, F> AudienceLookup for LibraryAudience<W, F>
where
    W: WatchlistRepositoryTrait,
    F: FavoriteRepositoryTrait,
{
    async fn watchlist_holders(&self, item_id: &str) -> Result<Vec<String>> {
        self.watchlist
            .find_user_ids_by_item(item_id)
            .await
            .map_err(|e| NotificationError::audience(item_id, e))
    }

    async fn favorite_holders(&self, item_id: &str) -> Result<Vec<String>> {
        self.favorites
            .find_user_ids_by_item(item_id)
            .await
            .map_err(|e| NotificationError::audience(item_id, e))
    }
}

/// 以片库计数作为成就进度
///
/// 观看数按不同条目计，重复观看同一条目不增加进度。
pub struct LibraryProgress<W, F, R, H>
where
    W: WatchlistRepositoryTrait,
    F: FavoriteRepositoryTrait,
    R: ReviewRepositoryTrait,
    H: WatchHistoryRepositoryTrait,
{
    watchlist: Arc<W>,
    favorites: Arc<F>,
    reviews: Arc<R>,
    history: Arc<H>,
}

impl<W, F, R, H> LibraryProgress<W, F, R, H>
where
    W: WatchlistRepositoryTrait,
    F: FavoriteRepositoryTrait,
    R: ReviewRepositoryTrait,
    H: WatchHistoryRepositoryTrait,
{
    pub fn new(watchlist: Arc<W>, favorites: Arc<F>, reviews: Arc<R>, history: Arc<H>) -> Self {
        Self {
            watchlist,
            favorites,
            reviews,
            history,
        }
    }
}

#[async_trait]
impl<W, F, R, H> ProgressProvider for LibraryProgress<W, F, R, H>
where
    W: WatchlistRepositoryTrait,
    F: FavoriteRepositoryTrait,
    R: ReviewRepositoryTrait,
    H: WatchHistoryRepositoryTrait,
{
    async fn progress(
        &self,
        user_id: &str,
        achievement_type: AchievementType,
    ) -> achievement_service::Result<i64> {
        let count = match achievement_type {
            AchievementType::WatchCount => self.history.count_distinct_items(user_id).await,
            AchievementType::ReviewCount => self.reviews.count_by_user(user_id).await,
            AchievementType::WatchlistCount => self.watchlist.count_by_user(user_id).await,
            AchievementType::FavoriteCount => self.favorites.count_by_user(user_id).await,
        };

        count.map_err(|e| AchievementError::Progress {
            achievement_type,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cinetrack_shared::events::ItemType;
    use library_service::repository::{
        MemoryFavoriteRepository, MemoryReviewRepository, MemoryWatchHistoryRepository,
        MemoryWatchlistRepository,
    };
    use library_service::{FavoriteItem, WatchRecord, WatchlistItem};

    struct Repos {
        watchlist: Arc<MemoryWatchlistRepository>,
        favorites: Arc<MemoryFavoriteRepository>,
        reviews: Arc<MemoryReviewRepository>,
        history: Arc<MemoryWatchHistoryRepository>,
    }

    fn repos() -> Repos {
        Repos {
            watchlist: Arc::new(MemoryWatchlistRepository::new()),
            favorites: Arc::new(MemoryFavoriteRepository::new()),
            reviews: Arc::new(MemoryReviewRepository::new()),
            history: Arc::new(MemoryWatchHistoryRepository::new()),
        }
    }

    fn watchlist_item(user_id: &str, item_id: &str) -> WatchlistItem {
        WatchlistItem {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            item_type: ItemType::Movie,
            item_title: "花样年华".to_string(),
            added_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_progress_reads_library_counts() {
        let r = repos();
        r.watchlist.add(&watchlist_item("u-1", "m-1")).await.unwrap();
        r.watchlist.add(&watchlist_item("u-1", "m-2")).await.unwrap();
        for _ in 0..3 {
            r.history
                .record(&WatchRecord {
                    user_id: "u-1".to_string(),
                    item_id: "m-1".to_string(),
                    item_type: ItemType::Movie,
                    watched_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let progress = LibraryProgress::new(r.watchlist, r.favorites, r.reviews, r.history);
        assert_eq!(
            progress
                .progress("u-1", AchievementType::WatchlistCount)
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            progress
                .progress("u-1", AchievementType::WatchCount)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            progress
                .progress("u-1", AchievementType::ReviewCount)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_audience_reads_holders() {
        let r = repos();
        r.watchlist.add(&watchlist_item("u-1", "m-1")).await.unwrap();
        let w = watchlist_item("u-2", "m-1");
        r.favorites
            .add(&FavoriteItem {
                user_id: w.user_id,
                item_id: w.item_id,
                item_type: w.item_type,
                item_title: w.item_title,
                added_at: w.added_at,
            })
            .await
            .unwrap();

        let audience = LibraryAudience::new(r.watchlist, r.favorites);
        assert_eq!(audience.watchlist_holders("m-1").await.unwrap(), vec!["u-1"]);
        assert_eq!(audience.favorite_holders("m-1").await.unwrap(), vec!["u-2"]);
        assert!(audience.watchlist_holders("m-9").await.unwrap().is_empty());
    }
}
