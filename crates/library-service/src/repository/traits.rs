//! 片库仓储接口

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{FavoriteItem, Review, WatchRecord, WatchlistItem};

/// 待看清单仓储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WatchlistRepositoryTrait: Send + Sync {
    /// 写入条目，(user_id, item_id) 已存在时返回 false 且不修改
    async fn add(&self, item: &WatchlistItem) -> Result<bool>;

    /// 删除条目，返回是否确实删除
    async fn remove(&self, user_id: &str, item_id: &str) -> Result<bool>;

    /// 用户的待看清单，按加入时间倒序
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<WatchlistItem>>;

    /// 把该条目加入待看清单的所有用户
    async fn find_user_ids_by_item(&self, item_id: &str) -> Result<Vec<String>>;

    async fn count_by_user(&self, user_id: &str) -> Result<i64>;
}

/// 收藏仓储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FavoriteRepositoryTrait: Send + Sync {
    async fn add(&self, item: &FavoriteItem) -> Result<bool>;

    async fn remove(&self, user_id: &str, item_id: &str) -> Result<bool>;

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<FavoriteItem>>;

    async fn find_user_ids_by_item(&self, item_id: &str) -> Result<Vec<String>>;

    async fn count_by_user(&self, user_id: &str) -> Result<i64>;
}

/// 影评仓储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReviewRepositoryTrait: Send + Sync {
    /// 写入影评，同一用户对同一条目已有影评时返回 false
    async fn create(&self, review: &Review) -> Result<bool>;

    /// 条目下的影评，按发表时间倒序
    async fn list_by_item(&self, item_id: &str) -> Result<Vec<Review>>;

    async fn find_by_user_and_item(&self, user_id: &str, item_id: &str) -> Result<Option<Review>>;

    async fn count_by_user(&self, user_id: &str) -> Result<i64>;
}

/// 观看记录仓储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WatchHistoryRepositoryTrait: Send + Sync {
    async fn record(&self, record: &WatchRecord) -> Result<()>;

    /// 用户观看记录，按观看时间倒序
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<WatchRecord>>;

    /// 看过的不同条目数，重复观看只计一次
    async fn count_distinct_items(&self, user_id: &str) -> Result<i64>;
}
