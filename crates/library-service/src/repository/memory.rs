//! 内存仓储
//!
//! 基于 DashMap 的片库仓储实现，适用于开发环境和测试。
//! 唯一性检查通过 `DashMap::entry` 完成，与数据库唯一约束语义一致。

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;

use super::traits::{
    FavoriteRepositoryTrait, ReviewRepositoryTrait, WatchHistoryRepositoryTrait,
    WatchlistRepositoryTrait,
};
use crate::error::Result;
use crate::models::{FavoriteItem, Review, WatchRecord, WatchlistItem};

/// 以 (user_id, item_id) 为键的通用存储
struct UserItemStore<T> {
    data: DashMap<(String, String), T>,
}

impl<T: Clone> UserItemStore<T> {
    fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    fn key(user_id: &str, item_id: &str) -> (String, String) {
        (user_id.to_string(), item_id.to_string())
    }

    fn insert_if_absent(&self, user_id: &str, item_id: &str, value: &T) -> bool {
        match self.data.entry(Self::key(user_id, item_id)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(value.clone());
                true
            }
        }
    }

    fn remove(&self, user_id: &str, item_id: &str) -> bool {
        self.data.remove(&Self::key(user_id, item_id)).is_some()
    }

    fn get(&self, user_id: &str, item_id: &str) -> Option<T> {
        self.data.get(&Self::key(user_id, item_id)).map(|v| v.clone())
    }

    fn list_by_user(&self, user_id: &str) -> Vec<T> {
        self.data
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn list_by_item(&self, item_id: &str) -> Vec<T> {
        self.data
            .iter()
            .filter(|entry| entry.key().1 == item_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn user_ids_by_item(&self, item_id: &str) -> Vec<String> {
        let mut users: Vec<String> = self
            .data
            .iter()
            .filter(|entry| entry.key().1 == item_id)
            .map(|entry| entry.key().0.clone())
            .collect();
        users.sort();
        users
    }

    fn count_by_user(&self, user_id: &str) -> i64 {
        self.data
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .count() as i64
    }
}

// ==================== 待看清单 ====================

#[derive(Clone)]
pub struct MemoryWatchlistRepository {
    store: Arc<UserItemStore<WatchlistItem>>,
}

impl MemoryWatchlistRepository {
    pub fn new() -> Self {
        Self {
            store: Arc::new(UserItemStore::new()),
        }
    }
}

impl Default for MemoryWatchlistRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WatchlistRepositoryTrait for MemoryWatchlistRepository {
    async fn add(&self, item: &WatchlistItem) -> Result<bool> {
        Ok(self.store.insert_if_absent(&item.user_id, &item.item_id, item))
    }

    async fn remove(&self, user_id: &str, item_id: &str) -> Result<bool> {
        Ok(self.store.remove(user_id, item_id))
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<WatchlistItem>> {
        let mut items = self.store.list_by_user(user_id);
        items.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(items)
    }

    async fn find_user_ids_by_item(&self, item_id: &str) -> Result<Vec<String>> {
        Ok(self.store.user_ids_by_item(item_id))
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        Ok(self.store.count_by_user(user_id))
    }
}

// ==================== 收藏 ====================

#[derive(Clone)]
pub struct MemoryFavoriteRepository {
    store: Arc<UserItemStore<FavoriteItem>>,
}

impl MemoryFavoriteRepository {
    pub fn new() -> Self {
        Self {
            store: Arc::new(UserItemStore::new()),
        }
    }
}

impl Default for MemoryFavoriteRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FavoriteRepositoryTrait for MemoryFavoriteRepository {
    async fn add(&self, item: &FavoriteItem) -> Result<bool> {
        Ok(self.store.insert_if_absent(&item.user_id, &item.item_id, item))
    }

    async fn remove(&self, user_id: &str, item_id: &str) -> Result<bool> {
        Ok(self.store.remove(user_id, item_id))
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<FavoriteItem>> {
        let mut items = self.store.list_by_user(user_id);
        items.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(items)
    }

    async fn find_user_ids_by_item(&self, item_id: &str) -> Result<Vec<String>> {
        Ok(self.store.user_ids_by_item(item_id))
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        Ok(self.store.count_by_user(user_id))
    }
}

// ==================== 影评 ====================

#[derive(Clone)]
pub struct MemoryReviewRepository {
    store: Arc<UserItemStore<Review>>,
}

impl MemoryReviewRepository {
    pub fn new() -> Self {
        Self {
            store: Arc::new(UserItemStore::new()),
        }
    }
}

impl Default for MemoryReviewRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReviewRepositoryTrait for MemoryReviewRepository {
    async fn create(&self, review: &Review) -> Result<bool> {
        Ok(self
            .store
            .insert_if_absent(&review.user_id, &review.item_id, review))
    }

    async fn list_by_item(&self, item_id: &str) -> Result<Vec<Review>> {
        let mut reviews = self.store.list_by_item(item_id);
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn find_by_user_and_item(&self, user_id: &str, item_id: &str) -> Result<Option<Review>> {
        Ok(self.store.get(user_id, item_id))
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        Ok(self.store.count_by_user(user_id))
    }
}

// ==================== 观看记录 ====================

/// 观看记录允许重复，按追加顺序保存
#[derive(Clone, Default)]
pub struct MemoryWatchHistoryRepository {
    records: Arc<RwLock<Vec<WatchRecord>>>,
}

impl MemoryWatchHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WatchHistoryRepositoryTrait for MemoryWatchHistoryRepository {
    async fn record(&self, record: &WatchRecord) -> Result<()> {
        self.records.write().push(record.clone());
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<WatchRecord>> {
        let mut records: Vec<_> = self
            .records
            .read()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.watched_at.cmp(&a.watched_at));
        Ok(records)
    }

    async fn count_distinct_items(&self, user_id: &str) -> Result<i64> {
        let records = self.records.read();
        let items: HashSet<&str> = records
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.item_id.as_str())
            .collect();
        Ok(items.len() as i64)
    }
}
