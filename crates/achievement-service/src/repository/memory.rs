//! 内存仓储
//!
//! 基于 DashMap 的成就仓储实现，适用于开发环境和测试。
//! 解锁借助 `DashMap::entry` 在分片锁内完成判断与写入，与 PostgreSQL 实现的
//! compare-and-set 语义一致。

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::traits::{AchievementRepositoryTrait, UserAchievementRepositoryTrait};
use crate::error::Result;
use crate::models::{AchievementDefinition, AchievementType, UserAchievementRecord};

// ==================== 成就定义 ====================

#[derive(Clone, Default)]
pub struct MemoryAchievementRepository {
    definitions: Arc<DashMap<i64, AchievementDefinition>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryAchievementRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入定义，id 为 0 时自动分配
    pub fn insert(&self, mut definition: AchievementDefinition) -> AchievementDefinition {
        if definition.id == 0 {
            definition.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        } else {
            self.next_id.fetch_max(definition.id, Ordering::SeqCst);
        }
        self.definitions.insert(definition.id, definition.clone());
        definition
    }

    pub fn insert_many<I>(&self, definitions: I) -> Vec<AchievementDefinition>
    where
        I: IntoIterator<Item = AchievementDefinition>,
    {
        definitions.into_iter().map(|d| self.insert(d)).collect()
    }

    fn list_by<F>(&self, predicate: F) -> Vec<AchievementDefinition>
    where
        F: Fn(&AchievementDefinition) -> bool,
    {
        let mut defs: Vec<_> = self
            .definitions
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        defs.sort_by_key(AchievementDefinition::evaluation_key);
        defs
    }
}

#[async_trait]
impl AchievementRepositoryTrait for MemoryAchievementRepository {
    async fn get(&self, id: i64) -> Result<Option<AchievementDefinition>> {
        Ok(self.definitions.get(&id).map(|d| d.clone()))
    }

    async fn find_all_active(&self) -> Result<Vec<AchievementDefinition>> {
        Ok(self.list_by(|d| d.is_active))
    }

    async fn find_active_by_type(
        &self,
        achievement_type: AchievementType,
    ) -> Result<Vec<AchievementDefinition>> {
        Ok(self.list_by(|d| d.is_active && d.achievement_type == achievement_type))
    }

    async fn find_active_with_threshold_at_most(
        &self,
        threshold: i64,
        achievement_type: AchievementType,
    ) -> Result<Vec<AchievementDefinition>> {
        Ok(self.list_by(|d| {
            d.is_active && d.achievement_type == achievement_type && d.threshold <= threshold
        }))
    }
}

// ==================== 用户成就记录 ====================

#[derive(Clone, Default)]
pub struct MemoryUserAchievementRepository {
    records: Arc<DashMap<(String, i64), UserAchievementRecord>>,
}

impl MemoryUserAchievementRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录总数（含未解锁）
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn list_by<F>(&self, user_id: &str, predicate: F) -> Vec<UserAchievementRecord>
    where
        F: Fn(&UserAchievementRecord) -> bool,
    {
        let mut records: Vec<_> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == user_id && predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        // 已解锁按时间倒序在前，未解锁在后
        records.sort_by(|a, b| match (a.unlocked_at, b.unlocked_at) {
            (Some(x), Some(y)) => y.cmp(&x).then(a.achievement_id.cmp(&b.achievement_id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.achievement_id.cmp(&b.achievement_id),
        });
        records
    }
}

#[async_trait]
impl UserAchievementRepositoryTrait for MemoryUserAchievementRepository {
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<UserAchievementRecord>> {
        Ok(self.list_by(user_id, |_| true))
    }

    async fn find_unlocked_by_user(&self, user_id: &str) -> Result<Vec<UserAchievementRecord>> {
        Ok(self.list_by(user_id, |r| r.is_unlocked()))
    }

    async fn find_locked_by_user(&self, user_id: &str) -> Result<Vec<UserAchievementRecord>> {
        Ok(self.list_by(user_id, |r| !r.is_unlocked()))
    }

    async fn find_one(
        &self,
        user_id: &str,
        achievement_id: i64,
    ) -> Result<Option<UserAchievementRecord>> {
        Ok(self
            .records
            .get(&(user_id.to_string(), achievement_id))
            .map(|r| r.clone()))
    }

    async fn find_displayed_by_user(&self, user_id: &str) -> Result<Vec<UserAchievementRecord>> {
        Ok(self.list_by(user_id, |r| r.is_displayed))
    }

    async fn count_unlocked_by_user(&self, user_id: &str) -> Result<i64> {
        let count = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == user_id && entry.value().is_unlocked())
            .count();
        Ok(count as i64)
    }

    async fn ensure_tracked(&self, user_id: &str, achievement_ids: &[i64]) -> Result<()> {
        for &achievement_id in achievement_ids {
            self.records
                .entry((user_id.to_string(), achievement_id))
                .or_insert_with(|| UserAchievementRecord::tracked(user_id, achievement_id));
        }
        Ok(())
    }

    async fn unlock(
        &self,
        user_id: &str,
        achievement_id: i64,
        unlocked_at: DateTime<Utc>,
    ) -> Result<Option<UserAchievementRecord>> {
        match self.records.entry((user_id.to_string(), achievement_id)) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.is_unlocked() {
                    return Ok(None);
                }
                record.unlocked_at = Some(unlocked_at);
                record.updated_at = unlocked_at;
                Ok(Some(record.clone()))
            }
            Entry::Vacant(vacant) => {
                let record = UserAchievementRecord {
                    unlocked_at: Some(unlocked_at),
                    created_at: unlocked_at,
                    updated_at: unlocked_at,
                    ..UserAchievementRecord::tracked(user_id, achievement_id)
                };
                vacant.insert(record.clone());
                Ok(Some(record))
            }
        }
    }

    async fn set_displayed(
        &self,
        user_id: &str,
        achievement_id: i64,
        displayed: bool,
    ) -> Result<Option<UserAchievementRecord>> {
        Ok(self
            .records
            .get_mut(&(user_id.to_string(), achievement_id))
            .map(|mut record| {
                record.is_displayed = displayed;
                record.updated_at = Utc::now();
                record.clone()
            }))
    }
}
