//! 片库实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cinetrack_shared::events::ItemType;

/// 待看清单条目，每个用户对同一条目最多一条
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistItem {
    pub user_id: String,
    pub item_id: String,
    pub item_type: ItemType,
    pub item_title: String,
    pub added_at: DateTime<Utc>,
}

/// 收藏，每个用户对同一条目最多一条
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteItem {
    pub user_id: String,
    pub item_id: String,
    pub item_type: ItemType,
    pub item_title: String,
    pub added_at: DateTime<Utc>,
}

/// 影评，每个用户对同一条目最多一篇
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub user_id: String,
    pub item_id: String,
    pub item_type: ItemType,
    pub item_title: String,
    /// 1-10 分
    pub rating: i16,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// 观看记录，同一条目可重复观看
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WatchRecord {
    pub user_id: String,
    pub item_id: String,
    pub item_type: ItemType,
    pub watched_at: DateTime<Utc>,
}
