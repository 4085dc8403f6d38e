//! 领域事件与通知请求模型
//!
//! 定义影视追踪系统中所有领域事件的统一信封格式、事件类别，以及由通知编排器
//! 产出、由投递层消费的 `NotificationRequest`。事件与通知都只有这一份规范表示，
//! JSON 线格式通过 serde 属性定义。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// 触发标签
// ---------------------------------------------------------------------------

/// 成就重算的触发标签
///
/// 标签是自由文本，未知标签会让规则引擎评估全部成就类型。
pub mod triggers {
    pub const REVIEW_SUBMITTED: &str = "REVIEW_SUBMITTED";
    pub const ITEM_WATCHED: &str = "ITEM_WATCHED";
    pub const WATCHLIST_ADDED: &str = "WATCHLIST_ADDED";
    pub const FAVORITE_ADDED: &str = "FAVORITE_ADDED";
    /// 全量里程碑检查
    pub const MILESTONE_CHECK: &str = "MILESTONE_CHECK";
}

// ---------------------------------------------------------------------------
// 条目引用
// ---------------------------------------------------------------------------

/// 影视条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    Movie,
    Series,
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Movie => "MOVIE",
            Self::Series => "SERIES",
        };
        write!(f, "{s}")
    }
}

/// 剧集播出状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeriesStatus {
    Upcoming,
    Ongoing,
    Hiatus,
    Ended,
    Cancelled,
}

impl SeriesStatus {
    /// 面向用户的状态文案
    pub fn label(&self) -> &'static str {
        match self {
            Self::Upcoming => "即将开播",
            Self::Ongoing => "连载中",
            Self::Hiatus => "暂停播出",
            Self::Ended => "已完结",
            Self::Cancelled => "已砍",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieRef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesRef {
    pub id: String,
    pub title: String,
    /// 变更后的当前状态
    pub status: SeriesStatus,
}

/// 评论引用，只携带下游处理器需要的字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRef {
    pub id: String,
    /// 评论作者
    pub user_id: String,
    pub item_id: String,
    pub item_type: ItemType,
    pub rating: Option<i16>,
}

// ---------------------------------------------------------------------------
// DomainEvent: 领域事件
// ---------------------------------------------------------------------------

/// 剧集更新的子类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subtype", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeriesChange {
    NewSeason {
        season: i32,
    },
    NewEpisode {
        season: i32,
        episode: i32,
    },
    StatusChanged {
        #[serde(rename = "oldStatus")]
        old_status: SeriesStatus,
    },
}

/// 领域事件
///
/// 以 `type` 字段区分变体，便于其他服务直接以 JSON 投递。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    MovieReleased {
        movie: MovieRef,
    },
    SeriesUpdated {
        series: SeriesRef,
        change: SeriesChange,
    },
    ReviewCreated {
        review: ReviewRef,
        #[serde(rename = "itemTitle")]
        item_title: String,
        #[serde(rename = "itemType")]
        item_type: ItemType,
    },
    UserActivity {
        #[serde(rename = "userId")]
        user_id: String,
        trigger: String,
    },
}

impl DomainEvent {
    /// 事件所属类别，决定进入哪条通道
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MovieReleased { .. } => EventKind::MovieReleased,
            Self::SeriesUpdated { .. } => EventKind::SeriesUpdated,
            Self::ReviewCreated { .. } => EventKind::ReviewCreated,
            Self::UserActivity { .. } => EventKind::UserActivity,
        }
    }

    pub fn user_activity(user_id: impl Into<String>, trigger: impl Into<String>) -> Self {
        Self::UserActivity {
            user_id: user_id.into(),
            trigger: trigger.into(),
        }
    }
}

/// 事件类别
///
/// 每个类别对应事件总线上一条独立通道。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    MovieReleased,
    SeriesUpdated,
    ReviewCreated,
    UserActivity,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        Self::MovieReleased,
        Self::SeriesUpdated,
        Self::ReviewCreated,
        Self::UserActivity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MovieReleased => "MOVIE_RELEASED",
            Self::SeriesUpdated => "SERIES_UPDATED",
            Self::ReviewCreated => "REVIEW_CREATED",
            Self::UserActivity => "USER_ACTIVITY",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EventEnvelope: 事件信封
// ---------------------------------------------------------------------------

/// 事件信封
///
/// - `event_id`（UUID v7）用于处理器侧的幂等校验，重复投递同一信封不会重复处理
/// - `occurred_at` 记录事件产生时间，不代表处理顺序
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: String,
    pub occurred_at: DateTime<Utc>,
    pub event: DomainEvent,
}

impl EventEnvelope {
    pub fn new(event: DomainEvent) -> Self {
        Self {
            event_id: Uuid::now_v7().to_string(),
            occurred_at: Utc::now(),
            event,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

// ---------------------------------------------------------------------------
// NotificationRequest: 通知请求
// ---------------------------------------------------------------------------

/// 通知类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
    /// 想看清单中的电影上映
    Release,
    NewSeason,
    NewEpisode,
    SeriesStatus,
    /// 想看清单中的条目有了新评论
    WatchlistReview,
    /// 收藏的条目有了新评论
    FavoriteReview,
    /// 解锁成就
    Achievement,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Release => "RELEASE",
            Self::NewSeason => "NEW_SEASON",
            Self::NewEpisode => "NEW_EPISODE",
            Self::SeriesStatus => "SERIES_STATUS",
            Self::WatchlistReview => "WATCHLIST_REVIEW",
            Self::FavoriteReview => "FAVORITE_REVIEW",
            Self::Achievement => "ACHIEVEMENT",
        }
    }
}

/// 通知请求
///
/// 由通知编排器写一次，投递层只读。系统内只有这一种通知请求形态。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub notification_id: String,
    pub user_id: String,
    pub category: NotificationCategory,
    pub title: String,
    pub message: String,
    pub item_id: Option<String>,
    pub item_type: Option<ItemType>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl NotificationRequest {
    pub fn new(
        user_id: impl Into<String>,
        category: NotificationCategory,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            notification_id: Uuid::now_v7().to_string(),
            user_id: user_id.into(),
            category,
            title: title.into(),
            message: message.into(),
            item_id: None,
            item_type: None,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// 关联影视条目
    pub fn with_item(mut self, item_id: impl Into<String>, item_type: ItemType) -> Self {
        self.item_id = Some(item_id.into());
        self.item_type = Some(item_type);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
