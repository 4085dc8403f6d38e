//! 通知工作者服务
//!
//! 订阅事件总线上的领域事件，确定受众并生成通知请求，交给投递层异步落地；
//! 用户行为事件同时驱动成就评估，新解锁的成就作为通知发给用户本人。
//! 另提供 `POST /events` 接口供目录服务等外部生产者投递事件。

pub mod adapters;
pub mod app;
pub mod composer;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod templates;

pub use app::{AchievementStores, LibraryStores, Pipeline, build_pipeline};
pub use composer::{AudienceLookup, NotificationComposer};
pub use dispatch::{
    LogSink, MemoryDispatch, NotificationDispatch, NotificationSink, PgNotificationSink,
    QueuedDispatch,
};
pub use error::{NotificationError, Result};
