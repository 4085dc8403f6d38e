//! 用户片库服务
//!
//! 待看清单、收藏、影评与观看记录。每次成功操作都会通过事件总线发布
//! `UserActivity`（影评额外发布 `ReviewCreated`），驱动成就评估和通知。

pub mod dto;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;

pub use dto::{AddLibraryItemRequest, RecordWatchRequest, SubmitReviewRequest};
pub use error::{LibraryError, Result};
pub use models::{FavoriteItem, Review, WatchRecord, WatchlistItem};
pub use service::LibraryService;
