//! 片库仓储层
//!
//! 每个集合一个 PostgreSQL 实现，另有一套 DashMap 内存实现用于开发环境和测试。
//! 唯一性由 (user_id, item_id) 约束保证，重复写入以返回值表达而非报错。

mod favorite_repo;
pub mod memory;
mod review_repo;
mod traits;
mod watch_history_repo;
mod watchlist_repo;

pub use favorite_repo::FavoriteRepository;
pub use memory::{
    MemoryFavoriteRepository, MemoryReviewRepository, MemoryWatchHistoryRepository,
    MemoryWatchlistRepository,
};
pub use review_repo::ReviewRepository;
pub use traits::*;
pub use watch_history_repo::WatchHistoryRepository;
pub use watchlist_repo::WatchlistRepository;
