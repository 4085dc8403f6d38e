//! 成就仓储层
//!
//! - `AchievementRepository` / `UserAchievementRepository`: PostgreSQL 实现
//! - `memory`: 基于 DashMap 的内存实现，用于开发环境和测试

mod achievement_repo;
pub mod memory;
mod traits;
mod user_achievement_repo;

pub use achievement_repo::AchievementRepository;
pub use memory::{MemoryAchievementRepository, MemoryUserAchievementRepository};
pub use traits::*;
pub use user_achievement_repo::UserAchievementRepository;
