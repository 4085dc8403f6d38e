//! 成就领域模型

pub mod achievement;
pub mod user_achievement;

pub use achievement::{AchievementDefinition, AchievementType};
pub use user_achievement::{AchievementProgress, UserAchievementRecord};
