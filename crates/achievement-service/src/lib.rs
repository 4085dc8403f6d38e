//! 成就服务
//!
//! 根据用户行为触发成就评估，以 compare-and-set 语义记录解锁，
//! 并提供用户成就的查询与展示设置。
//!
//! ## 模块结构
//!
//! - `catalog`: 内置成就目录
//! - `engine`: 成就规则引擎，`(user_id, trigger)` -> 新解锁的成就
//! - `query`: 用户成就查询与展示开关
//! - `trigger`: 触发标签到成就类型的映射
//! - `progress`: 用户进度来源抽象
//! - `repository`: 成就定义与用户成就记录的持久化（PostgreSQL / 内存）

pub mod catalog;
pub mod engine;
pub mod error;
pub mod models;
pub mod progress;
pub mod query;
pub mod repository;
pub mod trigger;

pub use engine::{AchievementChecker, AchievementEngine, UnlockFailure, UnlockReport};
pub use error::{AchievementError, Result};
pub use models::{AchievementDefinition, AchievementProgress, AchievementType, UserAchievementRecord};
pub use progress::ProgressProvider;
pub use query::AchievementQueryService;
pub use trigger::TriggerMapping;
