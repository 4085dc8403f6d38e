//! 内置成就目录
//!
//! 与 `migrations/0001_init.sql` 中的种子数据保持一致，内存存储启动时写入。

use crate::models::{AchievementDefinition, AchievementType};

pub fn builtin_definitions() -> Vec<AchievementDefinition> {
    use AchievementType::*;

    vec![
        AchievementDefinition::new(1, "FIRST_WATCH", "初次观影", WatchCount, 1)
            .with_description("记录第一部看过的作品"),
        AchievementDefinition::new(2, "WATCH_10", "影迷", WatchCount, 10)
            .with_description("看过 10 部不同的作品"),
        AchievementDefinition::new(3, "WATCH_100", "阅片无数", WatchCount, 100)
            .with_description("看过 100 部不同的作品"),
        AchievementDefinition::new(4, "FIRST_REVIEW", "初试啼声", ReviewCount, 1)
            .with_description("发表第一篇影评"),
        AchievementDefinition::new(5, "REVIEW_10", "影评人", ReviewCount, 10)
            .with_description("发表 10 篇影评"),
        AchievementDefinition::new(6, "WATCHLIST_10", "片单规划师", WatchlistCount, 10)
            .with_description("想看清单累计 10 部"),
        AchievementDefinition::new(7, "FAVORITE_5", "心头好", FavoriteCount, 5)
            .with_description("收藏 5 部作品"),
    ]
}
