//! 成就定义仓储（PostgreSQL）

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::AchievementRepositoryTrait;
use crate::error::Result;
use crate::models::{AchievementDefinition, AchievementType};

pub struct AchievementRepository {
    pool: PgPool,
}

impl AchievementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AchievementRepositoryTrait for AchievementRepository {
    async fn get(&self, id: i64) -> Result<Option<AchievementDefinition>> {
        let def = sqlx::query_as::<_, AchievementDefinition>(
            r#"
            SELECT id, code, name, description, achievement_type, threshold,
                   is_active, created_at
            FROM achievements
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(def)
    }

    async fn find_all_active(&self) -> Result<Vec<AchievementDefinition>> {
        let mut defs = sqlx::query_as::<_, AchievementDefinition>(
            r#"
            SELECT id, code, name, description, achievement_type, threshold,
                   is_active, created_at
            FROM achievements
            WHERE is_active = TRUE
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        // varchar 按字母排序与类型声明顺序不一致，取回后统一排序
        defs.sort_by_key(AchievementDefinition::evaluation_key);
        Ok(defs)
    }

    async fn find_active_by_type(
        &self,
        achievement_type: AchievementType,
    ) -> Result<Vec<AchievementDefinition>> {
        let defs = sqlx::query_as::<_, AchievementDefinition>(
            r#"
            SELECT id, code, name, description, achievement_type, threshold,
                   is_active, created_at
            FROM achievements
            WHERE is_active = TRUE AND achievement_type = $1
            ORDER BY threshold, id
            "#,
        )
        .bind(achievement_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(defs)
    }

    async fn find_active_with_threshold_at_most(
        &self,
        threshold: i64,
        achievement_type: AchievementType,
    ) -> Result<Vec<AchievementDefinition>> {
        let defs = sqlx::query_as::<_, AchievementDefinition>(
            r#"
            SELECT id, code, name, description, achievement_type, threshold,
                   is_active, created_at
            FROM achievements
            WHERE is_active = TRUE AND achievement_type = $1 AND threshold <= $2
            ORDER BY threshold, id
            "#,
        )
        .bind(achievement_type)
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        Ok(defs)
    }
}
