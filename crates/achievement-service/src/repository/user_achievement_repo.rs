//! 用户成就仓储（PostgreSQL）
//!
//! 解锁通过 `INSERT .. ON CONFLICT .. DO UPDATE .. WHERE unlocked_at IS NULL`
//! 在单条语句内完成判断与写入，并发触发下同一成就只会有一次调用拿到 RETURNING 行

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use super::traits::UserAchievementRepositoryTrait;
use crate::error::Result;
use crate::models::UserAchievementRecord;

pub struct UserAchievementRepository {
    pool: PgPool,
}

impl UserAchievementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserAchievementRepositoryTrait for UserAchievementRepository {
    // ==================== 查询操作 ====================

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<UserAchievementRecord>> {
        let records = sqlx::query_as::<_, UserAchievementRecord>(
            r#"
            SELECT user_id, achievement_id, unlocked_at, is_displayed, created_at, updated_at
            FROM user_achievements
            WHERE user_id = $1
            ORDER BY unlocked_at DESC NULLS LAST, achievement_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn find_unlocked_by_user(&self, user_id: &str) -> Result<Vec<UserAchievementRecord>> {
        let records = sqlx::query_as::<_, UserAchievementRecord>(
            r#"
            SELECT user_id, achievement_id, unlocked_at, is_displayed, created_at, updated_at
            FROM user_achievements
            WHERE user_id = $1 AND unlocked_at IS NOT NULL
            ORDER BY unlocked_at DESC, achievement_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn find_locked_by_user(&self, user_id: &str) -> Result<Vec<UserAchievementRecord>> {
        let records = sqlx::query_as::<_, UserAchievementRecord>(
            r#"
            SELECT user_id, achievement_id, unlocked_at, is_displayed, created_at, updated_at
            FROM user_achievements
            WHERE user_id = $1 AND unlocked_at IS NULL
            ORDER BY achievement_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn find_one(
        &self,
        user_id: &str,
        achievement_id: i64,
    ) -> Result<Option<UserAchievementRecord>> {
        let record = sqlx::query_as::<_, UserAchievementRecord>(
            r#"
            SELECT user_id, achievement_id, unlocked_at, is_displayed, created_at, updated_at
            FROM user_achievements
            WHERE user_id = $1 AND achievement_id = $2
            "#,
        )
        .bind(user_id)
        .bind(achievement_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_displayed_by_user(&self, user_id: &str) -> Result<Vec<UserAchievementRecord>> {
        let records = sqlx::query_as::<_, UserAchievementRecord>(
            r#"
            SELECT user_id, achievement_id, unlocked_at, is_displayed, created_at, updated_at
            FROM user_achievements
            WHERE user_id = $1 AND is_displayed = TRUE
            ORDER BY unlocked_at DESC NULLS LAST, achievement_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn count_unlocked_by_user(&self, user_id: &str) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM user_achievements
            WHERE user_id = $1 AND unlocked_at IS NOT NULL
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("total"))
    }

    // ==================== 写入操作 ====================

    async fn ensure_tracked(&self, user_id: &str, achievement_ids: &[i64]) -> Result<()> {
        if achievement_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO user_achievements (user_id, achievement_id, is_displayed, created_at, updated_at)
            SELECT $1, UNNEST($2::BIGINT[]), FALSE, NOW(), NOW()
            ON CONFLICT (user_id, achievement_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(achievement_ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn unlock(
        &self,
        user_id: &str,
        achievement_id: i64,
        unlocked_at: DateTime<Utc>,
    ) -> Result<Option<UserAchievementRecord>> {
        let record = sqlx::query_as::<_, UserAchievementRecord>(
            r#"
            INSERT INTO user_achievements
                (user_id, achievement_id, unlocked_at, is_displayed, created_at, updated_at)
            VALUES ($1, $2, $3, FALSE, $3, $3)
            ON CONFLICT (user_id, achievement_id) DO UPDATE
                SET unlocked_at = EXCLUDED.unlocked_at,
                    updated_at = EXCLUDED.updated_at
                WHERE user_achievements.unlocked_at IS NULL
            RETURNING user_id, achievement_id, unlocked_at, is_displayed, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(achievement_id)
        .bind(unlocked_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn set_displayed(
        &self,
        user_id: &str,
        achievement_id: i64,
        displayed: bool,
    ) -> Result<Option<UserAchievementRecord>> {
        let record = sqlx::query_as::<_, UserAchievementRecord>(
            r#"
            UPDATE user_achievements
            SET is_displayed = $3, updated_at = NOW()
            WHERE user_id = $1 AND achievement_id = $2
            RETURNING user_id, achievement_id, unlocked_at, is_displayed, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(achievement_id)
        .bind(displayed)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // 需要数据库连接，且 achievements 表中存在 id=1
    async fn test_unlock_is_compare_and_set() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let pool = PgPool::connect(&url).await.unwrap();
        let repo = UserAchievementRepository::new(pool);
        let user = format!("it-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());

        let first = repo.unlock(&user, 1, Utc::now()).await.unwrap();
        let second = repo.unlock(&user, 1, Utc::now()).await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(repo.count_unlocked_by_user(&user).await.unwrap(), 1);
    }
}
