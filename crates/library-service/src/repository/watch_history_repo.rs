//! 观看记录仓储（PostgreSQL）

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::traits::WatchHistoryRepositoryTrait;
use crate::error::Result;
use crate::models::WatchRecord;

pub struct WatchHistoryRepository {
    pool: PgPool,
}

impl WatchHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WatchHistoryRepositoryTrait for WatchHistoryRepository {
    async fn record(&self, record: &WatchRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO watch_history (user_id, item_id, item_type, watched_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&record.user_id)
        .bind(&record.item_id)
        .bind(record.item_type)
        .bind(record.watched_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<WatchRecord>> {
        let records = sqlx::query_as::<_, WatchRecord>(
            r#"
            SELECT user_id, item_id, item_type, watched_at
            FROM watch_history
            WHERE user_id = $1
            ORDER BY watched_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn count_distinct_items(&self, user_id: &str) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(DISTINCT item_id) AS total FROM watch_history WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("total"))
    }
}
