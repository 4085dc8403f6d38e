//! 收藏仓储（PostgreSQL）

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::traits::FavoriteRepositoryTrait;
use crate::error::Result;
use crate::models::FavoriteItem;

pub struct FavoriteRepository {
    pool: PgPool,
}

impl FavoriteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FavoriteRepositoryTrait for FavoriteRepository {
    async fn add(&self, item: &FavoriteItem) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO favorite_items (user_id, item_id, item_type, item_title, added_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, item_id) DO NOTHING
            "#,
        )
        .bind(&item.user_id)
        .bind(&item.item_id)
        .bind(item.item_type)
        .bind(&item.item_title)
        .bind(item.added_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn remove(&self, user_id: &str, item_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM favorite_items WHERE user_id = $1 AND item_id = $2")
            .bind(user_id)
            .bind(item_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<FavoriteItem>> {
        let items = sqlx::query_as::<_, FavoriteItem>(
            r#"
            SELECT user_id, item_id, item_type, item_title, added_at
            FROM favorite_items
            WHERE user_id = $1
            ORDER BY added_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn find_user_ids_by_item(&self, item_id: &str) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT user_id FROM favorite_items WHERE item_id = $1 ORDER BY user_id")
            .bind(item_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("user_id")).collect())
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM favorite_items WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("total"))
    }
}
