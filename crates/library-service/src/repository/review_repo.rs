//! 影评仓储（PostgreSQL）

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::traits::ReviewRepositoryTrait;
use crate::error::Result;
use crate::models::Review;

pub struct ReviewRepository {
    pool: PgPool,
}

impl ReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewRepositoryTrait for ReviewRepository {
    async fn create(&self, review: &Review) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO reviews (id, user_id, item_id, item_type, item_title, rating, content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, item_id) DO NOTHING
            "#,
        )
        .bind(&review.id)
        .bind(&review.user_id)
        .bind(&review.item_id)
        .bind(review.item_type)
        .bind(&review.item_title)
        .bind(review.rating)
        .bind(&review.content)
        .bind(review.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_by_item(&self, item_id: &str) -> Result<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(
            r#"
            SELECT id, user_id, item_id, item_type, item_title, rating, content, created_at
            FROM reviews
            WHERE item_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }

    async fn find_by_user_and_item(&self, user_id: &str, item_id: &str) -> Result<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(
            r#"
            SELECT id, user_id, item_id, item_type, item_title, rating, content, created_at
            FROM reviews
            WHERE user_id = $1 AND item_id = $2
            "#,
        )
        .bind(user_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(review)
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM reviews WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("total"))
    }
}
