use super::DBClient;
use crate::models::Tag;
use crate::ranking::Pagination;
use uuid::Uuid;

/// Tag database operations trait
///
/// `usage_count` is maintained by the article repository; tags created here start at zero.
pub trait TagExt {
    /// Tags by popularity
    async fn get_tags(&self, pagination: Pagination) -> Result<Vec<Tag>, sqlx::Error>;

    async fn get_tag_count(&self) -> Result<i64, sqlx::Error>;

    async fn get_tag_by_slug(&self, slug: &str) -> Result<Tag, sqlx::Error>;

    async fn create_tag(&self, name: &str, slug: &str) -> Result<Tag, sqlx::Error>;

    /// Removes the tag from every article as well
    async fn delete_tag(&self, tag_id: Uuid) -> Result<(), sqlx::Error>;
}

impl TagExt for DBClient {
    async fn get_tags(&self, pagination: Pagination) -> Result<Vec<Tag>, sqlx::Error> {

        sqlx::query_as(
            r#"
            SELECT id, name, slug, usage_count, created_at
            FROM tags
            ORDER BY usage_count DESC, name ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
    }

    async fn get_tag_count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM tags")
            .fetch_one(&self.pool)
            .await
    }

    async fn get_tag_by_slug(&self, slug: &str) -> Result<Tag, sqlx::Error> {
        sqlx::query_as("SELECT id, name, slug, usage_count, created_at FROM tags WHERE slug = $1")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
    }

    async fn create_tag(&self, name: &str, slug: &str) -> Result<Tag, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO tags (name, slug) VALUES ($1, $2)
            RETURNING id, name, slug, usage_count, created_at
            "#,
        )
        .bind(name)
        .bind(slug)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_tag(&self, tag_id: Uuid) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(tag_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
