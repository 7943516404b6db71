use super::DBClient;
use crate::dtos::CommentDto;
use crate::models::Comment;
use crate::ranking::Pagination;
use uuid::Uuid;

/// Comment database operations trait
///
/// Deleted comments keep their row (`deleted_at`) and disappear from every read.
pub trait CommentExt {
    /// Get paginated comments for an article with sorting
    async fn get_comments(
        &self,
        article_id: Uuid,
        pagination: Pagination,
        sort: &str,
    ) -> Result<Vec<CommentDto>, sqlx::Error>;

    /// Count visible comments on an article
    async fn get_article_comment_count(&self, article_id: Uuid) -> Result<i64, sqlx::Error>;

    async fn get_comment(&self, comment_id: Uuid) -> Result<Comment, sqlx::Error>;

    /// Create new comment on an article
    async fn create_comment(
        &self,
        user_id: Uuid,
        article_id: Uuid,
        content: &str,
    ) -> Result<CommentDto, sqlx::Error>;

    /// Update comment content; ownership is checked by the caller
    async fn edit_comment(&self, comment_id: Uuid, content: &str)
    -> Result<CommentDto, sqlx::Error>;

    async fn soft_delete_comment(&self, comment_id: Uuid) -> Result<(), sqlx::Error>;
}

impl CommentExt for DBClient {
    async fn get_comments(
        &self,
        article_id: Uuid,
        pagination: Pagination,
        sort: &str,
    ) -> Result<Vec<CommentDto>, sqlx::Error> {

        // sort = "created_at_asc" for ascending, otherwise descending
        let order_by = if sort == "created_at_asc" {
            "c.created_at ASC, c.id ASC"
        } else {
            "c.created_at DESC, c.id DESC"
        };

        let query = format!(
            r#"
            SELECT c.id, c.article_id, c.user_id, u.username AS user_username, c.content, c.created_at, c.updated_at
            FROM comments c
            INNER JOIN users u ON c.user_id = u.id
            WHERE c.article_id = $1 AND c.deleted_at IS NULL
            ORDER BY {}
            LIMIT $2 OFFSET $3
            "#,
            order_by
        );

        let comments = sqlx::query_as(&query)
            .bind(article_id)
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(comments)
    }

    async fn get_article_comment_count(&self, article_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments WHERE article_id = $1 AND deleted_at IS NULL",
        )
        .bind(article_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_comment(&self, comment_id: Uuid) -> Result<Comment, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, article_id, user_id, content, created_at, updated_at, deleted_at
            FROM comments
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(comment_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn create_comment(
        &self,
        user_id: Uuid,
        article_id: Uuid,
        content: &str,
    ) -> Result<CommentDto, sqlx::Error> {
        // Use CTE to insert and return comment with username
        let comment = sqlx::query_as(
            r#"
            WITH new_comment AS (
                INSERT INTO comments (user_id, article_id, content)
                VALUES ($1, $2, $3)
                RETURNING *
            )
            SELECT nc.id, nc.article_id, nc.user_id, u.username AS user_username, nc.content, nc.created_at, nc.updated_at
            FROM new_comment nc
            JOIN users u ON nc.user_id = u.id
            "#,
        )
        .bind(user_id)
        .bind(article_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn edit_comment(
        &self,
        comment_id: Uuid,
        content: &str,
    ) -> Result<CommentDto, sqlx::Error> {
        let comment = sqlx::query_as(
            r#"
            WITH updated_comment AS (
                UPDATE comments
                SET content = $1, updated_at = NOW()
                WHERE id = $2 AND deleted_at IS NULL
                RETURNING *
            )
            SELECT uc.id, uc.article_id, uc.user_id, u.username AS user_username, uc.content, uc.created_at, uc.updated_at
            FROM updated_comment uc
            JOIN users u ON uc.user_id = u.id
            "#,
        )
        .bind(content)
        .bind(comment_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn soft_delete_comment(&self, comment_id: Uuid) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            "UPDATE comments SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(comment_id)
        .execute(&self.pool)
        .await?;

        // Return RowNotFound if comment doesn't exist or is already deleted
        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
