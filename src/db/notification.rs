use super::DBClient;
use crate::dtos::NotificationDto;
use crate::models::{Notification, NotificationType};
use crate::ranking::Pagination;
use uuid::Uuid;

/// Notification database operations trait
pub trait NotificationExt {
    async fn create_notification(
        &self,
        user_id: Uuid,
        actor_id: Uuid,
        kind: NotificationType,
        article_id: Option<Uuid>,
    ) -> Result<Notification, sqlx::Error>;

    /// One `article` notification per follower of `author_id`; returns how many were written
    async fn notify_followers(&self, author_id: Uuid, article_id: Uuid) -> Result<u64, sqlx::Error>;

    /// Newest first, optionally unread only
    async fn get_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        pagination: Pagination,
    ) -> Result<Vec<NotificationDto>, sqlx::Error>;

    async fn count_notifications(&self, user_id: Uuid, unread_only: bool)
    -> Result<i64, sqlx::Error>;

    /// RowNotFound unless the notification exists and belongs to `user_id`
    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<(), sqlx::Error>;

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<u64, sqlx::Error>;
}

impl NotificationExt for DBClient {
    async fn create_notification(
        &self,
        user_id: Uuid,
        actor_id: Uuid,
        kind: NotificationType,
        article_id: Option<Uuid>,
    ) -> Result<Notification, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO notifications (user_id, actor_id, type, article_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, actor_id, type, article_id, is_read, created_at
            "#,
        )
        .bind(user_id)
        .bind(actor_id)
        .bind(kind)
        .bind(article_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn notify_followers(&self, author_id: Uuid, article_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, actor_id, type, article_id)
            SELECT f.follower_id, $1, 'article', $2
            FROM user_follows f
            JOIN users u ON u.id = f.follower_id
            WHERE f.following_id = $1 AND u.deleted_at IS NULL
            "#,
        )
        .bind(author_id)
        .bind(article_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        pagination: Pagination,
    ) -> Result<Vec<NotificationDto>, sqlx::Error> {

        sqlx::query_as(
            r#"
            SELECT n.id, n.actor_id, u.username AS actor_username, n.type, n.article_id,
                   a.slug AS article_slug, n.is_read, n.created_at
            FROM notifications n
            JOIN users u ON u.id = n.actor_id
            LEFT JOIN articles a ON a.id = n.article_id
            WHERE n.user_id = $1 AND (NOT $2 OR n.is_read = FALSE)
            ORDER BY n.created_at DESC, n.id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
    }

    async fn count_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND (NOT $2 OR is_read = FALSE)",
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(&self.pool)
        .await
    }

    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
