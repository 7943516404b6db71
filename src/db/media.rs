use super::DBClient;
use crate::models::Media;
use crate::ranking::Pagination;
use uuid::Uuid;

const MEDIA_COLUMNS: &str =
    "id, user_id, filename, original_name, mime_type, size_bytes, url, created_at";

#[derive(Debug, Clone)]
pub struct NewMedia {
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub url: String,
}

/// Metadata of uploaded files; the bytes live on disk
pub trait MediaExt {
    async fn create_media(&self, user_id: Uuid, media: NewMedia) -> Result<Media, sqlx::Error>;

    async fn get_media(&self, media_id: Uuid) -> Result<Media, sqlx::Error>;

    async fn get_user_media(
        &self,
        user_id: Uuid,
        pagination: Pagination,
    ) -> Result<Vec<Media>, sqlx::Error>;

    async fn get_user_media_count(&self, user_id: Uuid) -> Result<i64, sqlx::Error>;

    async fn delete_media(&self, media_id: Uuid) -> Result<(), sqlx::Error>;
}

impl MediaExt for DBClient {
    async fn create_media(&self, user_id: Uuid, media: NewMedia) -> Result<Media, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO media (user_id, filename, original_name, mime_type, size_bytes, url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            MEDIA_COLUMNS
        );
        sqlx::query_as(&query)
            .bind(user_id)
            .bind(media.filename)
            .bind(media.original_name)
            .bind(media.mime_type)
            .bind(media.size_bytes)
            .bind(media.url)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_media(&self, media_id: Uuid) -> Result<Media, sqlx::Error> {
        let query = format!("SELECT {} FROM media WHERE id = $1", MEDIA_COLUMNS);
        sqlx::query_as(&query)
            .bind(media_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_user_media(
        &self,
        user_id: Uuid,
        pagination: Pagination,
    ) -> Result<Vec<Media>, sqlx::Error> {

        let query = format!(
            "SELECT {} FROM media WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            MEDIA_COLUMNS
        );
        sqlx::query_as(&query)
            .bind(user_id)
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await
    }

    async fn get_user_media_count(&self, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM media WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn delete_media(&self, media_id: Uuid) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM media WHERE id = $1")
            .bind(media_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
