use super::DBClient;
use uuid::Uuid;

/// Likes and bookmarks
///
/// Creating a duplicate fails with the unique violation of
/// `likes_user_article_key` / `bookmarks_user_article_key`; removing a
/// missing row is a no-op.
pub trait EngagementExt {
    async fn create_like(&self, user_id: Uuid, article_id: Uuid) -> Result<(), sqlx::Error>;

    async fn delete_like(&self, user_id: Uuid, article_id: Uuid) -> Result<(), sqlx::Error>;

    async fn get_likes_count(&self, article_id: Uuid) -> Result<i64, sqlx::Error>;

    async fn create_bookmark(&self, user_id: Uuid, article_id: Uuid) -> Result<(), sqlx::Error>;

    async fn delete_bookmark(&self, user_id: Uuid, article_id: Uuid) -> Result<(), sqlx::Error>;
}

impl EngagementExt for DBClient {
    async fn create_like(&self, user_id: Uuid, article_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO likes (user_id, article_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(article_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_like(&self, user_id: Uuid, article_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM likes WHERE user_id = $1 AND article_id = $2")
            .bind(user_id)
            .bind(article_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_likes_count(&self, article_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE article_id = $1")
            .bind(article_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn create_bookmark(&self, user_id: Uuid, article_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO bookmarks (user_id, article_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(article_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_bookmark(&self, user_id: Uuid, article_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND article_id = $2")
            .bind(user_id)
            .bind(article_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use crate::models::ArticleStatus;
    use sqlx::PgPool;

    #[sqlx::test(migrations = "./migrations")]
    async fn second_like_on_the_same_pair_is_a_unique_violation(pool: PgPool) {
        let db = DBClient::new(pool);
        let author = fixtures::user(&db, "author").await;
        let reader = fixtures::user(&db, "reader").await;
        let article =
            fixtures::article(&db, &author, "first-post", ArticleStatus::Published, &[]).await;

        db.create_like(reader.id, article.id).await.unwrap();
        let err = db.create_like(reader.id, article.id).await.unwrap_err();
        assert!(matches!(
            err,
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation()
        ));
        assert_eq!(db.get_likes_count(article.id).await.unwrap(), 1);

        db.delete_like(reader.id, article.id).await.unwrap();
        db.delete_like(reader.id, article.id).await.unwrap();
        assert_eq!(db.get_likes_count(article.id).await.unwrap(), 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn bookmarks_are_unique_per_pair(pool: PgPool) {
        let db = DBClient::new(pool);
        let author = fixtures::user(&db, "author").await;
        let article =
            fixtures::article(&db, &author, "first-post", ArticleStatus::Published, &[]).await;

        db.create_bookmark(author.id, article.id).await.unwrap();
        assert!(db.create_bookmark(author.id, article.id).await.is_err());

        db.delete_bookmark(author.id, article.id).await.unwrap();
        db.create_bookmark(author.id, article.id).await.unwrap();
    }
}
