use super::DBClient;
use crate::dtos::UserSummaryDto;
use crate::models::{Category, UserFollow};
use crate::ranking::Pagination;
use uuid::Uuid;

/// Follow graph and reading interests
pub trait SocialExt {
    /// Unique violation when the edge already exists
    async fn follow_user(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> Result<UserFollow, sqlx::Error>;

    /// Removing a missing edge is a no-op
    async fn unfollow_user(&self, follower_id: Uuid, following_id: Uuid)
    -> Result<(), sqlx::Error>;

    async fn is_following(&self, follower_id: Uuid, following_id: Uuid)
    -> Result<bool, sqlx::Error>;

    /// Users following `user_id`, most recent first
    async fn get_followers(
        &self,
        user_id: Uuid,
        pagination: Pagination,
    ) -> Result<Vec<UserSummaryDto>, sqlx::Error>;

    /// Users `user_id` follows, most recent first
    async fn get_following(
        &self,
        user_id: Uuid,
        pagination: Pagination,
    ) -> Result<Vec<UserSummaryDto>, sqlx::Error>;

    async fn get_follower_count(&self, user_id: Uuid) -> Result<i64, sqlx::Error>;

    async fn get_following_count(&self, user_id: Uuid) -> Result<i64, sqlx::Error>;

    async fn get_following_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>;

    async fn get_interest_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>;

    async fn get_interests(&self, user_id: Uuid) -> Result<Vec<Category>, sqlx::Error>;

    /// Replace the whole interest set in one transaction
    async fn set_interests(&self, user_id: Uuid, category_ids: &[Uuid]) -> Result<(), sqlx::Error>;
}

impl SocialExt for DBClient {
    async fn follow_user(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> Result<UserFollow, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO user_follows (follower_id, following_id)
            VALUES ($1, $2)
            RETURNING follower_id, following_id, created_at
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn unfollow_user(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM user_follows WHERE follower_id = $1 AND following_id = $2")
            .bind(follower_id)
            .bind(following_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn is_following(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM user_follows WHERE follower_id = $1 AND following_id = $2)",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_followers(
        &self,
        user_id: Uuid,
        pagination: Pagination,
    ) -> Result<Vec<UserSummaryDto>, sqlx::Error> {

        sqlx::query_as(
            r#"
            SELECT u.id, u.username, u.bio, u.avatar_url, f.created_at AS followed_at
            FROM user_follows f
            JOIN users u ON u.id = f.follower_id
            WHERE f.following_id = $1 AND u.deleted_at IS NULL
            ORDER BY f.created_at DESC, u.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
    }

    async fn get_following(
        &self,
        user_id: Uuid,
        pagination: Pagination,
    ) -> Result<Vec<UserSummaryDto>, sqlx::Error> {

        sqlx::query_as(
            r#"
            SELECT u.id, u.username, u.bio, u.avatar_url, f.created_at AS followed_at
            FROM user_follows f
            JOIN users u ON u.id = f.following_id
            WHERE f.follower_id = $1 AND u.deleted_at IS NULL
            ORDER BY f.created_at DESC, u.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
    }

    async fn get_follower_count(&self, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM user_follows f
            JOIN users u ON u.id = f.follower_id
            WHERE f.following_id = $1 AND u.deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_following_count(&self, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM user_follows f
            JOIN users u ON u.id = f.following_id
            WHERE f.follower_id = $1 AND u.deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_following_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar("SELECT following_id FROM user_follows WHERE follower_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_interest_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar("SELECT category_id FROM user_interests WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_interests(&self, user_id: Uuid) -> Result<Vec<Category>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT c.id, c.name, c.slug, c.description, c.parent_id, c.display_order, c.is_active, c.created_at, c.updated_at
            FROM user_interests i
            JOIN categories c ON c.id = i.category_id
            WHERE i.user_id = $1
            ORDER BY c.display_order, c.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn set_interests(&self, user_id: Uuid, category_ids: &[Uuid]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_interests WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if !category_ids.is_empty() {
            // Unknown category ids fail with a foreign key violation
            sqlx::query(
                "INSERT INTO user_interests (user_id, category_id) SELECT $1, UNNEST($2::uuid[])",
            )
            .bind(user_id)
            .bind(category_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use sqlx::PgPool;

    #[sqlx::test(migrations = "./migrations")]
    async fn set_interests_replaces_the_previous_set(pool: PgPool) {
        let db = DBClient::new(pool);
        let reader = fixtures::user(&db, "reader").await;
        let rust = fixtures::category(&db, "Rust").await;
        let go = fixtures::category(&db, "Go").await;
        let life = fixtures::category(&db, "Life").await;

        db.set_interests(reader.id, &[rust.id, go.id]).await.unwrap();
        db.set_interests(reader.id, &[life.id]).await.unwrap();

        assert_eq!(db.get_interest_ids(reader.id).await.unwrap(), vec![life.id]);

        db.set_interests(reader.id, &[]).await.unwrap();
        assert!(db.get_interest_ids(reader.id).await.unwrap().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn failed_set_interests_keeps_the_previous_set(pool: PgPool) {
        let db = DBClient::new(pool);
        let reader = fixtures::user(&db, "reader").await;
        let rust = fixtures::category(&db, "Rust").await;
        let go = fixtures::category(&db, "Go").await;

        db.set_interests(reader.id, &[rust.id]).await.unwrap();

        let err = db
            .set_interests(reader.id, &[go.id, Uuid::new_v4()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation()
        ));

        assert_eq!(db.get_interest_ids(reader.id).await.unwrap(), vec![rust.id]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn follow_edges_are_unique_and_never_loops(pool: PgPool) {
        let db = DBClient::new(pool);
        let alice = fixtures::user(&db, "alice").await;
        let bob = fixtures::user(&db, "bob").await;

        db.follow_user(alice.id, bob.id).await.unwrap();
        let duplicate = db.follow_user(alice.id, bob.id).await.unwrap_err();
        assert!(matches!(
            duplicate,
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation()
        ));
        assert!(db.follow_user(alice.id, alice.id).await.is_err());

        assert!(db.is_following(alice.id, bob.id).await.unwrap());
        assert!(!db.is_following(bob.id, alice.id).await.unwrap());
        assert_eq!(db.get_follower_count(bob.id).await.unwrap(), 1);

        db.unfollow_user(alice.id, bob.id).await.unwrap();
        db.unfollow_user(alice.id, bob.id).await.unwrap();
        assert_eq!(db.get_follower_count(bob.id).await.unwrap(), 0);
    }
}
